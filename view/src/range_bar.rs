use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::Widget;

use crate::{fill, put_str};

/// A labelled horizontal range control:
/// `Label      ▓▓▓▓▓▓░░░░░░  0.70`
pub struct RangeBar<'a> {
    label: &'a str,
    /// Position within the range, 0.0 ..= 1.0.
    fraction: f64,
    value: &'a str,
    label_width: u16,
    value_width: u16,
    focused: bool,
    style: Style,
    fill_style: Style,
    focus_style: Style,
}

impl<'a> RangeBar<'a> {
    pub fn new(label: &'a str, fraction: f64, value: &'a str) -> Self {
        Self {
            label,
            fraction,
            value,
            label_width: 16,
            value_width: 8,
            focused: false,
            style: Style::default(),
            fill_style: Style::default().fg(Color::Cyan),
            focus_style: Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        }
    }

    pub fn label_width(mut self, width: u16) -> Self {
        self.label_width = width;
        self
    }

    pub fn focused(mut self, focused: bool) -> Self {
        self.focused = focused;
        self
    }
}

/// Number of filled cells out of `width` for `fraction`.
pub fn filled_cells(fraction: f64, width: u16) -> u16 {
    if !fraction.is_finite() {
        return 0;
    }
    (fraction.clamp(0.0, 1.0) * width as f64).round() as u16
}

impl Widget for RangeBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }
        let y = area.y;
        let right = area.right();
        let label_style = if self.focused {
            self.focus_style
        } else {
            self.style
        };
        let cursor = if self.focused { "▸ " } else { "  " };
        let mut x = put_str(buf, area.x, y, cursor, label_style, right);
        let label_end = (x + self.label_width).min(right);
        put_str(buf, x, y, self.label, label_style, label_end.saturating_sub(1));
        x = label_end;

        let bar_width = right.saturating_sub(x).saturating_sub(self.value_width + 1);
        let filled = filled_cells(self.fraction, bar_width);
        x = fill(buf, x, y, filled, '▓', self.fill_style, right);
        x = fill(buf, x, y, bar_width - filled, '░', Style::default().fg(Color::DarkGray), right);

        let value_len = self.value.chars().count() as u16;
        let value_x = right.saturating_sub(value_len).max(x + 1);
        put_str(buf, value_x, y, self.value, label_style, right);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_is_proportional_and_bounded() {
        assert_eq!(filled_cells(0.5, 10), 5);
        assert_eq!(filled_cells(1.7, 10), 10);
        assert_eq!(filled_cells(-1.0, 10), 0);
        assert_eq!(filled_cells(f64::NAN, 10), 0);
    }
}
