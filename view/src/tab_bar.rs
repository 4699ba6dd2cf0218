use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::Widget;

use crate::put_str;

/// One-row tab strip with an optional right-aligned status.
pub struct TabBar<'a> {
    tabs: &'a [&'a str],
    active: usize,
    status: Option<(&'a str, Style)>,
    style: Style,
    active_style: Style,
    separator: &'a str,
}

impl<'a> TabBar<'a> {
    pub fn new(tabs: &'a [&'a str], active: usize) -> Self {
        Self {
            tabs,
            active,
            status: None,
            style: Style::default().fg(Color::DarkGray),
            active_style: Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
            separator: " │ ",
        }
    }

    /// Right-aligned text, e.g. the active collection or an unsaved marker.
    pub fn status(mut self, text: &'a str, style: Style) -> Self {
        self.status = Some((text, style));
        self
    }
}

impl Widget for TabBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }
        let y = area.y;
        let right = area.right();
        let mut x = area.x;
        for (i, label) in self.tabs.iter().enumerate() {
            if i > 0 {
                x = put_str(buf, x, y, self.separator, self.style, right);
            }
            let style = if i == self.active {
                self.active_style
            } else {
                self.style
            };
            x = put_str(buf, x, y, label, style, right);
        }

        if let Some((text, style)) = self.status {
            let len = text.chars().count() as u16;
            // Only when it does not collide with the tabs.
            if x + 1 + len <= right {
                put_str(buf, right - len, y, text, style, right);
            }
        }
    }
}
