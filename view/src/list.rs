use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::Widget;

use crate::{fill, put_str};

/// A row-oriented table with a selected row, an optional selected cell and
/// vertical scrolling.
///
/// Columns have fixed widths; the last column takes whatever is left.
pub struct List<'a> {
    rows: &'a [Row],
    widths: &'a [u16],
    selected: Option<usize>,
    column: Option<usize>,
    offset: usize,
    style: Style,
    selected_style: Style,
    cell_style: Style,
    cursor: &'a str,
}

/// One row of cells.
pub struct Row {
    pub cells: Vec<Cell>,
}

pub struct Cell {
    pub text: String,
    pub style: Style,
}

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }
}

impl Cell {
    pub fn raw(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: Style::default(),
        }
    }

    pub fn styled(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }
}

/// Selection and scroll offset for a list.
#[derive(Default, Clone, Debug)]
pub struct ListState {
    pub selected: usize,
    pub offset: usize,
    pub len: usize,
}

impl ListState {
    pub fn new(len: usize) -> Self {
        Self {
            selected: 0,
            offset: 0,
            len,
        }
    }

    /// Returns true if moved.
    pub fn down(&mut self) -> bool {
        if self.len > 0 && self.selected < self.len - 1 {
            self.selected += 1;
            true
        } else {
            false
        }
    }

    /// Returns true if moved.
    pub fn up(&mut self) -> bool {
        if self.selected > 0 {
            self.selected -= 1;
            true
        } else {
            false
        }
    }

    pub fn select(&mut self, index: usize) {
        self.selected = index.min(self.len.saturating_sub(1));
    }

    /// Set the number of items, pulling the selection back in range.
    pub fn set_len(&mut self, len: usize) {
        self.len = len;
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
        if self.offset > self.selected {
            self.offset = self.selected;
        }
    }

    /// Scroll so the selected row is inside a viewport of `height` rows.
    pub fn ensure_visible(&mut self, height: usize) {
        if height == 0 {
            return;
        }
        if self.selected < self.offset {
            self.offset = self.selected;
        } else if self.selected >= self.offset + height {
            self.offset = self.selected + 1 - height;
        }
    }
}

impl<'a> List<'a> {
    pub fn new(rows: &'a [Row], widths: &'a [u16], state: &ListState) -> Self {
        Self {
            rows,
            widths,
            selected: Some(state.selected),
            column: None,
            offset: state.offset,
            style: Style::default(),
            selected_style: Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
            cell_style: Style::default().fg(Color::Black).bg(Color::Cyan),
            cursor: "▸ ",
        }
    }

    /// Highlight one cell of the selected row.
    pub fn column(mut self, column: Option<usize>) -> Self {
        self.column = column;
        self
    }

    /// Render without a selected row (unfocused pane).
    pub fn unfocused(mut self) -> Self {
        self.selected = None;
        self.column = None;
        self
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn selected_style(mut self, style: Style) -> Self {
        self.selected_style = style;
        self
    }

    pub fn cell_style(mut self, style: Style) -> Self {
        self.cell_style = style;
        self
    }
}

impl Widget for List<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }
        let right = area.right();
        let cursor_width = self.cursor.chars().count() as u16;

        for (row_idx, row) in self.rows.iter().enumerate().skip(self.offset) {
            let line = (row_idx - self.offset) as u16;
            if line >= area.height {
                break;
            }
            let y = area.y + line;
            let is_selected = self.selected == Some(row_idx);
            let base = if is_selected {
                self.selected_style
            } else {
                self.style
            };

            let mut x = if is_selected {
                put_str(buf, area.x, y, self.cursor, base, right)
            } else {
                area.x + cursor_width
            };

            for (col, cell) in row.cells.iter().enumerate() {
                if x >= right {
                    break;
                }
                let width = self
                    .widths
                    .get(col)
                    .copied()
                    .unwrap_or(right - x)
                    .min(right - x);
                let style = if is_selected && self.column == Some(col) {
                    self.cell_style
                } else {
                    base.patch(cell.style)
                };
                let cell_right = x + width;
                let end = put_str(buf, x, y, &cell.text, style, cell_right.saturating_sub(1).max(x + 1));
                fill(buf, end, y, cell_right.saturating_sub(end + 1), ' ', style, right);
                x = cell_right;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_stops_at_the_ends() {
        let mut state = ListState::new(2);
        assert!(!state.up());
        assert!(state.down());
        assert!(!state.down());
        assert_eq!(state.selected, 1);
    }

    #[test]
    fn shrinking_pulls_selection_back() {
        let mut state = ListState::new(5);
        state.select(4);
        state.ensure_visible(2);
        assert_eq!(state.offset, 3);
        state.set_len(2);
        assert_eq!(state.selected, 1);
        assert_eq!(state.offset, 1);
        state.set_len(0);
        assert_eq!(state.selected, 0);
    }

    #[test]
    fn renders_cells_in_columns() {
        let rows = vec![Row::new(vec![Cell::raw("Temp"), Cell::raw("temperature")])];
        let state = ListState::new(1);
        let area = Rect::new(0, 0, 24, 1);
        let mut buf = Buffer::empty(area);
        List::new(&rows, &[8], &state).render(area, &mut buf);
        let line: String = (0..24u16)
            .map(|x| buf[(x, 0u16)].symbol().to_string())
            .collect();
        assert_eq!(line.trim_end(), "▸ Temp    temperature");
    }
}
