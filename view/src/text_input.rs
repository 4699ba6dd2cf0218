use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::Widget;

/// Single-line edit buffer. `cursor` counts characters, not bytes.
#[derive(Clone, Debug, Default)]
pub struct TextInputState {
    pub value: String,
    pub cursor: usize,
}

impl TextInputState {
    pub fn new(initial: &str) -> Self {
        Self {
            value: initial.to_string(),
            cursor: initial.chars().count(),
        }
    }

    fn byte_at(&self, cursor: usize) -> usize {
        self.value
            .char_indices()
            .nth(cursor)
            .map_or(self.value.len(), |(i, _)| i)
    }

    fn char_len(&self) -> usize {
        self.value.chars().count()
    }

    pub fn insert(&mut self, ch: char) {
        let at = self.byte_at(self.cursor);
        self.value.insert(at, ch);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_at(self.cursor);
            self.value.remove(at);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.char_len() {
            let at = self.byte_at(self.cursor);
            self.value.remove(at);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.char_len());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.char_len();
    }

    /// First visible character so the cursor fits in `width` columns.
    pub fn scroll(&self, width: u16) -> usize {
        let width = width as usize;
        if width == 0 {
            return 0;
        }
        (self.cursor + 1).saturating_sub(width)
    }
}

/// Renders a [`TextInputState`] with a reverse-video cursor block,
/// scrolling horizontally when the text is wider than the area.
pub struct TextInput<'a> {
    state: &'a TextInputState,
    style: Style,
    cursor_style: Style,
}

impl<'a> TextInput<'a> {
    pub fn new(state: &'a TextInputState) -> Self {
        Self {
            state,
            style: Style::default(),
            cursor_style: Style::default()
                .fg(Color::Black)
                .bg(Color::White)
                .add_modifier(Modifier::BOLD),
        }
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }
}

impl Widget for TextInput<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 || area.width == 0 {
            return;
        }
        let skip = self.state.scroll(area.width);
        let y = area.y;
        let mut x = area.x;
        for (i, ch) in self.state.value.chars().enumerate().skip(skip) {
            if x >= area.right() {
                break;
            }
            let style = if i == self.state.cursor {
                self.cursor_style
            } else {
                self.style
            };
            if let Some(cell) = buf.cell_mut((x, y)) {
                cell.set_char(ch);
                cell.set_style(style);
            }
            x += 1;
        }
        if self.state.cursor >= self.state.char_len()
            && x < area.right()
            && let Some(cell) = buf.cell_mut((x, y))
        {
            cell.set_char(' ');
            cell.set_style(self.cursor_style);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edits_multibyte_text_by_character() {
        let mut input = TextInputState::new("tëmp");
        input.move_left();
        input.move_left();
        input.backspace();
        assert_eq!(input.value, "tmp");
        input.insert('é');
        assert_eq!(input.value, "témp");
        input.end();
        input.delete();
        assert_eq!(input.value, "témp");
        input.home();
        input.delete();
        assert_eq!(input.value, "émp");
    }

    #[test]
    fn scrolls_to_keep_cursor_visible() {
        let input = TextInputState::new("0123456789");
        assert_eq!(input.scroll(4), 7);
        assert_eq!(input.scroll(20), 0);
    }
}
