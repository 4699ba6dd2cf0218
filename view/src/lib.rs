pub mod list;
pub mod range_bar;
pub mod tab_bar;
pub mod text_input;

pub use list::List;
pub use range_bar::RangeBar;
pub use tab_bar::TabBar;
pub use text_input::TextInput;

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;

/// Compute a centered rectangle within `area`.
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(w)) / 2;
    let y = area.y + (area.height.saturating_sub(h)) / 2;
    Rect::new(x, y, w, h)
}

/// Write `text` starting at `x`, stopping before `right`.
/// Returns the column after the last character written.
pub fn put_str(buf: &mut Buffer, x: u16, y: u16, text: &str, style: Style, right: u16) -> u16 {
    let mut x = x;
    for ch in text.chars() {
        if x >= right {
            break;
        }
        if let Some(cell) = buf.cell_mut((x, y)) {
            cell.set_char(ch);
            cell.set_style(style);
        }
        x += 1;
    }
    x
}

/// Fill `width` columns from `x` with `ch`, stopping before `right`.
pub fn fill(buf: &mut Buffer, x: u16, y: u16, width: u16, ch: char, style: Style, right: u16) -> u16 {
    let end = x.saturating_add(width).min(right);
    for cx in x..end {
        if let Some(cell) = buf.cell_mut((cx, y)) {
            cell.set_char(ch);
            cell.set_style(style);
        }
    }
    end.max(x)
}
