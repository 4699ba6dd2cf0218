use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use view::list::{Cell, ListState, Row};
use view::{List, RangeBar, TabBar, TextInput, centered_rect, put_str};

use super::{ConfirmAction, Focus, Popup, State, TAB_NAMES};
use crate::bridge;
use crate::host::HostContext;
use crate::notify::Level;
use crate::settings::{SliderField, SliderModel};

/// Column widths of the config table; `enabled` takes the rest.
const COLUMNS: [u16; 5] = [16, 18, 8, 8, 8];

pub(super) fn format_value(value: f64) -> String {
    if value.is_finite() {
        format!("{value}")
    } else {
        "-".to_string()
    }
}

pub(super) fn render(frame: &mut Frame, s: &mut State) {
    let area = frame.area();
    let [tab_area, content_area, status_area, action_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(area);

    let file = s
        .store
        .path()
        .map_or_else(|| "(memory)".to_string(), |p| p.display().to_string());
    let status = if s.debouncer.is_dirty() {
        format!("{file} *")
    } else {
        file
    };
    frame.render_widget(
        TabBar::new(TAB_NAMES, s.active_tab).status(&status, Style::default().fg(Color::DarkGray)),
        tab_area,
    );

    match s.active_tab {
        0 => render_sliders(frame, content_area, s),
        1 => render_request(frame, content_area, s),
        _ => render_help(frame, content_area, s.help_offset),
    }

    render_status(frame, status_area, s);
    render_action_bar(frame, action_area, &actions_for(s));

    match &s.popup {
        Some(Popup::Prompt { title, input, .. }) => render_prompt(frame, area, title, input),
        Some(Popup::Confirm { message, action }) => render_confirm(frame, area, message, action),
        Some(Popup::Picker { list }) => render_picker(frame, area, s, list),
        None => {}
    }
}

fn render_sliders(frame: &mut Frame, area: Rect, s: &mut State) {
    let [header_area, body_area] =
        Layout::vertical([Constraint::Length(1), Constraint::Fill(1)]).areas(area);
    render_header(frame, header_area, s);

    let [config_area, live_area] =
        Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)])
            .areas(body_area);
    render_config(frame, config_area, s);
    render_live(frame, live_area, s);
}

fn render_header(frame: &mut Frame, area: Rect, s: &State) {
    let total = s.settings.collections.len();
    let index = s.settings.active_index().unwrap_or(0);
    let (name, presets) = s
        .settings
        .active()
        .map_or(("", String::new()), |c| (c.name.as_str(), c.presets.join(", ")));

    let mut spans = vec![
        Span::styled(" ◂ ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            name.to_string(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::styled(" ▸ ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            format!("{}/{total}", index + 1),
            Style::default().fg(Color::DarkGray),
        ),
    ];
    if !presets.is_empty() {
        spans.push(Span::styled(
            format!("  presets: {presets}"),
            Style::default().fg(Color::Magenta),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);

    let host = format!(
        "source: {}  preset: {} ",
        display_or_dash(s.host.completion_source()),
        display_or_dash(s.host.preset_name().unwrap_or("")),
    );
    let width = host.chars().count() as u16;
    if area.width > width + 30 {
        let style = if s.panel.visible {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::Yellow)
        };
        put_str(frame.buffer_mut(), area.right() - width, area.y, &host, style, area.right());
    }
}

fn display_or_dash(text: &str) -> &str {
    if text.is_empty() { "-" } else { text }
}

fn pane_block(title: &str, focused: bool) -> Block<'_> {
    let color = if focused { Color::Cyan } else { Color::DarkGray };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(title)
}

fn slider_row(slider: &SliderModel) -> Row {
    let dim = Style::default().fg(Color::DarkGray);
    let base = if slider.enabled {
        Style::default()
    } else {
        dim
    };
    let text_cell = |text: &str| {
        if text.is_empty() {
            Cell::styled("-", dim)
        } else {
            Cell::styled(text, base)
        }
    };
    Row::new(vec![
        text_cell(&slider.name),
        text_cell(&slider.property),
        text_cell(&slider.min),
        text_cell(&slider.max),
        text_cell(&slider.step),
        Cell::styled(if slider.enabled { "[x]" } else { "[ ]" }, base),
    ])
}

fn render_config(frame: &mut Frame, area: Rect, s: &mut State) {
    let focused = s.focus == Focus::Config;
    let block = pane_block(" Sliders ", focused);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.height < 2 {
        return;
    }

    let sliders = s.settings.sliders();
    if sliders.is_empty() {
        frame.render_widget(
            Paragraph::new("No sliders in this collection. Press 'a' to add one.")
                .style(Style::default().fg(Color::DarkGray))
                .wrap(Wrap { trim: true }),
            inner,
        );
        return;
    }

    let header = [Row::new(
        SliderField::ALL
            .iter()
            .map(|f| Cell::raw(f.label()))
            .collect(),
    )];
    frame.render_widget(
        List::new(&header, &COLUMNS, &ListState::default())
            .unfocused()
            .style(Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD)),
        Rect::new(inner.x, inner.y, inner.width, 1),
    );

    let list_area = Rect::new(inner.x, inner.y + 1, inner.width, inner.height - 1);
    s.rows.ensure_visible(list_area.height as usize);
    let rows: Vec<Row> = s.settings.sliders().iter().map(slider_row).collect();
    let list = List::new(&rows, &COLUMNS, &s.rows);
    let list = if focused {
        list.column(Some(s.column))
    } else {
        list.unfocused()
    };
    frame.render_widget(list, list_area);

    if let Some(edit) = &s.editing {
        if edit.slider >= s.rows.offset {
            let line = (edit.slider - s.rows.offset) as u16;
            let col = SliderField::ALL
                .iter()
                .position(|f| *f == edit.field)
                .unwrap_or(0);
            let x = list_area.x + 2 + COLUMNS[..col].iter().sum::<u16>();
            let width = COLUMNS
                .get(col)
                .copied()
                .unwrap_or(list_area.right().saturating_sub(x))
                .saturating_sub(1);
            if line < list_area.height && x + width <= list_area.right() {
                let cell = Rect::new(x, list_area.y + line, width, 1);
                frame.render_widget(Clear, cell);
                frame.render_widget(
                    TextInput::new(&edit.input).style(Style::default().fg(Color::Yellow)),
                    cell,
                );
            }
        }
    }
}

fn render_live(frame: &mut Frame, area: Rect, s: &mut State) {
    let focused = s.focus == Focus::Live;
    let block = pane_block(" Live ", focused);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.height == 0 {
        return;
    }

    if !s.panel.visible {
        let source = display_or_dash(s.host.completion_source());
        frame.render_widget(
            Paragraph::new(format!(
                "Sliders only apply when the chat completion source is 'custom'. Current source: {source}"
            ))
            .style(Style::default().fg(Color::Yellow))
            .wrap(Wrap { trim: true }),
            inner,
        );
        return;
    }
    if s.panel.controls.is_empty() {
        frame.render_widget(
            Paragraph::new("No enabled slider has both a name and a property.")
                .style(Style::default().fg(Color::DarkGray))
                .wrap(Wrap { trim: true }),
            inner,
        );
        return;
    }

    // Two lines per control: the bar, then its range and id.
    let visible = (inner.height / 2).max(1) as usize;
    s.live.ensure_visible(visible);
    let dim = Style::default().fg(Color::DarkGray);
    for (i, control) in s.panel.controls.iter().enumerate().skip(s.live.offset) {
        let line = ((i - s.live.offset) * 2) as u16;
        if line >= inner.height {
            break;
        }
        let y = inner.y + line;
        let value = format_value(control.value);
        let selected = focused && i == s.live.selected;
        frame.render_widget(
            RangeBar::new(&control.label, control.fraction(), &value)
                .label_width(inner.width / 3)
                .focused(selected),
            Rect::new(inner.x, y, inner.width, 1),
        );
        if line + 1 < inner.height {
            let detail = format!(
                "    {} .. {}  {}",
                format_value(control.min),
                format_value(control.max),
                control.id
            );
            put_str(frame.buffer_mut(), inner.x, y + 1, &detail, dim, inner.right());
        }
    }
}

fn render_request(frame: &mut Frame, area: Rect, s: &State) {
    let label = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Source: ", label),
            Span::raw(display_or_dash(s.host.completion_source()).to_string()),
        ]),
        Line::from(vec![
            Span::styled("Preset: ", label),
            Span::raw(display_or_dash(s.host.preset_name().unwrap_or("")).to_string()),
        ]),
        Line::default(),
    ];
    if s.panel.visible {
        let (body, merged) = bridge::preview(&s.settings, &s.host);
        lines.push(Line::styled(
            format!("Body merged into the next request ({merged} slider value(s)):"),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
        if body.trim().is_empty() {
            lines.push(Line::styled("  (empty)", label));
        }
        lines.extend(body.lines().map(|l| Line::raw(format!("  {l}"))));
    } else {
        lines.push(Line::styled(
            "Requests to this source are sent unchanged; sliders apply to 'custom' only.",
            Style::default().fg(Color::Yellow),
        ));
    }
    frame.render_widget(
        Paragraph::new(lines).block(pane_block(" Request preview ", false)),
        area,
    );
}

fn render_status(frame: &mut Frame, area: Rect, s: &State) {
    let Some(toast) = s.toasts.current(std::time::Instant::now()) else {
        return;
    };
    let style = match toast.level {
        Level::Info => Style::default().fg(Color::Green),
        Level::Warn => Style::default().fg(Color::Yellow),
        Level::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    };
    frame.render_widget(Paragraph::new(format!(" {}", toast.message)).style(style), area);
}

fn actions_for(s: &State) -> Vec<(&'static str, &'static str)> {
    if s.popup.is_some() {
        return vec![("Enter", "ok"), ("Esc", "cancel")];
    }
    if s.editing.is_some() {
        return vec![("Enter", "done"), ("←/→", "cursor")];
    }
    match (s.active_tab, s.focus) {
        (0, Focus::Config) => vec![
            ("a", "add"),
            ("d", "delete"),
            ("K/J", "move"),
            ("[ ]", "collection"),
            ("n", "new"),
            ("x", "drop"),
            ("b", "bind preset"),
            ("e", "export"),
            ("i", "import"),
            ("Tab", "live"),
        ],
        (0, Focus::Live) => vec![
            ("←/→", "adjust"),
            ("Ctrl", "x10"),
            ("Enter", "type value"),
            ("Tab", "config"),
        ],
        _ => vec![("1-3", "tabs"), ("Ctrl+S", "save"), ("q", "quit")],
    }
}

fn render_action_bar(frame: &mut Frame, area: Rect, actions: &[(&str, &str)]) {
    if area.height == 0 || area.width == 0 {
        return;
    }
    let key_style = Style::default()
        .fg(Color::Black)
        .bg(Color::White)
        .add_modifier(Modifier::BOLD);
    let label_style = Style::default().fg(Color::White);
    let buf = frame.buffer_mut();
    let right = area.right();
    let mut x = area.x;
    for &(key, desc) in actions {
        if x > area.x {
            x += 1;
        }
        x = put_str(buf, x, area.y, &format!(" {key} "), key_style, right);
        x = put_str(buf, x, area.y, &format!(" {desc}"), label_style, right);
    }
}

fn popup_block(title: &str, color: Color) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(title)
}

fn render_prompt(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    input: &view::text_input::TextInputState,
) {
    let popup = centered_rect(50, 3, area);
    frame.render_widget(Clear, popup);
    let title = format!(" {title} ");
    let block = popup_block(&title, Color::Yellow);
    let inner = block.inner(popup);
    frame.render_widget(block, popup);
    frame.render_widget(TextInput::new(input), inner);
}

fn render_confirm(frame: &mut Frame, area: Rect, message: &str, action: &ConfirmAction) {
    let width = (message.chars().count() as u16 + 4).max(30);
    let popup = centered_rect(width, 4, area);
    frame.render_widget(Clear, popup);
    let title = match action {
        ConfirmAction::DeleteSlider(_) => " Delete slider ",
        ConfirmAction::DeleteCollection => " Delete collection ",
    };
    let block = popup_block(title, Color::Red);
    let inner = block.inner(popup);
    frame.render_widget(block, popup);
    frame.render_widget(
        Paragraph::new(vec![
            Line::raw(message.to_string()),
            Line::styled("y = yes   n = no", Style::default().fg(Color::DarkGray)),
        ]),
        inner,
    );
}

fn render_picker(frame: &mut Frame, area: Rect, s: &State, list: &ListState) {
    let height = (s.settings.collections.len() as u16 + 2).clamp(5, 20);
    let popup = centered_rect(50, height, area);
    frame.render_widget(Clear, popup);
    let block = popup_block(" Collections ", Color::Cyan);
    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    let rows: Vec<Row> = s
        .settings
        .collections
        .iter()
        .map(|c| {
            let name = if c.active {
                format!("{} *", c.name)
            } else {
                c.name.clone()
            };
            Row::new(vec![
                Cell::raw(name),
                Cell::styled(c.presets.join(", "), Style::default().fg(Color::Magenta)),
            ])
        })
        .collect();
    let mut state = list.clone();
    state.ensure_visible(inner.height as usize);
    frame.render_widget(List::new(&rows, &[24], &state), inner);
}

pub(super) fn help_lines() -> Vec<&'static str> {
    vec![
        "dial: request-body sliders for the custom API source",
        "",
        "Global:",
        "  1 2 3      Switch tab",
        "  Ctrl+S     Save now",
        "  q, Ctrl+Q  Save and quit",
        "",
        "Sliders tab, config pane:",
        "  Up/Down    Select slider",
        "  Left/Right Select column",
        "  Enter      Edit field (changes apply as you type) / toggle On",
        "  Space      Toggle enabled",
        "  a          Add slider",
        "  d          Delete slider",
        "  K / J      Move slider up / down",
        "  [ / ]      Previous / next collection",
        "  c          Pick collection",
        "  n          New collection",
        "  x          Delete collection",
        "  b          Bind the host's current preset to this collection",
        "  e          Export collection to <name>.json",
        "  i          Import collection from a file",
        "  Tab        Focus live pane",
        "",
        "Sliders tab, live pane:",
        "  Up/Down    Select control",
        "  Left/Right Adjust by one step",
        "  Ctrl+←/→   Adjust by ten steps",
        "  Enter      Type a value",
        "  Tab, Esc   Back to config pane",
        "",
        "Edits are saved shortly after the last change.",
        "Sliders are only sent when the host's completion source is 'custom'.",
    ]
}

fn render_help(frame: &mut Frame, area: Rect, offset: usize) {
    let lines: Vec<Line> = help_lines()
        .into_iter()
        .map(|l| {
            if l.starts_with("  ") || l.is_empty() {
                Line::raw(l)
            } else if l.ends_with(':') {
                Line::styled(
                    l,
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )
            } else {
                Line::styled(l, Style::default().fg(Color::DarkGray))
            }
        })
        .collect();
    let max = lines.len().saturating_sub(area.height as usize);
    let offset = offset.min(max) as u16;
    frame.render_widget(Paragraph::new(lines).scroll((offset, 0)), area);
}
