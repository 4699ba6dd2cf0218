mod render;

use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use view::list::ListState;
use view::text_input::TextInputState;

use crate::bridge::{self, Reaction};
use crate::commands::report_bind;
use crate::host::{HostEvent, HostSnapshot};
use crate::live::{self, LivePanel};
use crate::notify::{Notifier, Toasts};
use crate::persist::Debouncer;
use crate::settings::store::{HostSettings, SettingsRepository};
use crate::settings::{ExtensionSettings, ModelError, SliderField, SliderModel, parse_float};
use crate::transfer;

const TAB_NAMES: &[&str] = &["(1) Sliders", "(2) Request", "(3) Help"];

/// Everything the terminal UI needs, prepared by `main`.
pub struct Session {
    pub store: HostSettings,
    pub settings: ExtensionSettings,
    pub host: HostSnapshot,
    pub host_rx: Receiver<HostEvent>,
    pub save_delay: Duration,
    pub export_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
    Config,
    Live,
}

/// A text field of one slider being typed into.
struct FieldEdit {
    slider: usize,
    field: SliderField,
    input: TextInputState,
}

enum PromptAction {
    NewCollection,
    ImportPath,
    ImportName(Vec<SliderModel>),
    LiveValue(usize),
}

enum ConfirmAction {
    DeleteSlider(usize),
    DeleteCollection,
}

enum Popup {
    Prompt {
        title: String,
        input: TextInputState,
        action: PromptAction,
    },
    Confirm {
        message: String,
        action: ConfirmAction,
    },
    Picker {
        list: ListState,
    },
}

struct State {
    store: HostSettings,
    settings: ExtensionSettings,
    host: HostSnapshot,
    export_dir: PathBuf,
    debouncer: Debouncer,
    toasts: Toasts,

    active_tab: usize,
    focus: Focus,
    rows: ListState,
    column: usize,
    live: ListState,
    panel: LivePanel,
    /// Duplicate ids already reported, so each is warned about once.
    warned: Vec<(String, String)>,
    editing: Option<FieldEdit>,
    popup: Option<Popup>,
    help_offset: usize,
    quit: bool,
}

impl State {
    fn new(
        store: HostSettings,
        settings: ExtensionSettings,
        host: HostSnapshot,
        save_delay: Duration,
        export_dir: PathBuf,
    ) -> Self {
        let mut s = Self {
            store,
            settings,
            host,
            export_dir,
            debouncer: Debouncer::new(save_delay),
            toasts: Toasts::default(),
            active_tab: 0,
            focus: Focus::Config,
            rows: ListState::new(0),
            column: 0,
            live: ListState::new(0),
            panel: LivePanel::default(),
            warned: Vec::new(),
            editing: None,
            popup: None,
            help_offset: 0,
            quit: false,
        };
        s.refresh();
        s
    }

    /// Rebuild everything derived from the settings: list lengths and the
    /// live panel.
    fn refresh(&mut self) {
        self.panel = live::project(&mut self.settings, &self.host);
        if self.panel.clamped {
            self.debouncer.mark_dirty(Instant::now());
        }
        for (name, id) in &self.panel.duplicates {
            if !self.warned.iter().any(|(n, i)| n == name && i == id) {
                self.toasts.warn(&format!(
                    "Slider '{name}' skipped: another enabled slider already uses {id}"
                ));
            }
        }
        self.warned = self.panel.duplicates.clone();
        self.rows.set_len(self.settings.sliders().len());
        self.live.set_len(self.panel.controls.len());
        if self.panel.controls.is_empty() && self.focus == Focus::Live {
            self.focus = Focus::Config;
        }
    }

    /// A mutation happened: schedule a save and rebuild the views.
    fn changed(&mut self) {
        self.debouncer.mark_dirty(Instant::now());
        self.refresh();
    }

    /// Write pending changes. Returns false if saving failed; the failure is
    /// not retried until the next change.
    fn flush(&mut self) -> bool {
        if !self.debouncer.is_dirty() {
            return true;
        }
        let saved = match self.store.persist(&self.settings) {
            Ok(()) => true,
            Err(e) => {
                self.toasts.error(&format!("Could not save settings: {e:#}"));
                false
            }
        };
        self.debouncer.flushed();
        saved
    }

    fn tick(&mut self, now: Instant) {
        if self.debouncer.due(now) {
            self.flush();
        }
    }

    fn apply_host_event(&mut self, ev: HostEvent) {
        match bridge::handle_event(&mut self.settings, &mut self.host, ev) {
            Reaction::Switched(name) => {
                let preset = self.host.preset.clone().unwrap_or_default();
                self.toasts
                    .info(&format!("Preset '{preset}' selected collection '{name}'"));
                self.leave_collection();
                self.changed();
            }
            Reaction::HintChanged(_) | Reaction::Nothing => self.refresh(),
        }
    }

    fn selected_field(&self) -> SliderField {
        SliderField::ALL[self.column.min(SliderField::ALL.len() - 1)]
    }

    fn selected_slider(&self) -> Option<usize> {
        (self.rows.selected < self.settings.sliders().len()).then_some(self.rows.selected)
    }

    fn switch_collection(&mut self, index: usize) {
        if self.settings.active_index() == Some(index) {
            return;
        }
        if self.settings.activate(index) {
            self.leave_collection();
            self.changed();
        }
    }

    /// The active collection is about to change under the UI: anything that
    /// refers to its sliders by index is dropped.
    fn leave_collection(&mut self) {
        self.editing = None;
        let stale = matches!(
            self.popup,
            Some(Popup::Confirm { .. })
                | Some(Popup::Prompt {
                    action: PromptAction::LiveValue(_),
                    ..
                })
        );
        if stale {
            self.popup = None;
        }
        self.rows = ListState::new(0);
        self.live = ListState::new(0);
    }

    fn cycle_collection(&mut self, forward: bool) {
        let len = self.settings.collections.len();
        if len < 2 {
            return;
        }
        let current = self.settings.active_index().unwrap_or(0);
        let next = if forward {
            (current + 1) % len
        } else {
            (current + len - 1) % len
        };
        self.switch_collection(next);
    }

    /// Enter on a config cell: start typing, or toggle the checkbox column.
    fn activate_cell(&mut self) {
        let Some(slider) = self.selected_slider() else {
            return;
        };
        let field = self.selected_field();
        if field.is_text() {
            let text = self.settings.sliders()[slider].field_text(field);
            self.editing = Some(FieldEdit {
                slider,
                field,
                input: TextInputState::new(text),
            });
        } else {
            self.toggle_selected();
        }
    }

    fn toggle_selected(&mut self) {
        if let Some(slider) = self.selected_slider() {
            if self.settings.toggle_slider(slider).is_some() {
                self.changed();
            }
        }
    }

    /// Push the edit buffer into the slider so the live panel follows each
    /// keystroke.
    fn write_through(&mut self) {
        if let Some(edit) = &self.editing {
            let (slider, field) = (edit.slider, edit.field);
            let text = edit.input.value.clone();
            if self.settings.set_slider_field(slider, field, &text) {
                self.changed();
            }
        }
    }

    fn add_slider(&mut self) {
        if let Some(index) = self.settings.add_slider() {
            self.changed();
            self.rows.select(index);
            self.column = 0;
        }
    }

    fn move_selected(&mut self, up: bool) {
        let Some(slider) = self.selected_slider() else {
            return;
        };
        let moved = if up {
            self.settings.move_slider_up(slider)
        } else {
            self.settings.move_slider_down(slider)
        };
        if moved {
            self.changed();
            self.rows.select(if up { slider - 1 } else { slider + 1 });
        }
    }

    fn ask_delete_slider(&mut self) {
        let Some(slider) = self.selected_slider() else {
            return;
        };
        let name = &self.settings.sliders()[slider].name;
        let label = if name.is_empty() { "(unnamed)" } else { name.as_str() };
        self.popup = Some(Popup::Confirm {
            message: format!("Delete slider '{label}'?"),
            action: ConfirmAction::DeleteSlider(slider),
        });
    }

    fn ask_delete_collection(&mut self) {
        if self.settings.collections.len() <= 1 {
            self.toasts.warn(&ModelError::LastCollection.to_string());
            return;
        }
        let name = self.settings.active().map_or("", |c| c.name.as_str());
        self.popup = Some(Popup::Confirm {
            message: format!("Delete collection '{name}'?"),
            action: ConfirmAction::DeleteCollection,
        });
    }

    fn confirm(&mut self, action: ConfirmAction) {
        match action {
            ConfirmAction::DeleteSlider(index) => {
                if self.settings.remove_slider(index).is_some() {
                    self.changed();
                }
            }
            ConfirmAction::DeleteCollection => match self.settings.delete_active() {
                Ok(removed) => {
                    self.toasts
                        .info(&format!("Deleted collection '{}'", removed.name));
                    self.rows = ListState::new(0);
                    self.changed();
                }
                Err(e) => self.toasts.warn(&e.to_string()),
            },
        }
    }

    fn prompt(&mut self, title: &str, initial: &str, action: PromptAction) {
        self.popup = Some(Popup::Prompt {
            title: title.to_string(),
            input: TextInputState::new(initial),
            action,
        });
    }

    /// A prompt was answered. Empty answers cancel.
    fn submit(&mut self, action: PromptAction, answer: String) {
        let answer = answer.trim();
        if answer.is_empty() {
            return;
        }
        match action {
            PromptAction::NewCollection => match self.settings.create_collection(answer) {
                Ok(_) => {
                    self.rows = ListState::new(0);
                    self.changed();
                }
                Err(e) => self.toasts.warn(&e.to_string()),
            },
            PromptAction::ImportPath => {
                let path = PathBuf::from(answer);
                match transfer::read_sliders(&path) {
                    Ok(sliders) => {
                        let name = transfer::suggested_name(&path);
                        self.prompt("Collection name", &name, PromptAction::ImportName(sliders));
                    }
                    Err(e) => self.toasts.error(&format!("Import failed: {e}")),
                }
            }
            PromptAction::ImportName(sliders) => {
                let count = sliders.len();
                match self.settings.add_collection(answer, sliders) {
                    Ok(_) => {
                        self.toasts
                            .info(&format!("Imported {count} slider(s) into '{answer}'"));
                        self.rows = ListState::new(0);
                        self.changed();
                        // Imports are saved right away.
                        self.flush();
                    }
                    Err(e) => self.toasts.warn(&e.to_string()),
                }
            }
            PromptAction::LiveValue(slider) => match parse_float(answer) {
                Some(value) => {
                    if let Some(v) = live::set_value(&mut self.settings, slider, value) {
                        self.set_live_value(slider, v);
                    }
                }
                None => self.toasts.warn(&format!("'{answer}' is not a number")),
            },
        }
    }

    fn bind_preset(&mut self) {
        let Some(preset) = self.host.preset.clone() else {
            self.toasts.warn("No preset is selected in the host");
            return;
        };
        match self.settings.bind_preset(&preset) {
            Ok(outcome) => {
                report_bind(&mut self.toasts, &self.settings, &preset, outcome);
                self.changed();
            }
            Err(e) => self.toasts.warn(&e.to_string()),
        }
    }

    fn export(&mut self) {
        let Some(collection) = self.settings.active() else {
            return;
        };
        match transfer::export_to_dir(collection, &self.export_dir) {
            Ok(path) => self.toasts.info(&format!("Exported to {}", path.display())),
            Err(e) => self.toasts.error(&format!("Export failed: {e}")),
        }
    }

    fn open_picker(&mut self) {
        let mut list = ListState::new(self.settings.collections.len());
        list.select(self.settings.active_index().unwrap_or(0));
        self.popup = Some(Popup::Picker { list });
    }

    /// Update one live control in place instead of re-projecting.
    fn set_live_value(&mut self, slider: usize, value: f64) {
        if let Some(control) = self.panel.controls.iter_mut().find(|c| c.slider == slider) {
            control.value = value;
        }
        self.debouncer.mark_dirty(Instant::now());
    }

    fn nudge_live(&mut self, steps: f64) {
        let Some(slider) = self.panel.controls.get(self.live.selected).map(|c| c.slider) else {
            return;
        };
        if let Some(value) = live::nudge(&mut self.settings, slider, steps) {
            self.set_live_value(slider, value);
        }
    }
}

pub fn run(session: Session) -> anyhow::Result<()> {
    let Session {
        store,
        settings,
        host,
        host_rx,
        save_delay,
        export_dir,
    } = session;
    let mut s = State::new(store, settings, host, save_delay, export_dir);

    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Logging would draw over the alternate screen unless stderr is redirected.
    let prev_log_level = log::max_level();
    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        log::set_max_level(log::LevelFilter::Off);
    }

    let result = event_loop(&mut terminal, &mut s, &host_rx);
    s.flush();

    log::set_max_level(prev_log_level);

    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    crossterm::terminal::disable_raw_mode()?;

    result.map_err(Into::into)
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    s: &mut State,
    host_rx: &Receiver<HostEvent>,
) -> io::Result<()> {
    loop {
        while let Ok(ev) = host_rx.try_recv() {
            s.apply_host_event(ev);
        }
        s.tick(Instant::now());

        terminal.draw(|frame| render::render(frame, s))?;
        if s.quit {
            break;
        }

        // Wake up regularly for host events and pending saves.
        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        process_event(s, event::read()?);
        while event::poll(Duration::ZERO)? {
            process_event(s, event::read()?);
        }
    }
    Ok(())
}

fn process_event(s: &mut State, ev: Event) {
    if let Event::Key(key) = ev {
        if key.kind == KeyEventKind::Press {
            handle_key_event(s, key.code, key.modifiers);
        }
    }
}

fn handle_key_event(s: &mut State, code: KeyCode, modifiers: KeyModifiers) {
    if s.popup.is_some() {
        handle_popup_key(s, code);
    } else if s.editing.is_some() {
        handle_edit_key(s, code);
    } else {
        handle_key(s, code, modifiers);
    }
}

fn handle_popup_key(s: &mut State, code: KeyCode) {
    let Some(popup) = s.popup.take() else {
        return;
    };
    match popup {
        Popup::Prompt {
            title,
            mut input,
            action,
        } => match code {
            KeyCode::Esc => {}
            KeyCode::Enter => s.submit(action, input.value),
            _ => {
                edit_input(&mut input, code);
                s.popup = Some(Popup::Prompt {
                    title,
                    input,
                    action,
                });
            }
        },
        Popup::Confirm { message, action } => match code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => s.confirm(action),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {}
            _ => s.popup = Some(Popup::Confirm { message, action }),
        },
        Popup::Picker { mut list } => match code {
            KeyCode::Esc => {}
            KeyCode::Enter => s.switch_collection(list.selected),
            KeyCode::Up => {
                list.up();
                s.popup = Some(Popup::Picker { list });
            }
            KeyCode::Down => {
                list.down();
                s.popup = Some(Popup::Picker { list });
            }
            _ => s.popup = Some(Popup::Picker { list }),
        },
    }
}

/// Line-editing keys shared by prompts and cell edits. Returns true if the
/// text changed.
fn edit_input(input: &mut TextInputState, code: KeyCode) -> bool {
    let before = input.value.len();
    match code {
        KeyCode::Backspace => input.backspace(),
        KeyCode::Delete => input.delete(),
        KeyCode::Left => input.move_left(),
        KeyCode::Right => input.move_right(),
        KeyCode::Home => input.home(),
        KeyCode::End => input.end(),
        KeyCode::Char(ch) => input.insert(ch),
        _ => {}
    }
    input.value.len() != before
}

fn handle_edit_key(s: &mut State, code: KeyCode) {
    match code {
        KeyCode::Esc | KeyCode::Enter | KeyCode::Tab => s.editing = None,
        _ => {
            let changed = s
                .editing
                .as_mut()
                .is_some_and(|edit| edit_input(&mut edit.input, code));
            if changed {
                s.write_through();
            }
        }
    }
}

fn handle_key(s: &mut State, code: KeyCode, modifiers: KeyModifiers) {
    let ctrl = modifiers.contains(KeyModifiers::CONTROL);
    match code {
        KeyCode::Char('q') | KeyCode::Char('c') if ctrl => s.quit = true,
        KeyCode::Char('s') if ctrl => {
            s.debouncer.mark_dirty(Instant::now());
            if s.flush() {
                s.toasts.info("Saved");
            }
        }
        KeyCode::Char('q') => s.quit = true,
        KeyCode::Char('1') => s.active_tab = 0,
        KeyCode::Char('2') => s.active_tab = 1,
        KeyCode::Char('3') => s.active_tab = 2,
        _ if s.active_tab == 0 => match s.focus {
            Focus::Config => handle_config_key(s, code),
            Focus::Live => handle_live_key(s, code, modifiers),
        },
        KeyCode::Up if s.active_tab == 2 => s.help_offset = s.help_offset.saturating_sub(1),
        KeyCode::Down if s.active_tab == 2 => {
            let last = render::help_lines().len().saturating_sub(1);
            s.help_offset = (s.help_offset + 1).min(last);
        }
        _ => {}
    }
}

fn handle_config_key(s: &mut State, code: KeyCode) {
    match code {
        KeyCode::Up => {
            s.rows.up();
        }
        KeyCode::Down => {
            s.rows.down();
        }
        KeyCode::Left => s.column = s.column.saturating_sub(1),
        KeyCode::Right => s.column = (s.column + 1).min(SliderField::ALL.len() - 1),
        KeyCode::Enter => s.activate_cell(),
        KeyCode::Char(' ') => s.toggle_selected(),
        KeyCode::Char('a') => s.add_slider(),
        KeyCode::Char('d') => s.ask_delete_slider(),
        KeyCode::Char('K') => s.move_selected(true),
        KeyCode::Char('J') => s.move_selected(false),
        KeyCode::Char('[') => s.cycle_collection(false),
        KeyCode::Char(']') => s.cycle_collection(true),
        KeyCode::Char('c') => s.open_picker(),
        KeyCode::Char('n') => s.prompt("New collection", "", PromptAction::NewCollection),
        KeyCode::Char('x') => s.ask_delete_collection(),
        KeyCode::Char('b') => s.bind_preset(),
        KeyCode::Char('e') => s.export(),
        KeyCode::Char('i') => s.prompt("Import sliders from", "", PromptAction::ImportPath),
        KeyCode::Tab if !s.panel.controls.is_empty() => s.focus = Focus::Live,
        _ => {}
    }
}

fn handle_live_key(s: &mut State, code: KeyCode, modifiers: KeyModifiers) {
    let steps = if modifiers.contains(KeyModifiers::CONTROL) {
        10.0
    } else {
        1.0
    };
    match code {
        KeyCode::Tab | KeyCode::Esc => s.focus = Focus::Config,
        KeyCode::Up => {
            s.live.up();
        }
        KeyCode::Down => {
            s.live.down();
        }
        KeyCode::Left => s.nudge_live(-steps),
        KeyCode::Right => s.nudge_live(steps),
        KeyCode::Enter => {
            if let Some(control) = s.panel.controls.get(s.live.selected) {
                let (slider, title) = (control.slider, control.label.clone());
                let current = render::format_value(control.value);
                s.prompt(&title, &current, PromptAction::LiveValue(slider));
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Level;
    use serde_json::{Value, json};
    use std::fs;
    use std::path::Path;

    fn state() -> State {
        let mut store = HostSettings::in_memory(json!({
            "oai_settings": {
                "chat_completion_source": "custom",
                "preset_settings_openai": "Wild"
            }
        }));
        let settings = store.load_extension();
        let host = store.snapshot();
        State::new(store, settings, host, Duration::from_millis(1000), PathBuf::from("."))
    }

    /// A state backed by `settings.json` in `dir`, exporting into `dir`.
    fn file_state(dir: &Path) -> State {
        let path = dir.join("settings.json");
        let host = json!({ "oai_settings": { "chat_completion_source": "custom" } });
        fs::write(&path, host.to_string()).unwrap();
        let mut store = HostSettings::open(&path).unwrap();
        let settings = store.load_extension();
        let host = store.snapshot();
        State::new(store, settings, host, Duration::from_millis(1000), dir.to_path_buf())
    }

    fn saved_namespace(dir: &Path) -> Value {
        let text = fs::read_to_string(dir.join("settings.json")).unwrap();
        let root: Value = serde_json::from_str(&text).unwrap();
        root["extension_settings"]["custom_sliders"].clone()
    }

    fn toast(s: &State) -> (Level, String) {
        let t = s.toasts.current(Instant::now()).unwrap();
        (t.level, t.message.clone())
    }

    /// "Default" holds slider A; "Creative" holds Z and is bound to the host
    /// preset "Wild". Default is left active.
    fn bound_pair() -> State {
        let mut s = state();
        add_named(&mut s, "A", "a");
        press(&mut s, KeyCode::Char('n'));
        type_text(&mut s, "Creative");
        press(&mut s, KeyCode::Enter);
        add_named(&mut s, "Z", "z");
        press(&mut s, KeyCode::Char('b'));
        press(&mut s, KeyCode::Char('['));
        assert_eq!(s.settings.active().unwrap().name, "Default");
        s
    }

    fn press(s: &mut State, code: KeyCode) {
        handle_key_event(s, code, KeyModifiers::NONE);
    }

    fn type_text(s: &mut State, text: &str) {
        for ch in text.chars() {
            press(s, KeyCode::Char(ch));
        }
    }

    /// Add a slider and fill in name and property through the cell editor.
    fn add_named(s: &mut State, name: &str, property: &str) {
        press(s, KeyCode::Char('a'));
        press(s, KeyCode::Enter);
        type_text(s, name);
        press(s, KeyCode::Enter);
        press(s, KeyCode::Right);
        press(s, KeyCode::Enter);
        type_text(s, property);
        press(s, KeyCode::Enter);
        s.column = 0;
    }

    #[test]
    fn cell_edits_write_through_to_live_panel() {
        let mut s = state();
        add_named(&mut s, "Temp", "temperature");
        assert_eq!(s.settings.sliders()[0].name, "Temp");
        assert_eq!(s.panel.controls.len(), 1);
        assert_eq!(s.panel.controls[0].id, "custom_slider_temperature");
        assert!(s.debouncer.is_dirty());
    }

    #[test]
    fn space_toggles_and_hides_control() {
        let mut s = state();
        add_named(&mut s, "Temp", "temperature");
        press(&mut s, KeyCode::Char(' '));
        assert!(!s.settings.sliders()[0].enabled);
        assert!(s.panel.controls.is_empty());
    }

    #[test]
    fn delete_slider_waits_for_confirmation() {
        let mut s = state();
        add_named(&mut s, "A", "a");
        press(&mut s, KeyCode::Char('d'));
        press(&mut s, KeyCode::Char('n'));
        assert_eq!(s.settings.sliders().len(), 1);
        press(&mut s, KeyCode::Char('d'));
        press(&mut s, KeyCode::Char('y'));
        assert!(s.settings.sliders().is_empty());
        assert!(s.popup.is_none());
    }

    #[test]
    fn new_collection_prompt_rejects_duplicates() {
        let mut s = state();
        press(&mut s, KeyCode::Char('n'));
        type_text(&mut s, "Default");
        press(&mut s, KeyCode::Enter);
        assert_eq!(s.settings.collections.len(), 1);

        press(&mut s, KeyCode::Char('n'));
        type_text(&mut s, "Creative");
        press(&mut s, KeyCode::Enter);
        assert_eq!(s.settings.collections.len(), 2);
        assert_eq!(s.settings.active().unwrap().name, "Creative");

        press(&mut s, KeyCode::Char('['));
        assert_eq!(s.settings.active().unwrap().name, "Default");
    }

    #[test]
    fn empty_prompt_answer_cancels() {
        let mut s = state();
        press(&mut s, KeyCode::Char('n'));
        type_text(&mut s, "   ");
        press(&mut s, KeyCode::Enter);
        assert_eq!(s.settings.collections.len(), 1);
        assert!(!s.debouncer.is_dirty());
    }

    #[test]
    fn last_collection_cannot_be_deleted() {
        let mut s = state();
        press(&mut s, KeyCode::Char('x'));
        assert!(s.popup.is_none());
        assert_eq!(s.settings.collections.len(), 1);
    }

    #[test]
    fn bind_uses_host_preset_and_preset_event_switches() {
        let mut s = state();
        s.settings.create_collection("Creative").unwrap();
        s.refresh();
        press(&mut s, KeyCode::Char('b'));
        assert!(s.settings.collections[1].has_preset("Wild"));

        press(&mut s, KeyCode::Char('['));
        assert_eq!(s.settings.active().unwrap().name, "Default");
        s.apply_host_event(HostEvent::PresetChanged(Some("Wild".into())));
        assert_eq!(s.settings.active().unwrap().name, "Creative");
    }

    #[test]
    fn live_nudge_and_typed_value() {
        let mut s = state();
        add_named(&mut s, "Temp", "temperature");
        press(&mut s, KeyCode::Tab);
        assert_eq!(s.focus, Focus::Live);
        press(&mut s, KeyCode::Right);
        assert_eq!(s.settings.sliders()[0].value, 0.01);
        assert_eq!(s.panel.controls[0].value, 0.01);

        press(&mut s, KeyCode::Enter);
        for _ in 0..8 {
            press(&mut s, KeyCode::Backspace);
        }
        type_text(&mut s, "7");
        press(&mut s, KeyCode::Enter);
        assert_eq!(s.settings.sliders()[0].value, 1.0);
    }

    #[test]
    fn duplicate_property_warned_once() {
        let mut s = state();
        add_named(&mut s, "A", "temperature");
        s.rows.select(0);
        add_named(&mut s, "B", "temperature");
        assert_eq!(s.warned.len(), 1);
        assert!(s.toasts.current(Instant::now()).is_some());
        s.toasts.clear();
        s.refresh();
        assert!(s.toasts.current(Instant::now()).is_none());
    }

    #[test]
    fn flush_persists_into_host_root() {
        let mut s = state();
        add_named(&mut s, "Temp", "temperature");
        s.tick(Instant::now() + Duration::from_secs(2));
        assert!(!s.debouncer.is_dirty());
        let saved = &s.store.root()["extension_settings"]["custom_sliders"];
        assert_eq!(saved["collections"][0]["sliders"][0]["property"], "temperature");
    }

    #[test]
    fn preset_switch_drops_pending_slider_delete() {
        let mut s = bound_pair();
        s.rows.select(0);
        press(&mut s, KeyCode::Char('d'));
        assert!(s.popup.is_some());

        s.apply_host_event(HostEvent::PresetChanged(Some("Wild".into())));
        assert_eq!(s.settings.active().unwrap().name, "Creative");
        assert!(s.popup.is_none());
        press(&mut s, KeyCode::Char('y'));

        assert_eq!(s.settings.collections[1].sliders.len(), 1);
        assert_eq!(s.settings.collections[1].sliders[0].name, "Z");
        assert_eq!(s.settings.collections[0].sliders[0].name, "A");
    }

    #[test]
    fn preset_switch_ends_cell_edit() {
        let mut s = bound_pair();
        s.rows.select(0);
        press(&mut s, KeyCode::Enter);
        assert!(s.editing.is_some());

        s.apply_host_event(HostEvent::PresetChanged(Some("Wild".into())));
        assert!(s.editing.is_none());
        type_text(&mut s, "zz");

        assert_eq!(s.settings.sliders()[0].name, "Z");
        assert_eq!(s.settings.collections[0].sliders[0].name, "A");
    }

    #[test]
    fn value_clamped_on_load_is_scheduled_for_saving() {
        let mut store = HostSettings::in_memory(json!({
            "oai_settings": { "chat_completion_source": "custom" },
            "extension_settings": { "custom_sliders": { "collections": [{
                "name": "Default", "active": true, "sliders": [{
                    "name": "Temp", "property": "temperature",
                    "min": "0", "max": "1", "step": "0.1", "value": 5, "enabled": true
                }]
            }] } }
        }));
        let settings = store.load_extension();
        let host = store.snapshot();
        let mut s = State::new(store, settings, host, Duration::ZERO, PathBuf::from("."));
        assert_eq!(s.settings.sliders()[0].value, 1.0);
        assert!(s.debouncer.is_dirty());

        s.tick(Instant::now() + Duration::from_millis(10));
        let saved = &s.store.root()["extension_settings"]["custom_sliders"];
        assert_eq!(saved["collections"][0]["sliders"][0]["value"], 1.0);
    }

    #[test]
    fn help_scroll_stops_at_last_line() {
        let mut s = state();
        press(&mut s, KeyCode::Char('3'));
        for _ in 0..100 {
            press(&mut s, KeyCode::Down);
        }
        press(&mut s, KeyCode::Up);
        assert_eq!(s.help_offset, render::help_lines().len() - 2);
    }

    #[test]
    fn import_prompts_for_name_and_saves_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Creative.json");
        fs::write(&file, r#"[{"name":"Temp","property":"temperature","max":2}]"#).unwrap();
        let mut s = file_state(dir.path());

        press(&mut s, KeyCode::Char('i'));
        type_text(&mut s, &file.display().to_string());
        press(&mut s, KeyCode::Enter);
        match &s.popup {
            Some(Popup::Prompt {
                input,
                action: PromptAction::ImportName(sliders),
                ..
            }) => {
                assert_eq!(input.value, "Creative");
                assert_eq!(sliders.len(), 1);
            }
            _ => panic!("expected the collection name prompt"),
        }
        press(&mut s, KeyCode::Enter);

        assert_eq!(s.settings.active().unwrap().name, "Creative");
        assert_eq!(s.settings.sliders()[0].max, "2");
        assert!(!s.debouncer.is_dirty());
        let saved = saved_namespace(dir.path());
        assert_eq!(saved["collections"][1]["name"], "Creative");
        assert_eq!(saved["collections"][1]["active"], true);
    }

    #[test]
    fn import_under_taken_name_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("Default.json");
        fs::write(&file, r#"[{"name":"Temp","property":"temperature"}]"#).unwrap();
        let mut s = file_state(dir.path());

        press(&mut s, KeyCode::Char('i'));
        type_text(&mut s, &file.display().to_string());
        press(&mut s, KeyCode::Enter);
        press(&mut s, KeyCode::Enter);

        assert_eq!(s.settings.collections.len(), 1);
        assert!(s.settings.sliders().is_empty());
        assert_eq!(toast(&s).0, Level::Warn);
    }

    #[test]
    fn export_writes_collection_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = file_state(dir.path());
        add_named(&mut s, "Temp", "temperature");
        press(&mut s, KeyCode::Char('e'));

        let sliders = transfer::read_sliders(&dir.path().join("Default.json")).unwrap();
        assert_eq!(sliders.len(), 1);
        assert_eq!(sliders[0].property, "temperature");
        assert_eq!(toast(&s).0, Level::Info);
    }

    #[test]
    fn ctrl_s_saves_into_host_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = file_state(dir.path());
        add_named(&mut s, "Temp", "temperature");
        handle_key_event(&mut s, KeyCode::Char('s'), KeyModifiers::CONTROL);

        assert!(!s.debouncer.is_dirty());
        assert_eq!(toast(&s), (Level::Info, "Saved".to_string()));
        let saved = saved_namespace(dir.path());
        assert_eq!(saved["collections"][0]["sliders"][0]["property"], "temperature");
    }
}
