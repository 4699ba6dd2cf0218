use std::time::{Duration, Instant};

const TOAST_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

/// User-facing messages: warnings about rejected actions, confirmations.
pub trait Notifier {
    fn notify(&mut self, level: Level, message: String);

    fn info(&mut self, message: &str) {
        self.notify(Level::Info, message.to_string());
    }

    fn warn(&mut self, message: &str) {
        self.notify(Level::Warn, message.to_string());
    }

    fn error(&mut self, message: &str) {
        self.notify(Level::Error, message.to_string());
    }
}

fn log_message(level: Level, message: &str) {
    match level {
        Level::Info => log::info!("{message}"),
        Level::Warn => log::warn!("{message}"),
        Level::Error => log::error!("{message}"),
    }
}

/// Notifier for CLI subcommands: everything goes to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, level: Level, message: String) {
        log_message(level, &message);
    }
}

pub struct Toast {
    pub level: Level,
    pub message: String,
    shown_at: Instant,
}

/// Status-line toasts for the TUI. Only the latest message is shown.
#[derive(Default)]
pub struct Toasts {
    current: Option<Toast>,
}

impl Toasts {
    pub fn current(&self, now: Instant) -> Option<&Toast> {
        self.current
            .as_ref()
            .filter(|t| now.saturating_duration_since(t.shown_at) < TOAST_TTL)
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

impl Notifier for Toasts {
    fn notify(&mut self, level: Level, message: String) {
        log_message(level, &message);
        self.current = Some(Toast {
            level,
            message,
            shown_at: Instant::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_toast_wins_and_expires() {
        let mut toasts = Toasts::default();
        toasts.info("saved");
        toasts.warn("duplicate");
        let now = Instant::now();
        let t = toasts.current(now).unwrap();
        assert_eq!(t.level, Level::Warn);
        assert_eq!(t.message, "duplicate");
        assert!(toasts.current(now + TOAST_TTL + Duration::from_millis(1)).is_none());
        toasts.clear();
        assert!(toasts.current(now).is_none());
    }
}
