#![allow(clippy::collapsible_if)]

mod bridge;
mod cli;
mod commands;
mod config;
mod host;
mod live;
mod notify;
mod persist;
mod settings;
mod transfer;
mod tui;

use std::io::Write;
use std::path::PathBuf;
use std::time::SystemTime;

use clap::Parser;
use cli::{Cli, Command};

use crate::settings::store::{HostSettings, SettingsRepository};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    config::init(config::load()?);
    let settings_path = resolve_settings_path(cli.settings);

    match cli.command {
        None => run_tui(settings_path),
        Some(command) => {
            env_logger::init();
            match command {
                Command::List => commands::list(&settings_path),
                Command::Export { collection, out } => commands::export(
                    &settings_path,
                    collection.as_deref(),
                    out.as_deref().unwrap_or(config::export_dir()),
                ),
                Command::Import { file, name } => commands::import(&settings_path, &file, name),
                Command::Inject { request } => commands::inject(&settings_path, request),
                Command::Preset { name } => commands::preset(&settings_path, &name),
                Command::Bind { preset } => commands::bind(&settings_path, preset),
            }
        }
    }
}

fn resolve_settings_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| config::settings_path().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("settings.json"))
}

/// Custom logger that writes to stderr with \r\n line endings for raw mode.
struct RawModeLogger;

impl log::Log for RawModeLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            let now = SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default();
            let secs = now.as_secs() % 86400; // time of day
            let h = secs / 3600;
            let m = (secs % 3600) / 60;
            let s = secs % 60;
            let ms = now.subsec_millis();
            let _ = write!(
                std::io::stderr(),
                "[{h:02}:{m:02}:{s:02}.{ms:03} {}] {}\r\n",
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static RAW_MODE_LOGGER: RawModeLogger = RawModeLogger;

fn run_tui(settings_path: PathBuf) -> anyhow::Result<()> {
    log::set_logger(&RAW_MODE_LOGGER).ok();
    log::set_max_level(
        std::env::var("RUST_LOG")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
    );

    let mut store = HostSettings::open(&settings_path)?;
    let settings = store.load_extension();
    let snapshot = store.snapshot();
    log::info!(
        "Loaded {} slider collection(s) from {}",
        settings.collections.len(),
        settings_path.display()
    );

    let (host_tx, host_rx) = crossbeam_channel::unbounded::<host::HostEvent>();
    let watcher = host::Watcher::spawn(settings_path, snapshot.clone(), host_tx);

    let result = tui::run(tui::Session {
        store,
        settings,
        host: snapshot,
        host_rx,
        save_delay: config::save_delay(),
        export_dir: config::export_dir().to_path_buf(),
    });

    drop(watcher);
    result
}
