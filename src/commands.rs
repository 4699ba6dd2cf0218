use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::bridge::{self, RequestDescriptor};
use crate::host::HostContext;
use crate::notify::{LogNotifier, Notifier};
use crate::settings::store::{HostSettings, SettingsRepository};
use crate::settings::{BindOutcome, ExtensionSettings};
use crate::transfer;

fn open(path: &Path) -> anyhow::Result<(HostSettings, ExtensionSettings)> {
    let mut host = HostSettings::open(path)?;
    let settings = host.load_extension();
    Ok((host, settings))
}

pub fn list(path: &Path) -> anyhow::Result<()> {
    let (_, settings) = open(path)?;
    println!("=== Collections ({}) ===", path.display());
    for c in &settings.collections {
        let marker = if c.active { " *" } else { "" };
        println!("  {}{marker}", c.name);
        if !c.presets.is_empty() {
            println!("    presets: {}", c.presets.join(", "));
        }
        if c.sliders.is_empty() {
            println!("    (no sliders)");
        }
        for s in &c.sliders {
            println!(
                "    {:<20} {:<20} [{} .. {}] step {} = {}{}",
                s.name,
                s.property,
                s.min,
                s.max,
                s.step,
                s.clamped_value(),
                if s.enabled { "" } else { " (off)" },
            );
        }
    }
    Ok(())
}

pub fn export(path: &Path, collection: Option<&str>, out: &Path) -> anyhow::Result<()> {
    let (_, settings) = open(path)?;
    let target = match collection {
        Some(name) => settings
            .collections
            .iter()
            .find(|c| c.name == name)
            .with_context(|| format!("no collection named '{name}'"))?,
        None => settings.active().context("no active collection")?,
    };
    let written = transfer::export_to_dir(target, out)?;
    println!("{}", written.display());
    Ok(())
}

pub fn import(path: &Path, file: &Path, name: Option<String>) -> anyhow::Result<()> {
    let (mut host, mut settings) = open(path)?;
    let sliders = transfer::read_sliders(file)?;
    let name = name.unwrap_or_else(|| transfer::suggested_name(file));
    let count = sliders.len();
    settings.add_collection(&name, sliders)?;
    host.persist(&settings)?;
    LogNotifier.info(&format!("Imported {count} slider(s) into '{}'", name.trim()));
    Ok(())
}

pub fn inject(path: &Path, request: Option<PathBuf>) -> anyhow::Result<()> {
    let (_, settings) = open(path)?;
    let text = match request {
        Some(file) => std::fs::read_to_string(&file)
            .with_context(|| format!("failed to read {}", file.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    let mut descriptor: RequestDescriptor =
        serde_json::from_str(&text).context("request descriptor is not valid JSON")?;
    let merged = bridge::prepare_request(&settings, &mut descriptor);
    log::info!("Merged {merged} slider value(s)");
    println!("{}", serde_json::to_string_pretty(&descriptor)?);
    Ok(())
}

pub fn preset(path: &Path, name: &str) -> anyhow::Result<()> {
    let (mut host, mut settings) = open(path)?;
    match settings.switch_to_preset(name) {
        Some(collection) => {
            LogNotifier.info(&format!("Preset '{name}' selected collection '{collection}'"));
            host.persist(&settings)?;
        }
        None => LogNotifier.info(&format!("Preset '{name}' does not change the active collection")),
    }
    Ok(())
}

pub fn bind(path: &Path, preset: Option<String>) -> anyhow::Result<()> {
    let (mut host, mut settings) = open(path)?;
    let preset = match preset {
        Some(p) => p,
        None => host.snapshot().preset_name().unwrap_or_default().to_string(),
    };
    let outcome = settings.bind_preset(&preset)?;
    report_bind(&mut LogNotifier, &settings, &preset, outcome);
    host.persist(&settings)?;
    Ok(())
}

/// Tell the user where a preset binding ended up.
pub fn report_bind(
    notifier: &mut dyn Notifier,
    settings: &ExtensionSettings,
    preset: &str,
    outcome: BindOutcome,
) {
    let active = settings.active().map_or("", |c| c.name.as_str());
    match outcome {
        BindOutcome::Bound => {
            notifier.info(&format!("Preset '{preset}' bound to '{active}'"));
        }
        BindOutcome::AlreadyBound => {
            notifier.info(&format!("Preset '{preset}' is already bound to '{active}'"));
        }
        BindOutcome::Moved { from } => {
            let previous = settings.collections.get(from).map_or("?", |c| c.name.as_str());
            notifier.warn(&format!(
                "Preset '{preset}' moved from '{previous}' to '{active}'"
            ));
        }
    }
}
