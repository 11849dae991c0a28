//! # Cloudlight Log Tool
//!
//! Host-side entry point for the event log. It opens the emulated EEPROM
//! image named in cloudlight.toml, runs one command against the log, and
//! flushes before exiting so nothing staged is lost between invocations.
//!
//! ```text
//! cloudlight [--config <path>] <command>
//!
//!   cloud <percent>        record a cloud coverage sample (0-100)
//!   light <on|off>         record a light toggle
//!   state <code>           record a controller state (0-4)
//!   error <code>           record an error code (0-255)
//!   export <type>          print the chart series for cloud|light|system|error
//!   dump                   print every live entry, oldest first
//!   count                  print the number of live entries
//!   reset                  clear the log
//! ```
//!
//! Set `RUST_LOG=debug` to see individual appends and commits.

use anyhow::{anyhow, bail, Context};
use cloudlight_lib::config::Config;
use cloudlight_lib::{EntryKind, FileStore, LogManager, SystemClock, TimeSource};
use log::{info, warn};
use std::env;

const USAGE: &str = "usage: cloudlight [--config <path>] \
    <cloud <pct> | light <on|off> | state <code> | error <code> | export <type> | dump | count | reset>";

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let mut args: Vec<String> = env::args().skip(1).collect();
    let config = match args.iter().position(|arg| arg == "--config") {
        Some(i) => {
            let path = args
                .get(i + 1)
                .cloned()
                .ok_or_else(|| anyhow!("--config needs a path"))?;
            args.drain(i..=i + 1);
            Config::load_from_path(path)
        }
        None => Config::load(),
    };
    config
        .validate()
        .context("invalid storage configuration")?;

    let store = FileStore::open(&config.storage.path, config.store_size()?)
        .with_context(|| format!("opening {}", config.storage.path.display()))?;
    let mut log = LogManager::open(store, SystemClock, config.log_options())?;

    let command = args.first().map(String::as_str).unwrap_or("dump");
    let operand = args.get(1).map(String::as_str);

    match (command, operand) {
        ("cloud", Some(pct)) => {
            let pct: f32 = pct.parse().context("cloud coverage must be a number")?;
            let entry = log.log_cloud_coverage(pct)?;
            println!("{}", entry);
        }
        ("light", Some(state)) => {
            let is_on = match state {
                "on" | "1" | "true" => true,
                "off" | "0" | "false" => false,
                other => bail!("light state must be on or off, got {:?}", other),
            };
            println!("{}", log.log_light_state(is_on)?);
        }
        ("state", Some(code)) => {
            let code: u8 = code.parse().context("state code must be 0-255")?;
            println!("{}", log.log_system_state(code)?);
        }
        ("error", Some(code)) => {
            let code: u8 = code.parse().context("error code must be 0-255")?;
            println!("{}", log.log_error(code)?);
        }
        ("export", Some(kind)) => {
            let kind: EntryKind = kind.parse()?;
            println!("{}", log.export_json(kind)?);
        }
        ("dump", None) => {
            for entry in log.iter() {
                println!("{}", entry);
            }
        }
        ("count", None) => {
            println!("{} / {}", log.count(), log.capacity());
        }
        ("reset", None) => {
            if !log.reset(SystemClock.now()) {
                warn!("Reset is staged but could not be committed");
            }
        }
        _ => bail!(USAGE),
    }

    // Each invocation is a full power-on session: commit before exit
    if !log.flush() {
        bail!(
            "failed to commit log to {}",
            log.store().path().display()
        );
    }
    info!("{} entries in log", log.count());

    Ok(())
}
