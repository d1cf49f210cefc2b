//! Retrohost - headless frontend for libretro-style cores
//!
//! # Usage
//!
//! ```bash
//! retrohost -L path/to/core.so game.bin
//! retrohost -L core.so game.bin --max-frames 600
//! retrohost -L core.so game.bin --host --nick alice
//! retrohost -L core.so game.bin --connect 192.168.1.10 --frames 2
//! ```

use anyhow::{Context, Result};
use clap::Parser;

use retrohost_core::{Host, Settings};
use retrohost_library::cli::Args;
use retrohost_library::{headless, logging};

fn load_settings(args: &Args) -> Result<Settings> {
    let Some(base) = args.config.clone().or_else(Settings::default_path) else {
        tracing::warn!("No config directory; using default settings");
        return Ok(Settings::default());
    };
    let settings = Settings::load_layered(&base, &args.appendconfig)
        .with_context(|| format!("Failed to load settings from {}", base.display()))?;
    tracing::info!(path = %base.display(), "Loaded settings");
    Ok(settings)
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init(args.verbose, args.log_file.as_deref())?;
    args.validate()?;

    let mut settings = load_settings(&args)?;
    args.apply(&mut settings);

    let mut host = Host::new(settings, headless::drivers(), args.launch_options());
    let frames = headless::run(&mut host)?;
    tracing::info!(frames, "Exiting");
    Ok(())
}
