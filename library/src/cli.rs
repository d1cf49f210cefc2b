//! Command-line arguments and how they map onto settings and launch options.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Parser;
use retrohost_core::savefile::SramMode;
use retrohost_core::{LaunchOptions, NetplayRole, Settings};
use retrohost_core::host::PatchOptions;
use retrohost_core::netplay::MAX_DELAY_FRAMES;

#[derive(Parser, Debug)]
#[command(name = "retrohost")]
#[command(author, version, about = "Headless frontend for libretro-style cores")]
pub struct Args {
    /// Content to load
    pub content: Option<PathBuf>,

    /// Core library to load
    #[arg(long, short = 'L', value_name = "PATH")]
    pub libretro: Option<PathBuf>,

    /// Start with the menu open
    #[arg(long)]
    pub menu: bool,

    /// Settings file to use instead of the default one
    #[arg(long, short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Extra settings files layered on top, in order (comma separated)
    #[arg(long, value_name = "FILE", value_delimiter = ',')]
    pub appendconfig: Vec<PathBuf>,

    /// Savestate directory, or a state file path whose directory is used
    #[arg(long, short = 'S', value_name = "PATH")]
    pub savestate: Option<PathBuf>,

    /// Save file directory, or a save file path whose directory is used
    #[arg(long, short = 's', value_name = "PATH")]
    pub save: Option<PathBuf>,

    /// When to load and write save RAM
    #[arg(long, value_name = "MODE", default_value = "load-save")]
    pub sram_mode: SramMode,

    // === Netplay ===
    /// Host a netplay session
    #[arg(long, short = 'H', conflicts_with = "connect")]
    pub host: bool,

    /// Join the netplay session hosted at this address
    #[arg(long, short = 'C', value_name = "HOST")]
    pub connect: Option<String>,

    /// Netplay port
    #[arg(long, value_name = "N")]
    pub port: Option<u16>,

    /// Netplay input delay in frames
    #[arg(long, short = 'F', value_name = "N")]
    pub frames: Option<u32>,

    /// Netplay nickname
    #[arg(long, value_name = "NAME")]
    pub nick: Option<String>,

    /// Exit after this many frames
    #[arg(long, value_name = "N")]
    pub max_frames: Option<u64>,

    // === Soft patching ===
    #[arg(long, value_name = "FILE")]
    pub ups: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    pub bps: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    pub ips: Option<PathBuf>,

    /// Ignore soft patches found next to the content
    #[arg(long)]
    pub no_patch: bool,

    /// Load the content through this core subsystem; every positional
    /// content file after the first is one of its files
    #[arg(long, value_name = "NAME")]
    pub subsystem: Option<String>,

    /// Additional subsystem content files
    #[arg(value_name = "FILES", requires = "subsystem")]
    pub subsystem_content: Vec<PathBuf>,

    // === Logging ===
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Write the log to this file instead of stderr
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    /// Validate combinations clap cannot express.
    pub fn validate(&self) -> Result<()> {
        if let Some(frames) = self.frames
            && frames > MAX_DELAY_FRAMES
        {
            bail!("Netplay delay must be between 0 and {MAX_DELAY_FRAMES} frames");
        }
        if self.content.is_none() && self.subsystem.is_some() {
            bail!("--subsystem needs at least one content file");
        }
        Ok(())
    }

    /// Command-line values that override the settings file.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(port) = self.port {
            settings.netplay.port = port;
        }
        if let Some(frames) = self.frames {
            settings.netplay.delay_frames = frames;
        }
        if let Some(nick) = &self.nick {
            settings.netplay.nick = nick.clone();
        }
    }

    pub fn netplay_role(&self) -> Option<NetplayRole> {
        if self.host {
            Some(NetplayRole::Host)
        } else {
            self.connect
                .clone()
                .map(|server| NetplayRole::Client { server })
        }
    }

    pub fn launch_options(&self) -> LaunchOptions {
        let (content, subsystem_content) = match &self.subsystem {
            Some(_) => {
                let files = self
                    .content
                    .iter()
                    .chain(&self.subsystem_content)
                    .cloned()
                    .collect();
                (None, files)
            }
            None => (self.content.clone(), Vec::new()),
        };
        LaunchOptions {
            core_path: self.libretro.clone(),
            content,
            subsystem: self.subsystem.clone(),
            subsystem_content,
            start_in_menu: self.menu,
            save_path: self.save.clone(),
            savestate_path: self.savestate.clone(),
            sram_mode: self.sram_mode,
            netplay: self.netplay_role(),
            max_frames: self.max_frames,
            patches: PatchOptions {
                ups: self.ups.clone(),
                bps: self.bps.clone(),
                ips: self.ips.clone(),
                no_patch: self.no_patch,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("retrohost").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_content_and_core() {
        let args = parse(&["-L", "core.so", "game.bin", "--max-frames", "60"]);
        let launch = args.launch_options();
        assert_eq!(launch.core_path, Some(PathBuf::from("core.so")));
        assert_eq!(launch.content, Some(PathBuf::from("game.bin")));
        assert_eq!(launch.max_frames, Some(60));
        assert_eq!(launch.sram_mode, SramMode::LoadSave);
        assert_eq!(launch.netplay, None);
    }

    #[test]
    fn test_sram_mode_parsed() {
        let args = parse(&["--sram-mode", "noload-save", "game.bin"]);
        assert_eq!(args.sram_mode, SramMode::NoLoadSave);
        assert!(
            Args::try_parse_from(["retrohost", "--sram-mode", "sometimes", "game.bin"]).is_err()
        );
    }

    #[test]
    fn test_netplay_roles() {
        assert_eq!(parse(&["--host", "g"]).netplay_role(), Some(NetplayRole::Host));
        assert_eq!(
            parse(&["--connect", "10.0.0.2", "g"]).netplay_role(),
            Some(NetplayRole::Client {
                server: "10.0.0.2".to_string()
            })
        );
        assert!(Args::try_parse_from(["retrohost", "--host", "--connect", "x", "g"]).is_err());
    }

    #[test]
    fn test_netplay_overrides_settings() {
        let mut settings = Settings::default();
        parse(&["--port", "1234", "--frames", "3", "--nick", "ann", "g"]).apply(&mut settings);
        assert_eq!(settings.netplay.port, 1234);
        assert_eq!(settings.netplay.delay_frames, 3);
        assert_eq!(settings.netplay.nick, "ann");
    }

    #[test]
    fn test_delay_bounded() {
        assert!(parse(&["--frames", "9", "g"]).validate().is_ok());
        assert!(parse(&["--frames", "10", "g"]).validate().is_err());
    }

    #[test]
    fn test_subsystem_files() {
        let args = parse(&["--subsystem", "sgb", "boot.gb", "game.gb"]);
        let launch = args.launch_options();
        assert_eq!(launch.content, None);
        assert_eq!(launch.subsystem.as_deref(), Some("sgb"));
        assert_eq!(
            launch.subsystem_content,
            vec![PathBuf::from("boot.gb"), PathBuf::from("game.gb")]
        );
    }

    #[test]
    fn test_appendconfig_list() {
        let args = parse(&["--appendconfig", "a.toml,b.toml", "g"]);
        assert_eq!(
            args.appendconfig,
            vec![PathBuf::from("a.toml"), PathBuf::from("b.toml")]
        );
    }

    #[test]
    fn test_patch_flags_recorded() {
        let launch = parse(&["--ips", "fix.ips", "--no-patch", "g"]).launch_options();
        assert_eq!(launch.patches.ips, Some(PathBuf::from("fix.ips")));
        assert!(launch.patches.no_patch);
    }
}
