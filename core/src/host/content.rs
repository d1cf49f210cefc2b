//! Content loading
//!
//! Resolves the content (or subsystem) files, hands them to the core and sets
//! up everything keyed by the content name: save files, state slots and the
//! auto remap.

use std::path::{Path, PathBuf};

use super::{Host, HostError};
use crate::config;
use crate::input::{InputLayer, InputRemap, RemapPaths};
use crate::plugin::GameInfo;
use crate::savefile;
use crate::savestate::{self, AUTO_SLOT};

/// Load content into the initialized core.
pub(crate) fn load(host: &mut Host) -> Result<(), HostError> {
    if host.core.is_dummy() {
        tracing::debug!("Dummy core; no content to load");
        return Ok(());
    }

    let content = host.ctx.launch.content.clone();
    let subsystem = host.ctx.launch.subsystem.clone();
    let no_content = content.is_none() && subsystem.is_none();
    if no_content && !host.ctx.system.support_no_game {
        tracing::error!("Core needs content and none was given");
        return Err(HostError::NoContent);
    }

    let basename = content
        .as_deref()
        .or_else(|| host.ctx.launch.subsystem_content.first().map(PathBuf::as_path))
        .and_then(Path::file_stem)
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| host.ctx.system.info.library_name.clone());
    let content_dir = content
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf);

    host.ctx.content.path = content.clone();
    host.ctx.content.basename = basename;
    host.ctx.content.no_content = no_content;
    host.ctx.content.save_dir = resolve_dir(
        host.ctx.launch.save_path.as_deref(),
        host.ctx.settings.paths.save_directory.as_deref(),
        content_dir.as_deref(),
    );
    host.ctx.content.state_dir = resolve_dir(
        host.ctx.launch.savestate_path.as_deref(),
        host.ctx.settings.paths.savestate_directory.as_deref(),
        content_dir.as_deref(),
    );

    load_auto_remap(host);
    log_patches(host);

    let loaded = match &subsystem {
        Some(ident) => load_subsystem(host, ident)?,
        None => {
            let game = match &content {
                Some(path) => Some(read_game(host, path, None)?),
                None => None,
            };
            host.with_core(|core, cb| core.load_game(cb, game.as_ref()))
        }
    };
    if !loaded {
        host.ctx.warn("Failed to load content.", 1, 180);
        return Err(HostError::ContentLoad);
    }

    after_load(host);
    tracing::info!(
        basename = %host.ctx.content.basename,
        crc = %format!("{:08x}", host.ctx.content.crc),
        no_content,
        "Content loaded"
    );
    Ok(())
}

/// Launch override first (a file path means its directory), then the
/// configured directory, then the content's own directory.
fn resolve_dir(
    launch: Option<&Path>,
    configured: Option<&Path>,
    content_dir: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(path) = launch {
        let dir = if path.extension().is_some() && !path.is_dir() {
            path.parent().unwrap_or(path)
        } else {
            path
        };
        return Some(dir.to_path_buf());
    }
    configured.or(content_dir).map(Path::to_path_buf)
}

fn load_auto_remap(host: &mut Host) {
    let settings = &host.ctx.settings.input;
    if !settings.auto_remaps_enable {
        return;
    }
    let Some(remap_dir) = settings
        .remap_directory
        .clone()
        .or_else(|| config::config_dir().map(|dir| dir.join("remaps")))
    else {
        return;
    };
    let paths = RemapPaths::new(
        &remap_dir,
        &host.ctx.system.info.library_name,
        host.ctx.content.path.as_deref(),
    );
    let defaults = InputLayer::default_remap(settings);
    match InputRemap::load(&paths, &defaults) {
        Ok(Some(remap)) => host.ctx.input.remap = remap,
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Failed to load remap file"),
    }
}

fn log_patches(host: &Host) {
    let patches = &host.ctx.launch.patches;
    if patches.no_patch {
        tracing::info!("Soft-patching disabled");
        return;
    }
    for (kind, path) in [("ups", &patches.ups), ("bps", &patches.bps), ("ips", &patches.ips)] {
        if let Some(path) = path {
            tracing::info!(kind, path = %path.display(), "Soft-patch requested; not applied");
        }
    }
}

/// Read one content file. The CRC of the first file identifies the content
/// for netplay.
fn read_game(host: &mut Host, path: &Path, need_fullpath: Option<bool>) -> Result<GameInfo, HostError> {
    let data = std::fs::read(path).map_err(|source| HostError::ContentRead {
        path: path.to_path_buf(),
        source,
    })?;
    if host.ctx.content.crc == 0 {
        host.ctx.content.crc = crc32fast::hash(&data);
    }
    let fullpath = need_fullpath.unwrap_or(host.ctx.system.info.need_fullpath);
    tracing::debug!(path = %path.display(), size = data.len(), fullpath, "Read content");
    Ok(GameInfo {
        path: Some(path.to_path_buf()),
        data: (!fullpath).then_some(data),
        meta: None,
    })
}

fn load_subsystem(host: &mut Host, ident: &str) -> Result<bool, HostError> {
    let Some(subsystem) = host
        .ctx
        .system
        .subsystems
        .iter()
        .find(|s| s.ident == ident)
        .cloned()
    else {
        tracing::error!(ident, "Unknown subsystem");
        return Err(HostError::UnknownSubsystem(ident.to_string()));
    };

    let files = host.ctx.launch.subsystem_content.clone();
    let mut games = Vec::with_capacity(files.len());
    for (i, path) in files.iter().enumerate() {
        let need_fullpath = subsystem.roms.get(i).map(|rom| rom.need_fullpath);
        games.push(read_game(host, path, need_fullpath)?);
    }
    let required = subsystem.roms.iter().filter(|rom| rom.required).count();
    if games.len() < required {
        tracing::error!(ident, given = games.len(), required, "Not enough subsystem content");
        return Ok(false);
    }

    tracing::info!(ident, id = subsystem.id, files = games.len(), "Loading subsystem content");
    Ok(host.with_core(|core, cb| core.load_game_special(cb, subsystem.id, &games)))
}

/// Save RAM, state slot index and the auto state, once the core accepted the
/// content.
fn after_load(host: &mut Host) {
    let state_basename = host.ctx.content.state_basename();
    if host.ctx.settings.runloop.savestate_auto_index
        && let Some(dir) = &host.ctx.content.state_dir
        && let Some(slot) = savestate::highest_slot(dir, &state_basename)
    {
        host.ctx.settings.runloop.state_slot = slot;
        tracing::info!(slot, "Found last state slot");
    }

    if let Some(dir) = host.ctx.content.save_dir.clone() {
        host.ctx.content.save_files = savefile::save_files(&dir, &host.ctx.content.basename);
    }
    let sram_mode = host.ctx.launch.sram_mode;
    host.ctx.content.use_sram = sram_mode.save() && !host.ctx.content.no_content;
    if sram_mode.load() {
        for file in host.ctx.content.save_files.clone() {
            if let Err(e) = savefile::load(&mut *host.core, &file) {
                tracing::warn!(error = %e, "Failed to load save file");
            }
        }
    }

    host.ctx.content.loaded = true;

    if host.ctx.settings.runloop.savestate_auto_load && host.ctx.launch.netplay.is_none() {
        load_auto_state(host, &state_basename);
    }
}

fn load_auto_state(host: &mut Host, state_basename: &str) {
    let Some(dir) = &host.ctx.content.state_dir else {
        return;
    };
    let path = savestate::state_path(dir, state_basename, AUTO_SLOT);
    if !path.exists() {
        return;
    }
    let result = savestate::read(&path)
        .and_then(|data| host.with_core(|core, cb| savestate::restore(core, cb, &data)));
    match result {
        Ok(()) => host.ctx.notify(
            &format!("Auto-loaded savestate from \"{}\".", path.display()),
            0,
            180,
        ),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to auto-load state"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_dir_precedence() {
        let content = Path::new("/games/snes");
        assert_eq!(
            resolve_dir(None, None, Some(content)),
            Some(PathBuf::from("/games/snes"))
        );
        assert_eq!(
            resolve_dir(None, Some(Path::new("/saves")), Some(content)),
            Some(PathBuf::from("/saves"))
        );
        assert_eq!(
            resolve_dir(Some(Path::new("/tmp/mario.srm")), Some(Path::new("/saves")), None),
            Some(PathBuf::from("/tmp"))
        );
        assert_eq!(resolve_dir(None, None, None), None);
    }
}
