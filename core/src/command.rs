//! Command bus
//!
//! Every user- or host-initiated action is a [`Command`]. [`dispatch`] maps
//! each variant to its handler; handlers that need other commands call
//! [`Host::command`] recursively. The return value reports success; failures
//! have already been surfaced through the message queue and the log.

pub(crate) mod disk;
pub(crate) mod lifecycle;
pub(crate) mod replay;
pub(crate) mod session;
pub(crate) mod state;

use crate::host::Host;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Reset,
    LoadState,
    SaveState,
    TakeScreenshot,
    Quit,
    /// Reinitialize drivers after the core changed its A/V info.
    Reinit,
    RewindInit,
    RewindDeinit,
    RewindToggle,
    AutosaveInit,
    AutosaveDeinit,
    AudioStart,
    AudioStop,
    AudioMuteToggle,
    CoreInit,
    CoreDeinit,
    PauseToggle,
    Pause,
    Unpause,
    /// Apply the side effects of the current pause state.
    PauseChecks,
    MenuToggle,
    ControllersInit,
    SavefilesInit,
    SavefilesDeinit,
    CheatsInit,
    CheatsDeinit,
    CheatsApply,
    CheatIndexPlus,
    CheatIndexMinus,
    CheatToggle,
    NetplayInit,
    NetplayDeinit,
    NetplayFlipPlayers,
    PreemptUpdate,
    PreemptResetBuffer,
    DriversInit,
    DriversDeinit,
    DiskEjectToggle,
    DiskNext,
    DiskPrev,
    GrabMouseToggle,
    FullscreenToggle,
    GameFocusToggle,
    StateSlotPlus,
    StateSlotMinus,
}

impl Command {
    pub fn name(self) -> &'static str {
        match self {
            Self::Reset => "RESET",
            Self::LoadState => "LOAD_STATE",
            Self::SaveState => "SAVE_STATE",
            Self::TakeScreenshot => "TAKE_SCREENSHOT",
            Self::Quit => "QUIT",
            Self::Reinit => "REINIT",
            Self::RewindInit => "REWIND_INIT",
            Self::RewindDeinit => "REWIND_DEINIT",
            Self::RewindToggle => "REWIND_TOGGLE",
            Self::AutosaveInit => "AUTOSAVE_INIT",
            Self::AutosaveDeinit => "AUTOSAVE_DEINIT",
            Self::AudioStart => "AUDIO_START",
            Self::AudioStop => "AUDIO_STOP",
            Self::AudioMuteToggle => "AUDIO_MUTE_TOGGLE",
            Self::CoreInit => "CORE_INIT",
            Self::CoreDeinit => "CORE_DEINIT",
            Self::PauseToggle => "PAUSE_TOGGLE",
            Self::Pause => "PAUSE",
            Self::Unpause => "UNPAUSE",
            Self::PauseChecks => "PAUSE_CHECKS",
            Self::MenuToggle => "MENU_TOGGLE",
            Self::ControllersInit => "CONTROLLERS_INIT",
            Self::SavefilesInit => "SAVEFILES_INIT",
            Self::SavefilesDeinit => "SAVEFILES_DEINIT",
            Self::CheatsInit => "CHEATS_INIT",
            Self::CheatsDeinit => "CHEATS_DEINIT",
            Self::CheatsApply => "CHEATS_APPLY",
            Self::CheatIndexPlus => "CHEAT_INDEX_PLUS",
            Self::CheatIndexMinus => "CHEAT_INDEX_MINUS",
            Self::CheatToggle => "CHEAT_TOGGLE",
            Self::NetplayInit => "NETPLAY_INIT",
            Self::NetplayDeinit => "NETPLAY_DEINIT",
            Self::NetplayFlipPlayers => "NETPLAY_FLIP_PLAYERS",
            Self::PreemptUpdate => "PREEMPT_UPDATE",
            Self::PreemptResetBuffer => "PREEMPT_RESET_BUFFER",
            Self::DriversInit => "DRIVERS_INIT",
            Self::DriversDeinit => "DRIVERS_DEINIT",
            Self::DiskEjectToggle => "DISK_EJECT_TOGGLE",
            Self::DiskNext => "DISK_NEXT",
            Self::DiskPrev => "DISK_PREV",
            Self::GrabMouseToggle => "GRAB_MOUSE_TOGGLE",
            Self::FullscreenToggle => "FULLSCREEN_TOGGLE",
            Self::GameFocusToggle => "GAME_FOCUS_TOGGLE",
            Self::StateSlotPlus => "STATE_SLOT_PLUS",
            Self::StateSlotMinus => "STATE_SLOT_MINUS",
        }
    }
}

/// Run the handler for `command`.
pub(crate) fn dispatch(host: &mut Host, command: Command) -> bool {
    tracing::debug!(command = command.name(), "Command");
    match command {
        Command::Reset => lifecycle::reset(host),
        Command::LoadState => state::load_state(host),
        Command::SaveState => state::save_state(host),
        Command::TakeScreenshot => state::take_screenshot(host),
        Command::Quit => lifecycle::quit(host),
        Command::Reinit => lifecycle::reinit(host),
        Command::RewindInit => state::rewind_init(host),
        Command::RewindDeinit => state::rewind_deinit(host),
        Command::RewindToggle => state::rewind_toggle(host),
        Command::AutosaveInit => state::autosave_init(host),
        Command::AutosaveDeinit => state::autosave_deinit(host),
        Command::AudioStart => session::audio_start(host),
        Command::AudioStop => session::audio_stop(host),
        Command::AudioMuteToggle => session::mute_toggle(host),
        Command::CoreInit => match lifecycle::init_core(host) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "Core init failed");
                false
            }
        },
        Command::CoreDeinit => lifecycle::deinit_core(host),
        Command::PauseToggle => session::set_paused(host, !host.ctx.runloop.paused),
        Command::Pause => session::set_paused(host, true),
        Command::Unpause => session::set_paused(host, false),
        Command::PauseChecks => session::pause_checks(host),
        Command::MenuToggle => session::menu_toggle(host),
        Command::ControllersInit => lifecycle::controllers_init(host),
        Command::SavefilesInit => state::savefiles_init(host),
        Command::SavefilesDeinit => state::savefiles_deinit(host),
        Command::CheatsInit => session::cheats_init(host),
        Command::CheatsDeinit => session::cheats_deinit(host),
        Command::CheatsApply => session::cheats_apply(host),
        Command::CheatIndexPlus => session::cheat_index(host, 1),
        Command::CheatIndexMinus => session::cheat_index(host, -1),
        Command::CheatToggle => session::cheat_toggle(host),
        Command::NetplayInit => replay::netplay_init(host),
        Command::NetplayDeinit => replay::netplay_deinit(host),
        Command::NetplayFlipPlayers => replay::netplay_flip(host),
        Command::PreemptUpdate => replay::preempt_update(host),
        Command::PreemptResetBuffer => replay::preempt_reset_buffer(host),
        Command::DriversInit => lifecycle::drivers_init(host),
        Command::DriversDeinit => lifecycle::drivers_deinit(host),
        Command::DiskEjectToggle => disk::eject_toggle(host),
        Command::DiskNext => disk::step(host, 1),
        Command::DiskPrev => disk::step(host, -1),
        Command::GrabMouseToggle => session::grab_mouse_toggle(host),
        Command::FullscreenToggle => session::fullscreen_toggle(host),
        Command::GameFocusToggle => session::game_focus_toggle(host),
        Command::StateSlotPlus => state::state_slot(host, 1),
        Command::StateSlotMinus => state::state_slot(host, -1),
    }
}
