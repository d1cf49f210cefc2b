//! The netplay engine: one peer, lock-step with prediction and rollback

use std::io::{self, Read};
use std::time::Duration;

use byteorder::{BigEndian, ReadBytesExt};
use retrohost_shared::device::memory::SAVE_RAM;

use super::NetplayError;
use super::handshake::{self, PeerInfo};
use super::timeline::{FLIP_LEAD, Timeline};
use super::transport::{NetplayListener, Transport, closed};
use super::wire::{self, Cmd};
use crate::config::NetplaySettings;
use crate::host::{HostCallbacks, HostContext, InputOverlay, NetplayRole};
use crate::plugin::Core;

/// How long a blocked engine waits for the peer before resending.
const DEFAULT_RETRY: Duration = Duration::from_millis(500);

/// Ticks the cancel key has to be held to give up on a peer.
const CANCEL_HOLD_TICKS: u32 = 6;

const FLIPPED: &str = "Netplay users are flipped.";

/// Everything [`NetplayEngine::connect`] needs.
#[derive(Debug, Clone)]
pub struct NetplayConfig {
    pub role: NetplayRole,
    pub port: u16,
    pub nick: String,
    pub delay_frames: u32,
    pub sync_period: u32,
    pub periodic_resync: bool,
    pub retry_interval: Duration,
}

impl NetplayConfig {
    pub fn new(role: NetplayRole, settings: &NetplaySettings) -> Self {
        Self {
            role,
            port: settings.port,
            nick: settings.nick.clone(),
            delay_frames: settings.delay_frames,
            sync_period: settings.sync_period,
            periodic_resync: settings.periodic_resync,
            retry_interval: DEFAULT_RETRY,
        }
    }
}

/// Counts consecutive ticks with the cancel key held while the loop is
/// blocked on the network, drawing the countdown over the last frame.
#[derive(Debug, Default)]
struct CancelHold {
    held: u32,
}

impl CancelHold {
    fn tick(&mut self, ctx: &mut HostContext) -> Result<(), NetplayError> {
        ctx.drivers.input.poll();
        let key = ctx.settings.input.menu_cancel;
        if ctx.drivers.input.key_pressed(key) {
            self.held += 1;
        } else {
            self.held = 0;
        }

        let text = if self.held == 0 {
            "Waiting for peer...\nHold Back key to disconnect".to_string()
        } else if self.held < CANCEL_HOLD_TICKS {
            format!("Waiting for peer...\nHold for {}", CANCEL_HOLD_TICKS - self.held)
        } else {
            "Disconnecting...".to_string()
        };
        ctx.drivers.video.message(&text);
        ctx.drivers.present_cached();

        if self.held >= CANCEL_HOLD_TICKS {
            self.held = 0;
            return Err(NetplayError::Cancelled);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.held = 0;
    }
}

pub struct NetplayEngine {
    transport: Transport,
    timeline: Timeline,
    is_host: bool,
    state_size: usize,
    periodic_resync: bool,
    need_resync: bool,
    /// State from the peer, loaded into the core at the next resync.
    resync_state: Option<Vec<u8>>,
    peer_nick: String,
    retry: Duration,
    /// Consecutive timed-out waits in the current stall.
    stalls: u32,
    total_stalls: u64,
    cancel: CancelHold,
    replays: u64,
    resyncs: u64,
    /// Most recent `(frame, crc)` of our own state.
    last_crc: Option<(u32, u32)>,
}

impl NetplayEngine {
    fn new(
        transport: Transport,
        config: &NetplayConfig,
        is_host: bool,
        state_size: usize,
        peer_nick: String,
    ) -> Self {
        let timeline = Timeline::new(config.delay_frames, config.sync_period, state_size);
        tracing::info!(
            is_host,
            state_size,
            window = timeline.window(),
            sync_period = config.sync_period,
            peer = %peer_nick,
            "Netplay engine started"
        );
        Self {
            transport,
            timeline,
            is_host,
            state_size,
            periodic_resync: config.periodic_resync,
            need_resync: false,
            resync_state: None,
            peer_nick,
            retry: config.retry_interval,
            stalls: 0,
            total_stalls: 0,
            cancel: CancelHold::default(),
            replays: 0,
            resyncs: 0,
            last_crc: None,
        }
    }

    /// Host or join per `config.role`, run the handshake and the initial
    /// state transfer.
    pub fn connect(
        config: &NetplayConfig,
        core: &mut dyn Core,
        ctx: &mut HostContext,
    ) -> Result<Self, NetplayError> {
        match &config.role {
            NetplayRole::Host => {
                let listener = NetplayListener::bind(config.port)?;
                Self::host(listener, config, core, ctx)
            }
            NetplayRole::Client { server } => Self::join(server, config, core, ctx),
        }
    }

    /// Wait on `listener` for a client, then send it our state.
    pub fn host(
        listener: NetplayListener,
        config: &NetplayConfig,
        core: &mut dyn Core,
        ctx: &mut HostContext,
    ) -> Result<Self, NetplayError> {
        let state_size = state_size(core, ctx)?;
        let local = local_info(core, ctx, &config.nick);

        let mut cancel = CancelHold::default();
        let mut transport = listener.accept(|| cancel.tick(ctx).is_err())?;

        let sram = match core.memory_data(SAVE_RAM) {
            Some(data) => data.to_vec(),
            None => vec![0; local.sram_size as usize],
        };
        let nick = handshake::host(transport.stream(), &local, &sram)?;
        ctx.notify(
            &format!("Got connection from: \"{nick} ({})\"", transport.peer_addr()),
            1,
            180,
        );

        let mut engine = Self::new(transport, config, true, state_size, nick);
        engine.send_state(Cmd::LoadSavestate, core, ctx)?;
        engine.resync(core, ctx)?;
        Ok(engine)
    }

    fn join(
        server: &str,
        config: &NetplayConfig,
        core: &mut dyn Core,
        ctx: &mut HostContext,
    ) -> Result<Self, NetplayError> {
        let state_size = state_size(core, ctx)?;
        let local = local_info(core, ctx, &config.nick);

        let mut transport = Transport::connect(server, config.port)?;
        let mut sram = vec![0; local.sram_size as usize];
        let nick = handshake::client(transport.stream(), &local, &mut sram)?;
        if let Some(data) = core.memory_data(SAVE_RAM)
            && data.len() == sram.len()
        {
            data.copy_from_slice(&sram);
        }
        ctx.notify(
            &format!("Connected to: \"{nick} ({server})\""),
            1,
            180,
        );

        let mut engine = Self::new(transport, config, false, state_size, nick);
        let (id, size) = wire::read_header(engine.transport.stream()).map_err(closed)?;
        engine.dispatch_command(id, size, ctx)?;
        if !engine.need_resync {
            return Err(NetplayError::Protocol(
                "host did not send its initial state".to_string(),
            ));
        }
        engine.resync(core, ctx)?;
        Ok(engine)
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn peer_nick(&self) -> &str {
        &self.peer_nick
    }

    /// Next frame to run, counted from the last resync.
    pub fn frame_count(&self) -> u32 {
        self.timeline.self_frame()
    }

    pub fn flip_frame(&self) -> u32 {
        self.timeline.flip_frame()
    }

    /// Whether ports are currently swapped.
    pub fn flipped(&self) -> bool {
        self.timeline.flipped_at(self.timeline.self_frame())
    }

    pub fn replays(&self) -> u64 {
        self.replays
    }

    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }

    /// Timed-out waits for the peer over the whole session.
    pub fn stalls(&self) -> u64 {
        self.total_stalls
    }

    pub fn last_crc(&self) -> Option<(u32, u32)> {
        self.last_crc
    }

    /// Port 0 and 1 input for the frame about to run.
    pub fn frame_inputs(&self) -> [u16; 2] {
        let frame = self.timeline.self_frame();
        self.timeline.inputs(frame, self.is_host)
    }

    pub fn set_retry_interval(&mut self, interval: Duration) {
        self.retry = interval;
    }

    /// Drop the next `packets` outgoing input packets.
    pub(crate) fn drop_outgoing(&mut self, packets: u32) {
        self.transport.drop_outgoing(packets);
    }

    /// Exchange input, replay mispredicted frames and save the state
    /// before this tick's frame. Blocks while the peer is too far behind.
    pub fn pre_frame(
        &mut self,
        core: &mut dyn Core,
        ctx: &mut HostContext,
    ) -> Result<(), NetplayError> {
        self.poll(ctx)?;
        while self.timeline.must_block() && !self.need_resync {
            self.stall(ctx)?;
            self.poll(ctx)?;
        }
        if self.stalls > 0 {
            tracing::info!(stalls = self.stalls, "Netplay peer caught up");
            self.stalls = 0;
            self.cancel.reset();
        }

        if self.need_resync {
            self.resync(core, ctx)?;
            self.resyncs += 1;
        }

        if let Some(from) = self.timeline.first_misprediction() {
            ctx.replay.suspend_av();
            let replayed = self.replay(from, core, ctx);
            ctx.replay.resume_av();
            replayed?;
            self.replays += 1;
        }
        self.timeline.commit();
        tracing::trace!(
            self_frame = self.timeline.self_frame(),
            read_frame = self.timeline.read_frame(),
            other_frame = self.timeline.other_frame(),
            "Netplay frame"
        );

        self.save_frame(core, ctx)?;
        if self.crc_mismatch() && self.is_host && self.periodic_resync {
            self.send_state(Cmd::Resync, core, ctx)?;
            self.resync(core, ctx)?;
            self.resyncs += 1;
            self.save_frame(core, ctx)?;
        }

        let remap = ctx.settings.input.remap_binds_enable;
        ctx.input.poll_once(&mut *ctx.drivers.input, remap);
        self.timeline.begin_frame(ctx.input.joypad_mask(0));
        let frame = self.timeline.self_frame();
        self.timeline.mark_ran(frame);
        self.timeline.push_record();
        self.transport.send_packet(&self.timeline.records())?;

        ctx.runloop.netplay_slowmotion =
            self.timeline.lag() > u32::from(self.timeline.peer_lag());
        Ok(())
    }

    /// The frame ran; move the head and pick up anything that arrived.
    pub fn post_frame(&mut self, ctx: &mut HostContext) -> Result<(), NetplayError> {
        self.timeline.advance();
        self.poll(ctx)
    }

    /// Drain input packets, then any pending commands.
    fn poll(&mut self, ctx: &mut HostContext) -> Result<(), NetplayError> {
        for packet in self.transport.recv_packets()? {
            for record in packet {
                self.timeline.receive(record);
            }
        }
        while self.transport.command_ready()? {
            let (id, size) = wire::read_header(self.transport.stream()).map_err(closed)?;
            self.dispatch_command(id, size, ctx)?;
        }
        Ok(())
    }

    /// Wait once for the peer; on timeout resend our packet in case it was
    /// lost.
    fn stall(&mut self, ctx: &mut HostContext) -> Result<(), NetplayError> {
        if self.transport.wait(self.retry)? {
            return Ok(());
        }
        self.stalls += 1;
        self.total_stalls += 1;
        self.transport.send_packet(&self.timeline.records())?;
        tracing::warn!(
            "Network is stalling, resending packet... Attempt # {}",
            self.stalls
        );
        self.cancel.tick(ctx)
    }

    fn replay(
        &mut self,
        from: u32,
        core: &mut dyn Core,
        ctx: &mut HostContext,
    ) -> Result<(), NetplayError> {
        let end = self.timeline.self_frame();
        tracing::debug!(from, end, "Netplay replay");
        {
            let mut cb = HostCallbacks::new(ctx, InputOverlay::Direct);
            if !core.unserialize(&mut cb, self.timeline.state(from)) {
                return Err(NetplayError::Unserialize);
            }
        }
        for frame in from..end {
            if frame != from {
                let mut cb = HostCallbacks::new(ctx, InputOverlay::Direct);
                if !core.serialize(&mut cb, self.timeline.state_mut(frame)) {
                    return Err(NetplayError::Serialize);
                }
            }
            self.timeline.mark_ran(frame);
            let inputs = self.timeline.inputs(frame, self.is_host);
            let mut cb = HostCallbacks::new(ctx, InputOverlay::Netplay(inputs));
            core.run(&mut cb);
        }
        Ok(())
    }

    /// Save the state before the head frame and CRC states that became
    /// final.
    fn save_frame(&mut self, core: &mut dyn Core, ctx: &mut HostContext) -> Result<(), NetplayError> {
        let frame = self.timeline.self_frame();
        let mut cb = HostCallbacks::new(ctx, InputOverlay::Direct);
        if !core.serialize(&mut cb, self.timeline.state_mut(frame)) {
            return Err(NetplayError::Serialize);
        }
        for frame in self.timeline.pending_crcs() {
            let crc = crc32fast::hash(self.timeline.state(frame));
            self.timeline.set_self_crc(frame, crc);
            self.last_crc = Some((frame, crc));
        }
        Ok(())
    }

    fn crc_mismatch(&mut self) -> bool {
        let mismatches = self.timeline.crc_mismatches();
        for &frame in &mismatches {
            tracing::warn!(frame, "Netplay state CRC mismatch");
        }
        !mismatches.is_empty()
    }

    /// Restart both timelines at frame 1 from a shared state.
    fn resync(&mut self, core: &mut dyn Core, ctx: &mut HostContext) -> Result<(), NetplayError> {
        if let Some(state) = self.resync_state.take() {
            let mut cb = HostCallbacks::new(ctx, InputOverlay::Direct);
            if !core.unserialize(&mut cb, &state) {
                return Err(NetplayError::Unserialize);
            }
        }
        // Packets still queued are numbered from before the resync.
        let stale = self.transport.recv_packets()?.len();
        if stale > 0 {
            tracing::debug!(stale, "Dropped netplay packets from before resync");
        }
        self.timeline.resync();
        self.need_resync = false;
        self.last_crc = None;
        tracing::debug!(flip_frame = self.timeline.flip_frame(), "Netplay resync");
        Ok(())
    }

    /// Serialize the current state and send it. Both sides resync from it
    /// before the next frame.
    fn send_state(
        &mut self,
        cmd: Cmd,
        core: &mut dyn Core,
        ctx: &mut HostContext,
    ) -> Result<(), NetplayError> {
        let mut state = vec![0; self.state_size];
        {
            let mut cb = HostCallbacks::new(ctx, InputOverlay::Direct);
            if !core.serialize(&mut cb, &mut state) {
                return Err(NetplayError::Serialize);
            }
        }
        self.send_checked(cmd, &state, ctx)?;
        self.resync_state = None;
        self.need_resync = true;
        Ok(())
    }

    /// Push the current core state to the peer after a local state load.
    pub fn send_savestate(
        &mut self,
        core: &mut dyn Core,
        ctx: &mut HostContext,
    ) -> Result<(), NetplayError> {
        match self.send_state(Cmd::LoadSavestate, core, ctx) {
            Ok(()) => {
                ctx.notify("Netplay state sent.", 0, 180);
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                ctx.warn("Failed to send netplay state.", 1, 180);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Swap ports `FLIP_LEAD` frames from now. Host only.
    pub fn flip_players(&mut self, ctx: &mut HostContext) -> Result<(), NetplayError> {
        if !self.is_host {
            return Err(NetplayError::NotHost);
        }
        if !self.timeline.can_flip() {
            return Err(NetplayError::FlipTooSoon);
        }
        let frame = self.timeline.self_frame() + FLIP_LEAD;
        self.send_checked(Cmd::FlipPlayers, &frame.to_be_bytes(), ctx)?;
        self.timeline.schedule_flip(frame);
        tracing::info!(frame, "Netplay flip scheduled");
        ctx.notify(FLIPPED, 1, 180);
        Ok(())
    }

    /// Send a command and wait for its ACK. Commands the peer sends in the
    /// meantime are handled.
    fn send_checked(
        &mut self,
        cmd: Cmd,
        payload: &[u8],
        ctx: &mut HostContext,
    ) -> Result<(), NetplayError> {
        wire::write_command(self.transport.stream(), cmd, payload).map_err(closed)?;
        loop {
            let (id, size) = wire::read_header(self.transport.stream()).map_err(closed)?;
            match Cmd::from_id(id) {
                Some(Cmd::Ack) => return Ok(()),
                Some(Cmd::Nak) => {
                    tracing::warn!(cmd = ?cmd, "Netplay peer refused command");
                    return Err(NetplayError::Nak);
                }
                _ => self.dispatch_command(id, size, ctx)?,
            }
        }
    }

    fn reply(&mut self, cmd: Cmd) -> Result<(), NetplayError> {
        wire::write_command(self.transport.stream(), cmd, &[]).map_err(closed)
    }

    fn dispatch_command(
        &mut self,
        id: u16,
        size: u16,
        ctx: &mut HostContext,
    ) -> Result<(), NetplayError> {
        match Cmd::from_id(id) {
            Some(Cmd::FlipPlayers) => {
                if size != 4 {
                    self.discard(size)?;
                    return self.reply(Cmd::Nak);
                }
                let frame = self
                    .transport
                    .stream()
                    .read_u32::<BigEndian>()
                    .map_err(closed)?;
                if !self.timeline.schedule_flip(frame) {
                    tracing::warn!(frame, "Refusing netplay flip into the past");
                    return self.reply(Cmd::Nak);
                }
                self.reply(Cmd::Ack)?;
                ctx.notify(FLIPPED, 1, 180);
            }
            Some(cmd @ (Cmd::LoadSavestate | Cmd::Resync)) => {
                let mut state = vec![0; self.state_size];
                self.transport
                    .stream()
                    .read_exact(&mut state)
                    .map_err(closed)?;
                self.resync_state = Some(state);
                self.need_resync = true;
                self.reply(Cmd::Ack)?;
                if cmd == Cmd::LoadSavestate {
                    ctx.notify("Netplay state received.", 1, 180);
                }
            }
            Some(Cmd::Ack | Cmd::Nak) => {
                return Err(NetplayError::Protocol(format!(
                    "unexpected reply {id} with no command outstanding"
                )));
            }
            None => {
                tracing::warn!(id, size, "Unknown netplay command");
                self.discard(size)?;
                self.reply(Cmd::Nak)?;
            }
        }
        Ok(())
    }

    fn discard(&mut self, size: u16) -> Result<(), NetplayError> {
        let mut payload = self.transport.stream().take(u64::from(size));
        io::copy(&mut payload, &mut io::sink()).map_err(closed)?;
        Ok(())
    }
}

fn state_size(core: &mut dyn Core, ctx: &mut HostContext) -> Result<usize, NetplayError> {
    let mut cb = HostCallbacks::new(ctx, InputOverlay::Direct);
    match core.serialize_size(&mut cb) {
        0 => Err(NetplayError::Unsupported),
        size => Ok(size),
    }
}

fn local_info(core: &mut dyn Core, ctx: &HostContext, nick: &str) -> PeerInfo {
    let info = core.system_info();
    PeerInfo {
        content_crc: ctx.content.crc,
        magic: handshake::impl_magic(
            core.api_version(),
            &info.library_name,
            &info.library_version,
            env!("CARGO_PKG_VERSION"),
        ),
        sram_size: core.memory_size(SAVE_RAM) as u32,
        nick: nick.to_string(),
    }
}
