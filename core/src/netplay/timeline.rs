//! Frame ring and input bookkeeping
//!
//! Frames are numbered from 1. Three cursors move through them:
//!
//! ```text
//!   other_frame <= read_frame, other_frame <= self_frame
//!
//!   [.. verified ..)[ run on predicted input ..)
//!                  ^other                      ^self (next frame to run)
//!   [.. peer input confirmed ..)
//!                              ^read (next peer frame expected)
//! ```
//!
//! Each slot holds the state saved before its frame, our input, the peer's
//! input once confirmed, and the peer input the frame last ran with. A frame
//! whose confirmed input differs from what it ran with is the start of a
//! replay.

use std::collections::{BTreeMap, VecDeque};

use super::wire::{FrameRecord, UDP_FRAME_PACKETS};

/// Upper bound on frames run ahead of confirmed input. Twice this must stay
/// below the packet redundancy so a blocked peer still receives every frame
/// it waits on.
pub const MAX_DELAY_FRAMES: u32 = UDP_FRAME_PACKETS as u32 / 2 - 1;

/// Frames between a flip request and the frame it takes effect on.
pub const FLIP_LEAD: u32 = 2 * UDP_FRAME_PACKETS as u32;

/// Frames behind the head for which state CRCs are kept.
const CRC_HISTORY: u32 = 2 * UDP_FRAME_PACKETS as u32;

#[derive(Debug, Clone, Default)]
struct Slot {
    frame: u32,
    state: Vec<u8>,
    local: u16,
    peer: u16,
    confirmed: bool,
    /// Peer input used the last time this frame ran.
    ran_with: Option<u16>,
}

#[derive(Debug, Clone, Copy, Default)]
struct CrcCheck {
    local: u32,
    peer: u32,
    checked: bool,
}

impl Slot {
    /// Reuse the slot for `frame`, keeping the state allocation.
    fn reset(&mut self, frame: u32) {
        let state = std::mem::take(&mut self.state);
        *self = Self {
            frame,
            state,
            ..Self::default()
        };
    }
}

#[derive(Debug)]
pub struct Timeline {
    slots: Vec<Slot>,
    window: u32,
    sync_period: u32,
    self_frame: u32,
    read_frame: u32,
    other_frame: u32,
    /// Next frame considered for a state CRC.
    crc_frame: u32,
    /// Most recent confirmed peer input; the prediction for unconfirmed
    /// frames.
    last_peer_input: u16,
    peer_lag: u16,
    flip: bool,
    flip_frame: u32,
    /// Our last frames, oldest first, as sent in every packet.
    history: VecDeque<FrameRecord>,
    /// State CRCs by frame; 0 means not known yet.
    crcs: BTreeMap<u32, CrcCheck>,
}

impl Timeline {
    /// `delay_frames` is clamped to `1..=MAX_DELAY_FRAMES`; a `sync_period`
    /// of 0 disables state CRCs.
    pub fn new(delay_frames: u32, sync_period: u32, state_size: usize) -> Self {
        let window = delay_frames.clamp(1, MAX_DELAY_FRAMES);
        let slots = (0..window + 2)
            .map(|_| Slot {
                state: vec![0; state_size],
                ..Slot::default()
            })
            .collect();
        Self {
            slots,
            window,
            sync_period,
            self_frame: 1,
            read_frame: 1,
            other_frame: 1,
            crc_frame: 1,
            last_peer_input: 0,
            peer_lag: 0,
            flip: false,
            flip_frame: 0,
            history: VecDeque::with_capacity(UDP_FRAME_PACKETS),
            crcs: BTreeMap::new(),
        }
    }

    fn index(&self, frame: u32) -> usize {
        frame as usize % self.slots.len()
    }

    fn slot(&self, frame: u32) -> &Slot {
        &self.slots[self.index(frame)]
    }

    /// The slot for `frame`, recycled if it still holds an older frame.
    fn prepare(&mut self, frame: u32) -> &mut Slot {
        let index = self.index(frame);
        let slot = &mut self.slots[index];
        if slot.frame != frame {
            slot.reset(frame);
        }
        slot
    }

    pub fn window(&self) -> u32 {
        self.window
    }

    pub fn self_frame(&self) -> u32 {
        self.self_frame
    }

    pub fn read_frame(&self) -> u32 {
        self.read_frame
    }

    pub fn other_frame(&self) -> u32 {
        self.other_frame
    }

    pub fn flip_frame(&self) -> u32 {
        self.flip_frame
    }

    /// Frames run ahead of confirmed peer input.
    pub fn lag(&self) -> u32 {
        self.self_frame.saturating_sub(self.read_frame)
    }

    pub fn peer_lag(&self) -> u16 {
        self.peer_lag
    }

    /// Running another frame would overflow the ring.
    pub fn must_block(&self) -> bool {
        self.lag() >= self.window
    }

    /// Take one record from a peer packet. Returns whether it confirmed a
    /// new frame.
    pub fn receive(&mut self, record: FrameRecord) -> bool {
        if record.frame == 0 {
            return false;
        }
        // CRCs trail the input; a later packet may carry one for an old frame.
        // Frames past the next expected one predate a resync.
        if record.crc != 0 && record.frame <= self.read_frame {
            let check = self.crcs.entry(record.frame).or_default();
            if check.peer == 0 {
                check.peer = record.crc;
            }
        }
        if record.frame != self.read_frame || self.read_frame > self.self_frame {
            return false;
        }
        let slot = self.prepare(record.frame);
        slot.peer = record.input;
        slot.confirmed = true;
        self.last_peer_input = record.input;
        self.peer_lag = record.lag;
        self.read_frame += 1;
        true
    }

    /// Record our input for the frame about to run.
    pub fn begin_frame(&mut self, local: u16) {
        let frame = self.self_frame;
        self.prepare(frame).local = local;
    }

    /// Peer input for `frame`: confirmed, or predicted from the latest
    /// confirmed input.
    pub fn peer_input(&self, frame: u32) -> u16 {
        let slot = self.slot(frame);
        if slot.frame == frame && slot.confirmed {
            slot.peer
        } else {
            self.last_peer_input
        }
    }

    pub fn flipped_at(&self, frame: u32) -> bool {
        self.flip_frame != 0 && (self.flip ^ (frame < self.flip_frame))
    }

    /// Port 0 and 1 input for `frame`. The host plays port 0 unless flipped.
    pub fn inputs(&self, frame: u32, is_host: bool) -> [u16; 2] {
        let local = self.slot(frame).local;
        let peer = self.peer_input(frame);
        if is_host != self.flipped_at(frame) {
            [local, peer]
        } else {
            [peer, local]
        }
    }

    /// Note the peer input `frame` is being run with.
    pub fn mark_ran(&mut self, frame: u32) {
        let peer = self.peer_input(frame);
        let index = self.index(frame);
        self.slots[index].ran_with = Some(peer);
    }

    /// Advance past frames that ran with their real peer input. Returns the
    /// first frame that did not, which must be replayed.
    pub fn first_misprediction(&mut self) -> Option<u32> {
        let end = self.read_frame.min(self.self_frame);
        while self.other_frame < end {
            let slot = self.slot(self.other_frame);
            if slot.ran_with != Some(slot.peer) {
                return Some(self.other_frame);
            }
            self.other_frame += 1;
        }
        None
    }

    /// Everything up to the confirmed frontier has been (re)run correctly.
    pub fn commit(&mut self) {
        self.other_frame = self.read_frame.min(self.self_frame);
    }

    pub fn state(&self, frame: u32) -> &[u8] {
        &self.slot(frame).state
    }

    pub fn state_mut(&mut self, frame: u32) -> &mut [u8] {
        &mut self.prepare(frame).state
    }

    /// Sync frames whose saved state has become final since the last call.
    pub fn pending_crcs(&mut self) -> Vec<u32> {
        let mut frames = Vec::new();
        while self.crc_frame <= self.other_frame {
            let frame = self.crc_frame;
            if self.sync_period != 0
                && frame % self.sync_period == 0
                && self.slot(frame).frame == frame
            {
                frames.push(frame);
            }
            self.crc_frame += 1;
        }
        frames
    }

    pub fn set_self_crc(&mut self, frame: u32, crc: u32) {
        self.crcs.entry(frame).or_default().local = crc;
        if let Some(record) = self.history.iter_mut().find(|r| r.frame == frame) {
            record.crc = crc;
        }
    }

    pub fn self_crc(&self, frame: u32) -> Option<u32> {
        self.crcs
            .get(&frame)
            .map(|check| check.local)
            .filter(|&crc| crc != 0)
    }

    /// Frames where both CRCs are known and differ. Each frame is compared
    /// once; a zero CRC means "not computed" and is never compared.
    pub fn crc_mismatches(&mut self) -> Vec<u32> {
        let mut frames = Vec::new();
        for (&frame, check) in &mut self.crcs {
            if check.checked || check.local == 0 || check.peer == 0 {
                continue;
            }
            check.checked = true;
            if check.local != check.peer {
                frames.push(frame);
            }
        }
        frames
    }

    /// Add the record for the frame about to run to the outgoing history.
    pub fn push_record(&mut self) {
        let slot = self.slot(self.self_frame);
        let record = FrameRecord {
            frame: self.self_frame,
            input: slot.local,
            lag: self.lag().min(u32::from(u16::MAX)) as u16,
            crc: self.self_crc(self.self_frame).unwrap_or(0),
        };
        let horizon = self.self_frame.saturating_sub(CRC_HISTORY);
        self.crcs = self.crcs.split_off(&horizon);
        if self.history.back().is_some_and(|r| r.frame == record.frame) {
            self.history.pop_back();
        }
        if self.history.len() == UDP_FRAME_PACKETS {
            self.history.pop_front();
        }
        self.history.push_back(record);
    }

    /// The outgoing packet: our last frames, oldest first, zero padded.
    pub fn records(&self) -> [FrameRecord; UDP_FRAME_PACKETS] {
        let mut records = [FrameRecord::default(); UDP_FRAME_PACKETS];
        let offset = UDP_FRAME_PACKETS - self.history.len();
        for (dst, src) in records[offset..].iter_mut().zip(&self.history) {
            *dst = *src;
        }
        records
    }

    /// The frame that just ran is done.
    pub fn advance(&mut self) {
        self.self_frame += 1;
    }

    pub fn can_flip(&self) -> bool {
        self.self_frame >= self.flip_frame + FLIP_LEAD
    }

    /// Swap ports from `frame` on. Refused for frames before the current
    /// flip point.
    pub fn schedule_flip(&mut self, frame: u32) -> bool {
        if frame < self.flip_frame {
            return false;
        }
        self.flip ^= true;
        self.flip_frame = frame;
        true
    }

    /// Restart at frame 1 from a state both peers share. The last confirmed
    /// peer input stays as the prediction and the current port mapping is
    /// kept.
    pub fn resync(&mut self) {
        let flipped = self.flipped_at(self.self_frame);
        self.flip = flipped;
        self.flip_frame = u32::from(flipped);
        for slot in &mut self.slots {
            slot.reset(0);
        }
        self.self_frame = 1;
        self.read_frame = 1;
        self.other_frame = 1;
        self.crc_frame = 1;
        self.history.clear();
        self.crcs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(frame: u32, input: u16) -> FrameRecord {
        FrameRecord {
            frame,
            input,
            lag: 0,
            crc: 0,
        }
    }

    /// Run one local frame the way the engine does.
    fn run(timeline: &mut Timeline, local: u16) -> Option<u32> {
        timeline.begin_frame(local);
        let replay = timeline.first_misprediction();
        if let Some(from) = replay {
            for frame in from..timeline.self_frame() {
                timeline.mark_ran(frame);
            }
        }
        timeline.commit();
        let frame = timeline.self_frame();
        timeline.mark_ran(frame);
        timeline.push_record();
        timeline.advance();
        replay
    }

    #[test]
    fn test_window_clamped() {
        assert_eq!(Timeline::new(0, 60, 4).window(), 1);
        assert_eq!(Timeline::new(50, 60, 4).window(), MAX_DELAY_FRAMES);
        assert!(2 * MAX_DELAY_FRAMES < UDP_FRAME_PACKETS as u32);
    }

    #[test]
    fn test_blocks_after_window_predicted_frames() {
        let mut timeline = Timeline::new(2, 0, 4);
        assert!(!timeline.must_block());
        run(&mut timeline, 0);
        run(&mut timeline, 0);
        assert!(timeline.must_block());

        assert!(timeline.receive(record(1, 0)));
        assert!(!timeline.must_block());
        // Out of order and duplicate records are ignored.
        assert!(!timeline.receive(record(3, 0)));
        assert!(!timeline.receive(record(1, 0)));
        assert_eq!(timeline.read_frame(), 2);
    }

    #[test]
    fn test_correct_prediction_needs_no_replay() {
        let mut timeline = Timeline::new(3, 0, 4);
        run(&mut timeline, 1);
        run(&mut timeline, 1);
        timeline.receive(record(1, 0));
        timeline.receive(record(2, 0));
        assert_eq!(run(&mut timeline, 1), None);
        assert_eq!(timeline.other_frame(), 3);
    }

    #[test]
    fn test_misprediction_replays_from_first_wrong_frame() {
        let mut timeline = Timeline::new(3, 0, 4);
        run(&mut timeline, 0);
        run(&mut timeline, 0);
        run(&mut timeline, 0);
        timeline.receive(record(1, 0));
        timeline.receive(record(2, 8));
        assert_eq!(run(&mut timeline, 0), Some(2));
        // Frame 3 is re-predicted with the newest confirmed input.
        assert_eq!(timeline.peer_input(3), 8);
        assert_eq!(timeline.other_frame(), 3);
    }

    #[test]
    fn test_inputs_follow_role_and_flip() {
        let mut timeline = Timeline::new(2, 0, 4);
        timeline.begin_frame(0x1);
        timeline.receive(record(1, 0x2));
        assert_eq!(timeline.inputs(1, true), [0x1, 0x2]);
        assert_eq!(timeline.inputs(1, false), [0x2, 0x1]);

        assert!(timeline.schedule_flip(5));
        assert!(!timeline.flipped_at(4));
        assert!(timeline.flipped_at(5));
        assert!(!timeline.schedule_flip(3));
    }

    #[test]
    fn test_flip_needs_lead_time() {
        let mut timeline = Timeline::new(2, 0, 4);
        timeline.schedule_flip(10);
        for frame in 1..=48 {
            timeline.receive(record(frame, 0));
            run(&mut timeline, 0);
        }
        assert!(!timeline.can_flip());
        timeline.receive(record(49, 0));
        run(&mut timeline, 0);
        assert!(timeline.can_flip());
    }

    #[test]
    fn test_crc_compared_once_both_known() {
        let mut timeline = Timeline::new(2, 2, 4);
        for frame in 1..=3 {
            timeline.receive(record(frame, 0));
            run(&mut timeline, 0);
        }
        assert_eq!(timeline.pending_crcs(), vec![2]);
        timeline.set_self_crc(2, 0x1234);
        assert_eq!(timeline.records()[UDP_FRAME_PACKETS - 2].crc, 0x1234);
        assert!(timeline.crc_mismatches().is_empty());

        // The peer's CRC for frame 2 arrives in a later packet.
        timeline.receive(FrameRecord {
            crc: 0x9999,
            ..record(2, 0)
        });
        assert_eq!(timeline.crc_mismatches(), vec![2]);
        assert!(timeline.crc_mismatches().is_empty());
    }

    #[test]
    fn test_crc_ahead_of_confirmed_input_ignored() {
        let mut timeline = Timeline::new(2, 2, 4);
        timeline.receive(record(1, 0));
        run(&mut timeline, 0);
        timeline.resync();

        // A record numbered from before the resync.
        timeline.receive(FrameRecord {
            crc: 0x5555,
            ..record(30, 0)
        });
        for frame in 1..=31 {
            timeline.receive(record(frame, 0));
            run(&mut timeline, 0);
        }
        timeline.set_self_crc(30, 0x1234);
        assert!(timeline.crc_mismatches().is_empty());
    }

    #[test]
    fn test_resync_restarts_at_frame_one() {
        let mut timeline = Timeline::new(2, 0, 4);
        for frame in 1..=FLIP_LEAD {
            timeline.receive(record(frame, 0x10));
            run(&mut timeline, 0);
        }
        timeline.schedule_flip(FLIP_LEAD);
        timeline.advance();
        timeline.resync();

        assert_eq!(timeline.self_frame(), 1);
        assert_eq!(timeline.read_frame(), 1);
        assert_eq!(timeline.other_frame(), 1);
        assert_eq!(timeline.flip_frame(), 1);
        assert!(timeline.flipped_at(1));
        assert_eq!(timeline.peer_input(1), 0x10);
        assert_eq!(timeline.records()[UDP_FRAME_PACKETS - 1].frame, 0);
    }

    #[test]
    fn test_records_keep_last_packet_window() {
        let mut timeline = Timeline::new(2, 0, 4);
        for frame in 1..=25 {
            timeline.receive(record(frame, 0));
            run(&mut timeline, frame as u16);
        }
        let records = timeline.records();
        assert_eq!(records[0].frame, 6);
        assert_eq!(records[UDP_FRAME_PACKETS - 1].frame, 25);
        assert_eq!(records[UDP_FRAME_PACKETS - 1].input, 25);
    }
}
