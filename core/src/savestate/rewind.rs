//! Rewind state manager
//!
//! A bounded stack of savestates. While rewind is not held a state is pushed
//! every `granularity` ticks; while held one is popped every `granularity`
//! ticks. When full, the oldest state is dropped and its buffer reused.

use std::collections::VecDeque;

#[derive(Debug)]
pub struct RewindManager {
    states: VecDeque<Vec<u8>>,
    capacity: usize,
    buffer_size: usize,
    state_size: usize,
    granularity: u32,
    /// Ticks since the last push or pop, modulo `granularity`.
    counter: u32,
    rewinding: bool,
    spare: Option<Vec<u8>>,
}

impl RewindManager {
    /// Room for `buffer_size / state_size` states, at least one.
    pub fn new(buffer_size: usize, state_size: usize, granularity: u32) -> Self {
        let capacity = (buffer_size / state_size.max(1)).max(1);
        tracing::info!(
            capacity,
            state_size,
            granularity,
            "Rewind buffer allocated"
        );
        Self {
            states: VecDeque::with_capacity(capacity),
            capacity,
            buffer_size,
            state_size,
            granularity: granularity.max(1),
            counter: 0,
            rewinding: false,
            spare: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state_size(&self) -> usize {
        self.state_size
    }

    pub fn granularity(&self) -> u32 {
        self.granularity
    }

    /// Advance the tick counter. True on ticks where a push or pop is due.
    pub fn step(&mut self) -> bool {
        let due = self.counter == 0;
        self.counter = (self.counter + 1) % self.granularity;
        due
    }

    /// Capture a state with `serialize`, which fills the given buffer. A
    /// failed capture leaves the stack unchanged.
    pub fn push(&mut self, serialize: impl FnOnce(&mut [u8]) -> bool) -> bool {
        let mut buf = if self.states.len() >= self.capacity {
            self.states.pop_front()
        } else {
            self.spare.take()
        }
        .unwrap_or_default();
        buf.resize(self.state_size, 0);

        if serialize(&mut buf) {
            self.states.push_back(buf);
            true
        } else {
            self.spare = Some(buf);
            false
        }
    }

    /// Most recent state. Hand the buffer back with [`Self::recycle`].
    pub fn pop(&mut self) -> Option<Vec<u8>> {
        self.states.pop_back()
    }

    pub fn recycle(&mut self, buf: Vec<u8>) {
        self.spare = Some(buf);
    }

    pub fn rewinding(&self) -> bool {
        self.rewinding
    }

    /// Switch between pushing and popping. The first step after a switch is
    /// always due.
    pub fn set_rewinding(&mut self, rewinding: bool) {
        if self.rewinding != rewinding {
            self.counter = 0;
        }
        self.rewinding = rewinding;
    }

    /// Drop every state, e.g. after a state size change.
    pub fn clear(&mut self, state_size: usize) {
        self.states.clear();
        self.spare = None;
        self.state_size = state_size;
        self.capacity = (self.buffer_size / state_size.max(1)).max(1);
        self.counter = 0;
    }
}
