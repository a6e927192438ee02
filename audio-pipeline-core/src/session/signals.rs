use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Set of level-triggered pipeline signals.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Signals(u32);

impl Signals {
    pub const NONE: Self = Self(0);
    /// None of RECORDING, PLAYING or WRITING is set.
    pub const IDLE: Self = Self(1 << 0);
    pub const RECORDING: Self = Self(1 << 1);
    pub const PLAYING: Self = Self(1 << 2);
    /// A finished capture is being persisted; the arena is still in use.
    pub const WRITING: Self = Self(1 << 3);
    pub const ERROR: Self = Self(1 << 4);
    pub const STOP_REQUESTED: Self = Self(1 << 5);
    pub const RECORDING_DONE: Self = Self(1 << 6);
    pub const PLAYBACK_DONE: Self = Self(1 << 7);

    /// Signals that keep the pipeline out of IDLE.
    pub const ACTIVE: Self = Self(Self::RECORDING.0 | Self::PLAYING.0 | Self::WRITING.0);

    const NAMES: [(Signals, &'static str); 8] = [
        (Self::IDLE, "IDLE"),
        (Self::RECORDING, "RECORDING"),
        (Self::PLAYING, "PLAYING"),
        (Self::WRITING, "WRITING"),
        (Self::ERROR, "ERROR"),
        (Self::STOP_REQUESTED, "STOP_REQUESTED"),
        (Self::RECORDING_DONE, "RECORDING_DONE"),
        (Self::PLAYBACK_DONE, "PLAYBACK_DONE"),
    ];

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// All bits of `other` are set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for Signals {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.with(rhs)
    }
}

impl BitOrAssign for Signals {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = self.with(rhs);
    }
}

impl BitAnd for Signals {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl std::fmt::Debug for Signals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "Signals({})", names.join(" | "))
    }
}

/// Shared signal set with bounded waits.
///
/// Every mutation wakes all waiters; waiters re-check their bits, so a
/// signal that is set and cleared again before a waiter runs is missed.
/// Use sticky "done" bits for completions.
pub struct SignalSet {
    bits: Mutex<Signals>,
    changed: Condvar,
}

impl SignalSet {
    pub fn new(initial: Signals) -> Self {
        Self {
            bits: Mutex::new(initial),
            changed: Condvar::new(),
        }
    }

    pub fn get(&self) -> Signals {
        *self.bits.lock()
    }

    pub fn set(&self, bits: Signals) -> Signals {
        self.modify(|current| current.with(bits))
    }

    pub fn clear(&self, bits: Signals) -> Signals {
        self.modify(|current| current.without(bits))
    }

    /// Set and clear in one step. Returns the new value.
    pub fn update(&self, set: Signals, clear: Signals) -> Signals {
        self.modify(|current| current.without(clear).with(set))
    }

    /// Replace the value with `f(current)` under the lock.
    pub fn modify(&self, f: impl FnOnce(Signals) -> Signals) -> Signals {
        let mut bits = self.bits.lock();
        *bits = f(*bits);
        self.changed.notify_all();
        *bits
    }

    /// Wait until any of `bits` is set, for at most `timeout`.
    ///
    /// Returns the matching bits, or `None` on timeout. With
    /// `clear_on_exit` the matching bits are cleared before returning.
    pub fn wait_any(&self, bits: Signals, timeout: Duration, clear_on_exit: bool) -> Option<Signals> {
        let deadline = Instant::now() + timeout;
        let mut current = self.bits.lock();
        loop {
            let hit = *current & bits;
            if !hit.is_empty() {
                if clear_on_exit {
                    *current = current.without(hit);
                    self.changed.notify_all();
                }
                return Some(hit);
            }
            if self.changed.wait_until(&mut current, deadline).timed_out() {
                let hit = *current & bits;
                if hit.is_empty() {
                    return None;
                }
            }
        }
    }
}
