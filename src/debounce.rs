//! Explicit debounce state machines.
//!
//! A [`CoalescingSlot`] owns everything a debounce needs to be deterministic:
//! the edge it fires on, whether a window is currently open, the most recent
//! coalesced payload, and a generation token. The app schedules one timer per
//! generation; a timer completion carrying a stale generation is a no-op, so
//! superseded windows never fire.

/// Which edge of the quiet window a slot fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceEdge {
    /// Fire the first trigger immediately, coalesce the rest until the
    /// window settles, then fire the last one (if any arrived).
    Leading,
    /// Coalesce every trigger and fire only once the window settles.
    Trailing,
}

/// What the caller must do after feeding a trigger or timer completion in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAction<T> {
    /// Payload to act on now.
    pub fire: Option<T>,
    /// Generation to schedule a fresh timer for.
    pub schedule: Option<u64>,
}

impl<T> SlotAction<T> {
    fn none() -> Self {
        Self {
            fire: None,
            schedule: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoalescingSlot<T> {
    edge: DebounceEdge,
    generation: u64,
    pending: Option<T>,
    window_open: bool,
}

impl<T> CoalescingSlot<T> {
    pub fn leading() -> Self {
        Self::new(DebounceEdge::Leading)
    }

    pub fn trailing() -> Self {
        Self::new(DebounceEdge::Trailing)
    }

    pub fn new(edge: DebounceEdge) -> Self {
        Self {
            edge,
            generation: 0,
            pending: None,
            window_open: false,
        }
    }

    pub fn edge(&self) -> DebounceEdge {
        self.edge
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_window_open(&self) -> bool {
        self.window_open
    }

    /// Feed a new payload in.
    #[must_use]
    pub fn trigger(&mut self, payload: T) -> SlotAction<T> {
        match self.edge {
            DebounceEdge::Leading => {
                if self.window_open {
                    self.pending = Some(payload);
                    SlotAction::none()
                } else {
                    self.window_open = true;
                    self.generation += 1;
                    SlotAction {
                        fire: Some(payload),
                        schedule: Some(self.generation),
                    }
                }
            }
            DebounceEdge::Trailing => {
                self.window_open = true;
                self.generation += 1;
                self.pending = Some(payload);
                SlotAction {
                    fire: None,
                    schedule: Some(self.generation),
                }
            }
        }
    }

    /// Feed a timer completion in. Completions for superseded generations
    /// are ignored.
    #[must_use]
    pub fn elapsed(&mut self, generation: u64) -> SlotAction<T> {
        if !self.window_open || generation != self.generation {
            return SlotAction::none();
        }

        match self.edge {
            DebounceEdge::Leading => match self.pending.take() {
                // A coalesced payload fires at the settle point and opens
                // a fresh window of its own.
                Some(payload) => {
                    self.generation += 1;
                    SlotAction {
                        fire: Some(payload),
                        schedule: Some(self.generation),
                    }
                }
                None => {
                    self.window_open = false;
                    SlotAction::none()
                }
            },
            DebounceEdge::Trailing => {
                self.window_open = false;
                SlotAction {
                    fire: self.pending.take(),
                    schedule: None,
                }
            }
        }
    }

    /// Abandon any open window and pending payload.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.pending = None;
        self.window_open = false;
    }
}
