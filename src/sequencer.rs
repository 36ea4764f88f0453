//! Play-all sequencing across the sentence list.
//!
//! Pure state machine: callers feed it toggle/stop/completion inputs and act
//! on the returned [`SequencerEffect`]. The engine in [`crate::session`] is
//! the only driver; tests exercise it directly.

/// Where the sequencer currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerState {
    Stopped,
    Playing { index: usize },
    Paused { index: usize },
}

impl SequencerState {
    pub fn label(&self) -> &'static str {
        match self {
            SequencerState::Stopped => "stopped",
            SequencerState::Playing { .. } => "playing",
            SequencerState::Paused { .. } => "paused",
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            SequencerState::Stopped => None,
            SequencerState::Playing { index } | SequencerState::Paused { index } => Some(*index),
        }
    }
}

/// What the caller should do after a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerEffect {
    None,
    /// Begin the per-sentence lifecycle at `index`.
    Play { index: usize },
    /// Cancel whatever is in flight.
    Halt,
    /// The run walked off the end of the list.
    Finished,
}

/// Play-all cursor with resume memory.
///
/// `last_completed` survives pauses, manual single-sentence plays, and
/// interruptions, so a later toggle resumes from where the user actually got
/// to rather than from wherever the interruption landed.
#[derive(Debug)]
pub struct Sequencer {
    state: SequencerState,
    last_completed: Option<usize>,
    len: usize,
}

impl Sequencer {
    pub fn new() -> Self {
        Self {
            state: SequencerState::Stopped,
            last_completed: None,
            len: 0,
        }
    }

    /// Re-seat the sequencer over a new sentence list.
    pub fn reset(&mut self, len: usize) {
        self.state = SequencerState::Stopped;
        self.last_completed = None;
        self.len = len;
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn last_completed(&self) -> Option<usize> {
        self.last_completed
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, SequencerState::Playing { .. })
    }

    /// Play/pause/resume button.
    pub fn toggle(&mut self) -> SequencerEffect {
        if self.len == 0 {
            return SequencerEffect::None;
        }
        match self.state {
            SequencerState::Stopped => {
                let index = match self.last_completed {
                    None => 0,
                    Some(i) if i + 1 < self.len => i + 1,
                    // Everything was completed; a fresh toggle wraps around.
                    Some(_) => {
                        self.last_completed = None;
                        0
                    }
                };
                self.state = SequencerState::Playing { index };
                SequencerEffect::Play { index }
            }
            SequencerState::Playing { index } => {
                self.state = SequencerState::Paused { index };
                SequencerEffect::Halt
            }
            SequencerState::Paused { index } => {
                // The paused sentence counts as heard; resume moves on.
                let next = index + 1;
                if next < self.len {
                    self.state = SequencerState::Playing { index: next };
                    SequencerEffect::Play { index: next }
                } else {
                    self.state = SequencerState::Stopped;
                    self.last_completed = Some(self.len - 1);
                    SequencerEffect::Finished
                }
            }
        }
    }

    /// Hard stop: clears resume memory.
    pub fn stop(&mut self) -> SequencerEffect {
        self.state = SequencerState::Stopped;
        self.last_completed = None;
        SequencerEffect::Halt
    }

    /// Stop because something else took over (manual play, re-record).
    /// Resume memory is kept.
    pub fn interrupt(&mut self) -> SequencerEffect {
        self.state = SequencerState::Stopped;
        SequencerEffect::Halt
    }

    /// A sentence's lifecycle finished, whether sequenced or manual.
    pub fn on_sentence_done(&mut self, index: usize) -> SequencerEffect {
        self.last_completed = Some(index);
        match self.state {
            SequencerState::Playing { index: current } if current == index => {
                let next = index + 1;
                if next < self.len {
                    self.state = SequencerState::Playing { index: next };
                    SequencerEffect::Play { index: next }
                } else {
                    self.state = SequencerState::Stopped;
                    SequencerEffect::Finished
                }
            }
            _ => SequencerEffect::None,
        }
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(len: usize) -> Sequencer {
        let mut s = Sequencer::new();
        s.reset(len);
        s
    }

    #[test]
    fn toggle_on_empty_list_does_nothing() {
        let mut s = seq(0);
        assert_eq!(s.toggle(), SequencerEffect::None);
        assert_eq!(s.state(), SequencerState::Stopped);
    }

    #[test]
    fn fresh_toggle_starts_at_zero() {
        let mut s = seq(3);
        assert_eq!(s.toggle(), SequencerEffect::Play { index: 0 });
        assert_eq!(s.state(), SequencerState::Playing { index: 0 });
    }

    #[test]
    fn completion_advances_through_the_list() {
        let mut s = seq(3);
        s.toggle();
        assert_eq!(s.on_sentence_done(0), SequencerEffect::Play { index: 1 });
        assert_eq!(s.on_sentence_done(1), SequencerEffect::Play { index: 2 });
        assert_eq!(s.on_sentence_done(2), SequencerEffect::Finished);
        assert_eq!(s.state(), SequencerState::Stopped);
        assert_eq!(s.last_completed(), Some(2));
    }

    #[test]
    fn toggle_pauses_and_resumes_past_the_paused_sentence() {
        let mut s = seq(3);
        s.toggle();
        s.on_sentence_done(0);
        assert_eq!(s.toggle(), SequencerEffect::Halt);
        assert_eq!(s.state(), SequencerState::Paused { index: 1 });
        assert_eq!(s.toggle(), SequencerEffect::Play { index: 2 });
    }

    #[test]
    fn resume_on_last_sentence_finishes() {
        let mut s = seq(2);
        s.toggle();
        s.on_sentence_done(0);
        assert_eq!(s.toggle(), SequencerEffect::Halt);
        assert_eq!(s.toggle(), SequencerEffect::Finished);
        assert_eq!(s.state(), SequencerState::Stopped);
        assert_eq!(s.last_completed(), Some(1));
    }

    #[test]
    fn toggle_after_finish_wraps_to_start() {
        let mut s = seq(2);
        s.toggle();
        s.on_sentence_done(0);
        s.on_sentence_done(1);
        assert_eq!(s.toggle(), SequencerEffect::Play { index: 0 });
    }

    #[test]
    fn stop_clears_resume_memory() {
        let mut s = seq(3);
        s.toggle();
        s.on_sentence_done(0);
        assert_eq!(s.stop(), SequencerEffect::Halt);
        assert_eq!(s.toggle(), SequencerEffect::Play { index: 0 });
    }

    #[test]
    fn interrupt_keeps_resume_memory() {
        let mut s = seq(3);
        s.toggle();
        s.on_sentence_done(0);
        assert_eq!(s.interrupt(), SequencerEffect::Halt);
        assert_eq!(s.state(), SequencerState::Stopped);
        // Resume picks up after the last completed sentence.
        assert_eq!(s.toggle(), SequencerEffect::Play { index: 1 });
    }

    #[test]
    fn manual_completion_updates_resume_point() {
        let mut s = seq(4);
        // User played sentence 2 by hand while the sequencer was stopped.
        assert_eq!(s.on_sentence_done(2), SequencerEffect::None);
        assert_eq!(s.toggle(), SequencerEffect::Play { index: 3 });
    }

    #[test]
    fn stale_completion_does_not_advance() {
        let mut s = seq(3);
        s.toggle();
        s.on_sentence_done(0);
        // A completion for a sentence other than the current one leaves the
        // cursor alone (but still records progress).
        assert_eq!(s.on_sentence_done(0), SequencerEffect::None);
        assert_eq!(s.state(), SequencerState::Playing { index: 1 });
    }

    #[test]
    fn reset_drops_everything() {
        let mut s = seq(3);
        s.toggle();
        s.on_sentence_done(0);
        s.reset(5);
        assert_eq!(s.state(), SequencerState::Stopped);
        assert_eq!(s.last_completed(), None);
        assert_eq!(s.toggle(), SequencerEffect::Play { index: 0 });
    }
}
