//! Typing simulator.
//!
//! [`RevealState`] holds the pure pacing logic: the latest target text, how
//! much of it has been shown, and the delay before the next unit.
//! [`TypingSimulator`] drives it from a [`Scheduler`] and reports each new
//! revealed prefix through a callback.
//!
//! Pacing per unit:
//! - base delay is the midpoint of `[min, max]`, or with adaptive speed the
//!   mean gap between recent content updates clamped to `[min, max]`
//! - x2 before `.`, `!`, `?`; x1.5 before `,`, `;`; x0.5 before whitespace

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::{TypingConfig, TypingMode};
use crate::traits::{Scheduler, TimerHandle};

const WORD_BOUNDARIES: &[char] = &[' ', '\n', ',', '.', '!', '?', ':', ';'];

/// Reveal position and pacing for one piece of text.
#[derive(Debug, Clone)]
pub struct RevealState {
    config: TypingConfig,
    target: String,
    /// Byte offset into `target`, always on a char boundary
    revealed_len: usize,
    last_update: Option<Instant>,
    recent_gaps: VecDeque<Duration>,
}

impl RevealState {
    pub fn new(config: TypingConfig) -> Self {
        Self {
            recent_gaps: VecDeque::with_capacity(config.history_len),
            config,
            target: String::new(),
            revealed_len: 0,
            last_update: None,
        }
    }

    /// Replace the target with `content`, received at `now`.
    ///
    /// Empty and shorter content is ignored so the target never shrinks.
    /// Returns whether the target changed.
    pub fn set_target(&mut self, content: &str, now: Instant) -> bool {
        if content.is_empty() || content.len() < self.target.len() || content == self.target {
            return false;
        }

        if let Some(last) = self.last_update {
            self.recent_gaps.push_back(now.saturating_duration_since(last));
            while self.recent_gaps.len() > self.config.history_len {
                self.recent_gaps.pop_front();
            }
        }
        self.last_update = Some(now);

        if !content.starts_with(&self.target[..self.revealed_len]) {
            // Diverging rewrite. The position never moves back; it only
            // snaps forward to the next char boundary of the new text.
            tracing::debug!(
                revealed = self.revealed_len,
                matching = common_prefix_len(&self.target[..self.revealed_len], content),
                "reveal target rewritten"
            );
            while !content.is_char_boundary(self.revealed_len) {
                self.revealed_len += 1;
            }
        }
        self.target = content.to_string();
        true
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn revealed(&self) -> &str {
        &self.target[..self.revealed_len]
    }

    pub fn is_caught_up(&self) -> bool {
        self.revealed_len >= self.target.len()
    }

    /// Delay before revealing the next unit.
    pub fn next_delay(&self) -> Duration {
        let base = self.base_delay();
        match self.target[self.revealed_len..].chars().next() {
            Some('.' | '!' | '?') => base * 2,
            Some(',' | ';') => base.mul_f64(1.5),
            Some(c) if c.is_whitespace() => base / 2,
            _ => base,
        }
    }

    fn base_delay(&self) -> Duration {
        let (min, max) = (self.config.min_delay(), self.config.max_delay());
        if !self.config.adaptive_speed || self.recent_gaps.is_empty() {
            return (min + max) / 2;
        }
        let total: Duration = self.recent_gaps.iter().sum();
        let mean = total / self.recent_gaps.len() as u32;
        mean.clamp(min, max)
    }

    /// Reveal one more unit. Returns the new revealed prefix, or `None`
    /// when already caught up.
    pub fn step(&mut self) -> Option<&str> {
        if self.is_caught_up() {
            return None;
        }
        let rest = &self.target[self.revealed_len..];
        let advance = match self.config.mode {
            TypingMode::Character => rest.chars().next().map_or(0, char::len_utf8),
            TypingMode::Word => match rest.find(WORD_BOUNDARIES) {
                // Boundary chars are all one byte
                Some(pos) => pos + 1,
                None => rest.chars().next().map_or(0, char::len_utf8),
            },
        };
        self.revealed_len += advance;
        Some(self.revealed())
    }

    /// Forget the target, position and timing history.
    pub fn reset(&mut self) {
        self.target.clear();
        self.revealed_len = 0;
        self.last_update = None;
        self.recent_gaps.clear();
    }
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, ca), cb)| ca != cb)
        .map_or_else(|| a.len().min(b.len()), |((i, _), _)| i)
}

type UpdateCallback = Box<dyn Fn(&str) + Send + Sync>;

struct RevealLoop {
    reveal: RevealState,
    timer: Option<TimerHandle>,
    /// Bumped by `stop` so ticks scheduled before it do nothing.
    epoch: u64,
}

struct Shared {
    state: Mutex<RevealLoop>,
    on_update: UpdateCallback,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, RevealLoop> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Scheduler-driven reveal loop.
///
/// `on_update` is called from the loop with the current revealed prefix. It
/// runs while the simulator's lock is held and must not call back into the
/// simulator.
#[derive(Clone)]
pub struct TypingSimulator {
    shared: Arc<Shared>,
    scheduler: Arc<dyn Scheduler>,
}

impl TypingSimulator {
    pub fn new(
        config: TypingConfig,
        scheduler: Arc<dyn Scheduler>,
        on_update: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(RevealLoop {
                    reveal: RevealState::new(config),
                    timer: None,
                    epoch: 0,
                }),
                on_update: Box::new(on_update),
            }),
            scheduler,
        }
    }

    /// Start the loop if there is unrevealed text and no tick is pending.
    pub fn start(&self) {
        let mut state = self.shared.lock();
        self.ensure_scheduled(&mut state);
    }

    /// Provide the latest full-so-far text. Starts the loop if needed.
    pub fn update_content(&self, content: &str) {
        let now = self.scheduler.now();
        let mut state = self.shared.lock();
        if state.reveal.set_target(content, now) {
            self.ensure_scheduled(&mut state);
        }
    }

    /// Cancel the loop and reset all position and timing state. Idempotent.
    pub fn stop(&self) {
        let mut state = self.shared.lock();
        state.epoch += 1;
        if let Some(timer) = state.timer.take() {
            timer.cancel();
        }
        state.reveal.reset();
    }

    pub fn revealed(&self) -> String {
        self.shared.lock().reveal.revealed().to_string()
    }

    /// Whether a tick is pending.
    pub fn is_running(&self) -> bool {
        self.shared.lock().timer.is_some()
    }

    fn ensure_scheduled(&self, state: &mut RevealLoop) {
        if state.timer.is_none() && !state.reveal.is_caught_up() {
            let delay = state.reveal.next_delay();
            state.timer = Some(schedule_tick(
                Arc::downgrade(&self.shared),
                self.scheduler.clone(),
                state.epoch,
                delay,
            ));
        }
    }
}

fn schedule_tick(
    shared: Weak<Shared>,
    scheduler: Arc<dyn Scheduler>,
    epoch: u64,
    delay: Duration,
) -> TimerHandle {
    let next_scheduler = scheduler.clone();
    scheduler.schedule(
        delay,
        Box::pin(async move {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            let mut state = shared.lock();
            if state.epoch != epoch {
                return;
            }
            state.timer = None;

            if let Some(revealed) = state.reveal.step() {
                (shared.on_update)(revealed);
            }
            if !state.reveal.is_caught_up() {
                let delay = state.reveal.next_delay();
                state.timer = Some(schedule_tick(
                    Arc::downgrade(&shared),
                    next_scheduler,
                    epoch,
                    delay,
                ));
            }
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(mode: TypingMode, adaptive: bool) -> TypingConfig {
        TypingConfig {
            min_delay_ms: 2,
            max_delay_ms: 8,
            adaptive_speed: adaptive,
            mode,
            history_len: 5,
        }
    }

    fn drain(state: &mut RevealState) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(text) = state.step() {
            out.push(text.to_string());
        }
        out
    }

    #[test]
    fn test_character_mode_reveals_one_char_per_step() {
        let mut state = RevealState::new(config(TypingMode::Character, false));
        state.set_target("héy", Instant::now());
        assert_eq!(drain(&mut state), vec!["h", "hé", "héy"]);
        assert!(state.is_caught_up());
        assert_eq!(state.step(), None);
    }

    #[test]
    fn test_word_mode_stops_after_boundaries() {
        let mut state = RevealState::new(config(TypingMode::Word, false));
        state.set_target("Hi there, friend", Instant::now());
        assert_eq!(
            drain(&mut state),
            vec![
                "Hi ",
                "Hi there,",
                "Hi there, ",
                "Hi there, f",
                "Hi there, fr",
                "Hi there, fri",
                "Hi there, frie",
                "Hi there, frien",
                "Hi there, friend"
            ]
        );
    }

    #[test]
    fn test_target_never_shrinks() {
        let mut state = RevealState::new(config(TypingMode::Character, false));
        let now = Instant::now();
        assert!(state.set_target("Hello", now));
        state.step();
        assert!(!state.set_target("He", now));
        assert!(!state.set_target("", now));
        assert!(!state.set_target("Hello", now));
        assert_eq!(state.target(), "Hello");
        assert_eq!(state.revealed(), "H");
    }

    #[test]
    fn test_diverging_target_never_moves_reveal_back() {
        let mut state = RevealState::new(config(TypingMode::Character, false));
        let now = Instant::now();
        state.set_target("\n\n", now);
        drain(&mut state);
        assert_eq!(state.revealed(), "\n\n");

        assert!(state.set_target("Answer", now));
        assert_eq!(state.revealed(), "An");
        assert_eq!(drain(&mut state), vec!["Ans", "Answ", "Answe", "Answer"]);
    }

    #[test]
    fn test_diverging_target_snaps_to_char_boundary() {
        let mut state = RevealState::new(config(TypingMode::Character, false));
        let now = Instant::now();
        state.set_target("ab", now);
        state.step();
        // 'é' is two bytes; byte 1 falls inside it.
        assert!(state.set_target("éx", now));
        assert_eq!(state.revealed(), "é");
    }

    #[test]
    fn test_delay_multipliers() {
        let mut state = RevealState::new(config(TypingMode::Character, false));
        state.set_target("a. b,c", Instant::now());
        // midpoint of [2, 8]
        assert_eq!(state.next_delay(), Duration::from_millis(5));
        state.step();
        assert_eq!(state.next_delay(), Duration::from_millis(10));
        state.step();
        assert_eq!(state.next_delay(), Duration::from_micros(2500));
        state.step();
        state.step();
        assert_eq!(state.next_delay(), Duration::from_micros(7500));
    }

    #[test]
    fn test_adaptive_delay_tracks_update_gaps_within_bounds() {
        let mut state = RevealState::new(config(TypingMode::Character, true));
        let start = Instant::now();
        state.set_target("a", start);
        state.set_target("ab", start + Duration::from_millis(4));
        state.set_target("abc", start + Duration::from_millis(8));
        assert_eq!(state.next_delay(), Duration::from_millis(4));

        state.set_target("abcd", start + Duration::from_millis(500));
        // mean gap is far above max
        assert_eq!(state.next_delay(), Duration::from_millis(8));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = RevealState::new(config(TypingMode::Character, true));
        state.set_target("abc", Instant::now());
        state.step();
        state.reset();
        assert_eq!(state.revealed(), "");
        assert_eq!(state.target(), "");
        assert!(state.is_caught_up());
    }

    #[test]
    fn test_common_prefix_len() {
        assert_eq!(common_prefix_len("abc", "abd"), 2);
        assert_eq!(common_prefix_len("ab", "abc"), 2);
        assert_eq!(common_prefix_len("é", "e"), 0);
    }
}
