//! Playback scheduler with frame-accurate timing.
//!
//! # Timing Model
//!
//! FPS-based: each frame has a fixed duration of `1000 / frame_rate`
//! milliseconds. `play()` arms a recurring ticker with that period;
//! the host event loop pumps [`poll`](Player::poll), which reports the
//! frame indices whose draw is due and advances the playhead.
//!
//! # Boundary behavior
//!
//! Playback does not loop. The final frame IS drawn: once the frame at
//! `len - 1` has been reported for drawing, the scheduler stops itself in
//! the same tick. `current_frame` never reaches `len`.

use crossbeam_channel::{tick, Receiver};
use log::debug;
use std::time::{Duration, Instant};

use crate::session::metadata::DEFAULT_FRAME_RATE;

/// Stopped/Playing state machine over the current frame index.
///
/// Exactly one ticker exists per player at a time: `ticker` is `Some` iff
/// the player is playing.
#[derive(Debug)]
pub struct Player {
    /// Current frame index, always within `[0, len-1]` while frames exist
    pub current_frame: usize,
    /// Playback rate in frames per second (used by the next `play`)
    pub frame_rate: f64,
    is_playing: bool,
    ticker: Option<Receiver<Instant>>,
}

impl Player {
    pub fn new(frame_rate: f64) -> Self {
        Self {
            current_frame: 0,
            frame_rate,
            is_playing: false,
            ticker: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Rate used by the next `play`; an unusable rate falls back to the
    /// default at play time.
    pub fn set_frame_rate(&mut self, frame_rate: f64) {
        self.frame_rate = frame_rate;
    }

    /// Start playback over `len` frames.
    ///
    /// No-op while already playing (re-entrant) and with zero frames.
    pub fn play(&mut self, len: usize) {
        if self.is_playing || len == 0 {
            return;
        }

        let rate = if self.frame_rate > 0.0 {
            self.frame_rate
        } else {
            DEFAULT_FRAME_RATE
        };
        let period = Duration::from_secs_f64(1.0 / rate);

        self.ticker = Some(tick(period));
        self.is_playing = true;
        debug!("Playback started at {} fps ({:?} per frame)", rate, period);
    }

    /// Stop playback and drop the ticker. Idempotent from Stopped.
    pub fn stop(&mut self) {
        if self.is_playing {
            debug!("Playback stopped at frame {}", self.current_frame);
        }
        self.is_playing = false;
        self.ticker = None;
    }

    /// Report the frame indices due for drawing since the last poll and
    /// advance the playhead, auto-stopping after the final frame.
    ///
    /// Returns an empty list while stopped or with zero frames.
    pub fn poll(&mut self, len: usize) -> Vec<usize> {
        if !self.is_playing || len == 0 {
            return Vec::new();
        }

        let due = self
            .ticker
            .as_ref()
            .map(|t| t.try_iter().count())
            .unwrap_or(0);

        self.advance(due, len)
    }

    /// Step one frame forward. Only valid from Stopped; clamps at `len - 1`.
    ///
    /// Returns whether the playhead moved (caller redraws on true).
    pub fn step_forward(&mut self, len: usize) -> bool {
        if self.is_playing || len == 0 || self.current_frame + 1 >= len {
            return false;
        }
        self.current_frame += 1;
        true
    }

    /// Step one frame backward. Only valid from Stopped; clamps at 0.
    pub fn step_backward(&mut self) -> bool {
        if self.is_playing || self.current_frame == 0 {
            return false;
        }
        self.current_frame -= 1;
        true
    }

    /// Rewind to frame 0. Does not change the Playing/Stopped state.
    pub fn reset(&mut self) {
        self.current_frame = 0;
    }

    /// Consume `due` elapsed ticks: one draw per tick, stopping after the
    /// draw whose index is `len - 1`.
    fn advance(&mut self, due: usize, len: usize) -> Vec<usize> {
        let mut draws = Vec::new();

        for _ in 0..due {
            draws.push(self.current_frame);

            if self.current_frame + 1 >= len {
                debug!("Reached final frame {}, stopping", self.current_frame);
                self.stop();
                break;
            }
            self.current_frame += 1;
        }

        draws
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_advances_and_stops_at_final_frame() {
        let mut player = Player::new(24.0);
        player.play(3);
        assert!(player.is_playing());

        // More ticks elapsed than frames remain: draws end at the final index
        let draws = player.advance(10, 3);

        assert_eq!(draws, vec![0, 1, 2]);
        assert!(!player.is_playing());
        assert_eq!(player.current_frame, 2);
    }

    #[test]
    fn test_current_frame_never_reaches_len() {
        let mut player = Player::new(30.0);
        player.play(5);

        for _ in 0..20 {
            player.advance(1, 5);
            assert!(player.current_frame < 5);
        }
        assert!(!player.is_playing());
    }

    #[test]
    fn test_single_frame_sequence_draws_once_then_stops() {
        let mut player = Player::new(30.0);
        player.play(1);

        let draws = player.advance(4, 1);

        assert_eq!(draws, vec![0]);
        assert!(!player.is_playing());
        assert_eq!(player.current_frame, 0);
    }

    #[test]
    fn test_play_with_no_frames_is_noop() {
        let mut player = Player::new(30.0);
        player.play(0);
        assert!(!player.is_playing());
        assert!(player.poll(0).is_empty());
    }

    #[test]
    fn test_play_is_reentrant() {
        let mut player = Player::new(30.0);
        player.play(3);
        player.advance(1, 3);
        player.play(3); // already playing, ignored

        assert!(player.is_playing());
        assert_eq!(player.current_frame, 1);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut player = Player::new(30.0);
        player.play(3);
        player.stop();
        player.stop();
        assert!(!player.is_playing());
    }

    #[test]
    fn test_steps_clamp_at_bounds() {
        let mut player = Player::new(30.0);

        assert!(!player.step_backward()); // at 0
        assert!(player.step_forward(3));
        assert!(player.step_forward(3));
        assert_eq!(player.current_frame, 2);
        assert!(!player.step_forward(3)); // at len-1
        assert!(player.step_backward());
        assert_eq!(player.current_frame, 1);
    }

    #[test]
    fn test_steps_refused_while_playing() {
        let mut player = Player::new(30.0);
        player.play(5);

        assert!(!player.step_forward(5));
        assert!(!player.step_backward());
        assert_eq!(player.current_frame, 0);
    }

    #[test]
    fn test_reset_keeps_playback_state() {
        let mut player = Player::new(30.0);
        player.play(5);
        player.advance(2, 5);
        assert_eq!(player.current_frame, 2);

        player.reset();
        assert_eq!(player.current_frame, 0);
        assert!(player.is_playing());
    }

    #[test]
    fn test_unusable_rate_falls_back_to_default() {
        let mut player = Player::new(0.0);
        player.play(2);
        // Armed despite the zero rate: the default applied
        assert!(player.is_playing());
    }

    #[test]
    fn test_ticker_fires_in_real_time() {
        let mut player = Player::new(100.0); // 10ms period
        player.play(50);

        std::thread::sleep(Duration::from_millis(50));
        let draws = player.poll(50);

        assert!(!draws.is_empty());
        assert_eq!(draws[0], 0);
    }
}
