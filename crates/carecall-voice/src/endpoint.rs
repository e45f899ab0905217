//! Utterance endpointing
//!
//! Decides, frame by frame, when a spoken answer is over. Loudness is the frame
//! RMS on the 16-bit scale; time is measured in audio (samples / sample rate),
//! never wall clock, so a given frame sequence always ends at the same frame.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Timing and loudness parameters for endpointing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Frames with RMS above this count as sound (default: 500 on the i16 scale)
    pub rms_threshold: f64,

    /// Silence never ends capture before this much audio was heard (default: 10s)
    pub min_listen_window: Duration,

    /// Silence span that ends capture once the listen window has passed (default: 3s)
    pub max_silence: Duration,

    /// Hard ceiling on a single capture (default: 10s)
    pub max_recording: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            rms_threshold: 500.0,
            min_listen_window: Duration::from_secs(10),
            max_silence: Duration::from_secs(3),
            max_recording: Duration::from_secs(10),
        }
    }
}

/// Why a capture ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointReason {
    SilenceTimeout,
    MaxDuration,
}

/// Detector state after the latest frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EndpointState {
    /// Audio time since capture start
    pub elapsed: Duration,
    /// Audio time since the last loud frame (or since start if none yet)
    pub silence: Duration,
    /// Set once capture must stop
    pub reason: Option<EndpointReason>,
}

impl EndpointState {
    pub fn is_terminal(&self) -> bool {
        self.reason.is_some()
    }
}

/// Root-mean-square energy of a frame on the i16 scale.
pub fn calculate_rms(frame: &[i16]) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    // i64 accumulator: 1024 * 32768^2 stays far below i64::MAX
    let sum: i64 = frame.iter().map(|&s| (s as i64) * (s as i64)).sum();
    (sum as f64 / frame.len() as f64).sqrt()
}

/// Duration of `samples` mono samples at `sample_rate`.
pub fn frame_duration(samples: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(samples as u64 * 1_000_000_000 / sample_rate as u64)
}

/// Stateful endpoint detector; one per capture.
#[derive(Debug, Clone)]
pub struct EndpointDetector {
    config: EndpointConfig,
    sample_rate: u32,
    state: EndpointState,
}

impl EndpointDetector {
    pub fn new(config: EndpointConfig, sample_rate: u32) -> Self {
        Self {
            config,
            sample_rate,
            state: EndpointState::default(),
        }
    }

    /// Feed one frame and return the updated state.
    ///
    /// Once a terminal reason is set it sticks until `reset`.
    pub fn observe(&mut self, frame: &[i16]) -> EndpointState {
        if self.state.is_terminal() {
            return self.state;
        }

        let step = frame_duration(frame.len(), self.sample_rate);
        let rms = calculate_rms(frame);

        self.state.elapsed += step;
        if rms > self.config.rms_threshold {
            self.state.silence = Duration::ZERO;
        } else {
            self.state.silence += step;
        }

        if self.state.elapsed > self.config.min_listen_window
            && self.state.silence >= self.config.max_silence
        {
            debug!(elapsed = ?self.state.elapsed, silence = ?self.state.silence, "silence timeout");
            self.state.reason = Some(EndpointReason::SilenceTimeout);
        } else if self.state.elapsed >= self.config.max_recording {
            debug!(elapsed = ?self.state.elapsed, "max recording duration reached");
            self.state.reason = Some(EndpointReason::MaxDuration);
        }

        self.state
    }

    pub fn state(&self) -> EndpointState {
        self.state
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Start over for a new capture.
    pub fn reset(&mut self) {
        self.state = EndpointState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16000;
    // 100ms frames keep the arithmetic exact
    const FRAME: usize = 1600;

    fn silent() -> Vec<i16> {
        vec![0; FRAME]
    }

    fn loud() -> Vec<i16> {
        vec![4000; FRAME]
    }

    fn config(min_listen_ms: u64, max_silence_ms: u64, max_recording_ms: u64) -> EndpointConfig {
        EndpointConfig {
            rms_threshold: 500.0,
            min_listen_window: Duration::from_millis(min_listen_ms),
            max_silence: Duration::from_millis(max_silence_ms),
            max_recording: Duration::from_millis(max_recording_ms),
        }
    }

    #[test]
    fn rms_of_constant_and_empty_frames() {
        assert_eq!(calculate_rms(&[]), 0.0);
        assert_eq!(calculate_rms(&[0, 0, 0]), 0.0);
        assert_eq!(calculate_rms(&[500, -500, 500, -500]), 500.0);
        assert!((calculate_rms(&[3, 4]) - 3.535_533_9).abs() < 1e-6);
    }

    #[test]
    fn rms_handles_extremes_without_overflow() {
        let frame = vec![i16::MIN; 1024];
        assert_eq!(calculate_rms(&frame), 32768.0);
    }

    #[test]
    fn default_frame_duration_is_64ms() {
        assert_eq!(frame_duration(1024, 16000), Duration::from_millis(64));
        assert_eq!(frame_duration(1024, 0), Duration::ZERO);
    }

    #[test]
    fn defaults_match_calibration() {
        let c = EndpointConfig::default();
        assert_eq!(c.rms_threshold, 500.0);
        assert_eq!(c.min_listen_window, Duration::from_secs(10));
        assert_eq!(c.max_silence, Duration::from_secs(3));
        assert_eq!(c.max_recording, Duration::from_secs(10));
    }

    #[test]
    fn silence_inside_listen_window_never_stops() {
        let mut detector = EndpointDetector::new(config(2000, 300, 10_000), RATE);
        // 20 frames = 2.0s, not strictly past the 2s window
        for _ in 0..20 {
            let state = detector.observe(&silent());
            assert!(!state.is_terminal(), "stopped at {:?}", state.elapsed);
        }
        assert_eq!(detector.state().silence, Duration::from_secs(2));

        let state = detector.observe(&silent());
        assert_eq!(state.reason, Some(EndpointReason::SilenceTimeout));
        assert_eq!(state.elapsed, Duration::from_millis(2100));
    }

    #[test]
    fn loud_frame_then_silence_respects_listen_floor() {
        let mut detector = EndpointDetector::new(config(3000, 500, 10_000), RATE);
        assert!(!detector.observe(&loud()).is_terminal());
        // silence reaches 500ms long before the 3s floor
        for _ in 0..29 {
            assert!(!detector.observe(&silent()).is_terminal());
        }
        let state = detector.observe(&silent());
        assert_eq!(state.elapsed, Duration::from_millis(3100));
        assert_eq!(state.reason, Some(EndpointReason::SilenceTimeout));
    }

    #[test]
    fn loud_frame_resets_silence_timer() {
        let mut detector = EndpointDetector::new(config(0, 1000, 60_000), RATE);
        for _ in 0..5 {
            detector.observe(&silent());
        }
        assert_eq!(detector.state().silence, Duration::from_millis(500));

        let state = detector.observe(&loud());
        assert_eq!(state.silence, Duration::ZERO);

        for _ in 0..9 {
            assert!(!detector.observe(&silent()).is_terminal());
        }
        assert_eq!(detector.state().silence, Duration::from_millis(900));
        let state = detector.observe(&silent());
        assert_eq!(state.reason, Some(EndpointReason::SilenceTimeout));
        assert_eq!(state.elapsed, Duration::from_millis(1600));
    }

    #[test]
    fn continuous_speech_stops_at_max_duration() {
        let mut detector = EndpointDetector::new(config(1000, 500, 2000), RATE);
        let mut frames = 0;
        let state = loop {
            frames += 1;
            let state = detector.observe(&loud());
            if state.is_terminal() {
                break state;
            }
            assert!(frames < 100);
        };
        assert_eq!(frames, 20);
        assert_eq!(state.reason, Some(EndpointReason::MaxDuration));
    }

    fn frames_until_terminal(detector: &mut EndpointDetector, frame: &[i16]) -> usize {
        let mut frames = 1;
        while !detector.observe(frame).is_terminal() {
            frames += 1;
            assert!(frames < 1000);
        }
        frames
    }

    #[test]
    fn default_config_ends_any_input_just_past_ten_seconds() {
        // 157 * 64ms = 10.048s, the first frame boundary past 10s
        let mut quiet = EndpointDetector::new(EndpointConfig::default(), 16000);
        assert_eq!(frames_until_terminal(&mut quiet, &[0i16; 1024]), 157);
        assert_eq!(quiet.state().reason, Some(EndpointReason::SilenceTimeout));

        let mut talking = EndpointDetector::new(EndpointConfig::default(), 16000);
        // 9.984s is still below the ceiling, 10.048s is not
        assert_eq!(frames_until_terminal(&mut talking, &[3000i16; 1024]), 157);
        assert_eq!(talking.state().reason, Some(EndpointReason::MaxDuration));
    }

    #[test]
    fn threshold_is_exclusive() {
        let mut detector = EndpointDetector::new(config(0, 100, 10_000), RATE);
        let at_threshold = vec![500i16; FRAME];
        let state = detector.observe(&at_threshold);
        assert_eq!(state.reason, Some(EndpointReason::SilenceTimeout));
    }

    #[test]
    fn terminal_state_is_sticky_until_reset() {
        let mut detector = EndpointDetector::new(config(0, 100, 10_000), RATE);
        let first = detector.observe(&silent());
        assert!(first.is_terminal());
        let again = detector.observe(&loud());
        assert_eq!(again, first);

        detector.reset();
        assert_eq!(detector.state(), EndpointState::default());
        assert!(!detector.observe(&loud()).is_terminal());
    }
}
