//! Playback clock model
//!
//! Derives where the authoritative playhead should be "right now" from the last
//! snapshot the owner published. A snapshot is only meaningful together with its
//! `updated_at` anchor: while playing, real elapsed wall-clock time is added on top
//! of the recorded position.

use crate::room::PlaybackState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum elapsed time credited to a late joiner (seconds)
pub const DEFAULT_GRACE_WINDOW_SECS: f64 = 10.0;

/// How elapsed time since the last snapshot is credited
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// First placement after a join or a fresh update: elapsed time is capped
    /// so a long-delayed join does not over-skip
    InitialSync { grace_window_secs: f64 },
    /// Foreground or picture-in-picture exit: exact resynchronization, uncapped
    BackgroundResume,
}

impl SyncMode {
    pub fn initial() -> Self {
        SyncMode::InitialSync {
            grace_window_secs: DEFAULT_GRACE_WINDOW_SECS,
        }
    }
}

/// Compute the target playback position for `state` at wall-clock time `now`.
///
/// Deterministic and side-effect free. Never returns a negative value; a `now`
/// earlier than the snapshot (clock skew) credits no elapsed time.
pub fn compute_target_position(state: &PlaybackState, now: DateTime<Utc>, mode: SyncMode) -> f64 {
    let base = sanitize(state.position_seconds);

    if !state.is_playing {
        return base;
    }

    let elapsed = elapsed_secs(state.last_updated_at, now);
    let credited = match mode {
        SyncMode::InitialSync { grace_window_secs } => elapsed.min(sanitize(grace_window_secs)),
        SyncMode::BackgroundResume => elapsed,
    };

    base + credited
}

/// Whether the gap between local and target time is large enough to correct.
/// Drift equal to the threshold is tolerated.
pub fn drift_exceeds(local_secs: f64, target_secs: f64, threshold_secs: f64) -> bool {
    (local_secs - target_secs).abs() > threshold_secs
}

fn elapsed_secs(since: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = now.signed_duration_since(since).num_milliseconds();
    (millis.max(0) as f64) / 1000.0
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn state(position: f64, playing: bool, at: DateTime<Utc>) -> PlaybackState {
        PlaybackState {
            source_url: Some("https://cdn.example.com/live/master.m3u8".to_string()),
            is_playing: playing,
            position_seconds: position,
            last_updated_at: at,
        }
    }

    #[test]
    fn test_paused_ignores_elapsed_time() {
        let t = Utc::now();
        let s = state(0.0, false, t);

        let target = compute_target_position(&s, t + Duration::seconds(5), SyncMode::initial());
        assert_eq!(target, 0.0);

        let target = compute_target_position(&s, t + Duration::hours(3), SyncMode::BackgroundResume);
        assert_eq!(target, 0.0);
    }

    #[test]
    fn test_late_join_within_grace_window() {
        let t = Utc::now();
        let s = state(100.0, true, t);

        let target = compute_target_position(&s, t + Duration::seconds(7), SyncMode::initial());
        assert!((target - 107.0).abs() < 1e-9);
    }

    #[test]
    fn test_late_join_is_capped() {
        let t = Utc::now();
        let s = state(100.0, true, t);

        for secs in [11, 60, 3600] {
            let target =
                compute_target_position(&s, t + Duration::seconds(secs), SyncMode::initial());
            assert!(target >= 100.0 && target <= 110.0, "target {} out of range", target);
            assert!((target - 110.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_background_resume_is_uncapped() {
        let t = Utc::now();
        let s = state(50.0, true, t);

        let target =
            compute_target_position(&s, t + Duration::seconds(30), SyncMode::BackgroundResume);
        assert!((target - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_clock_skew_never_rewinds() {
        let t = Utc::now();
        let s = state(20.0, true, t);

        let target = compute_target_position(&s, t - Duration::seconds(4), SyncMode::initial());
        assert_eq!(target, 20.0);
    }

    #[test]
    fn test_never_negative() {
        let t = Utc::now();
        let s = state(-3.0, true, t);
        assert_eq!(compute_target_position(&s, t, SyncMode::BackgroundResume), 0.0);

        let s = state(f64::NAN, false, t);
        assert_eq!(compute_target_position(&s, t, SyncMode::initial()), 0.0);
    }

    #[test]
    fn test_drift_threshold_is_inclusive_noop() {
        assert!(!drift_exceeds(10.0, 11.5, 1.5));
        assert!(!drift_exceeds(11.5, 10.0, 1.5));
        assert!(drift_exceeds(10.0, 11.6, 1.5));
        assert!(drift_exceeds(52.0, 80.0, 1.5));
    }
}
