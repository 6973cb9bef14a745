//! # Position Filter
//!
//! Recursive 2D noise filter for raw GPS fixes.
//!
//! A single scalar variance tracks positional uncertainty in meters². Each
//! update grows the variance by elapsed time times the squared process
//! noise, then blends the raw measurement in with a gain that weighs filter
//! uncertainty against the reported GPS accuracy:
//!
//! ```text
//! variance += elapsed_secs * process_noise²
//! gain      = variance / (variance + accuracy²)
//! position += gain * (measurement - position)
//! variance *= 1 - gain
//! ```
//!
//! Process noise is chosen per step as the larger of the current speed
//! estimate and a floor, so the filter trusts new measurements more while
//! the boat is moving fast (less smoothing lag at speed) and smooths harder
//! at rest.
//!
//! The filter is an explicit state struct threaded through batch calls, not
//! hidden instance state, so a run can resume across batch boundaries.

use crate::error::Error;
use crate::TrackPoint;
use chrono::{DateTime, Utc};

/// Configuration for the position filter.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Floor for the reported GPS accuracy in meters. Accuracies of 0 (or
    /// negative, or missing upstream) are raised to this to avoid division
    /// by zero. Default: 1.0.
    pub min_accuracy: f64,
    /// Floor for the per-step process noise in meters/second, applied when
    /// the speed estimate is lower (e.g. a boat sitting on its mooring).
    /// Default: 1.0.
    pub base_process_noise: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_accuracy: 1.0,
            base_process_noise: 1.0,
        }
    }
}

/// Recursive filter state. Create once per track run and feed points in
/// capture order.
#[derive(Debug, Clone)]
pub struct PositionFilter {
    latitude: f64,
    longitude: f64,
    /// Positional uncertainty, meters².
    variance: f64,
    timestamp: DateTime<Utc>,
    initialized: bool,
}

impl PositionFilter {
    pub fn new() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            variance: 0.0,
            timestamp: DateTime::<Utc>::MIN_UTC,
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Current variance, meters². Internal filter state; never persisted.
    pub fn variance(&self) -> f64 {
        self.variance
    }

    /// Seed the filter from the first raw point of a track.
    fn initialize(&mut self, point: &TrackPoint, min_accuracy: f64) -> (f64, f64) {
        let accuracy = point.accuracy.max(min_accuracy);
        self.latitude = point.latitude;
        self.longitude = point.longitude;
        self.variance = accuracy * accuracy;
        self.timestamp = point.captured_at;
        self.initialized = true;
        (self.latitude, self.longitude)
    }

    /// Feed one raw point and return the smoothed (adjusted) position.
    ///
    /// The first point (or the first after a reset) initializes the filter
    /// and passes through unchanged. Non-finite input is an
    /// [`Error::InvalidPoint`]; the caller skips the point and the filter
    /// state is left untouched. If the update itself produces a non-finite
    /// state the filter resets so the next valid point re-seeds it.
    pub fn update(
        &mut self,
        point: &TrackPoint,
        process_noise: f64,
        config: &FilterConfig,
    ) -> Result<(f64, f64), Error> {
        if !point.is_valid() {
            return Err(Error::InvalidPoint {
                id: point.id,
                reason: "non-finite coordinate or accuracy",
            });
        }
        if !process_noise.is_finite() {
            return Err(Error::InvalidPoint {
                id: point.id,
                reason: "non-finite process noise",
            });
        }

        if !self.initialized {
            return Ok(self.initialize(point, config.min_accuracy));
        }

        let accuracy = point.accuracy.max(config.min_accuracy);
        let elapsed = (point.captured_at - self.timestamp)
            .num_milliseconds() as f64
            / 1000.0;
        // Out-of-order timestamps contribute no process noise
        let elapsed = elapsed.max(0.0);

        self.variance += elapsed * process_noise * process_noise;
        let gain = self.variance / (self.variance + accuracy * accuracy);
        self.latitude += gain * (point.latitude - self.latitude);
        self.longitude += gain * (point.longitude - self.longitude);
        self.variance *= 1.0 - gain;
        self.timestamp = point.captured_at;

        if !self.latitude.is_finite() || !self.longitude.is_finite() || !self.variance.is_finite() {
            // Poisoned state must not leak into stored positions
            self.initialized = false;
            return Err(Error::InvalidPoint {
                id: point.id,
                reason: "filter state went non-finite",
            });
        }

        Ok((self.latitude, self.longitude))
    }
}

impl Default for PositionFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn point_at(id: u64, lat: f64, lon: f64, secs: i64) -> TrackPoint {
        TrackPoint::new(id, lat, lon, 5.0, Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap())
    }

    #[test]
    fn test_first_point_initializes() {
        let mut filter = PositionFilter::new();
        let config = FilterConfig::default();
        let p = point_at(1, 54.32, 10.15, 0);

        let (lat, lon) = filter.update(&p, 1.0, &config).unwrap();
        assert_eq!(lat, 54.32);
        assert_eq!(lon, 10.15);
        assert!(filter.is_initialized());
        assert_eq!(filter.variance(), 25.0); // accuracy²
    }

    #[test]
    fn test_converges_toward_repeated_measurement() {
        let mut filter = PositionFilter::new();
        let config = FilterConfig::default();

        filter.update(&point_at(1, 54.3200, 10.1500, 0), 1.0, &config).unwrap();

        // Repeatedly measure a fixed spot a little to the north
        let target = 54.3210;
        let mut prev_error = f64::MAX;
        for i in 1..20 {
            let (lat, _) = filter
                .update(&point_at(i, target, 10.1500, i as i64), 1.0, &config)
                .unwrap();
            let error = (target - lat).abs();
            assert!(error < prev_error, "error should shrink monotonically");
            prev_error = error;
        }
        assert!(prev_error < 1e-4);
    }

    #[test]
    fn test_variance_non_increasing_at_zero_time_delta() {
        let mut filter = PositionFilter::new();
        let config = FilterConfig::default();

        filter.update(&point_at(1, 54.32, 10.15, 0), 1.0, &config).unwrap();
        let mut prev = filter.variance();
        for i in 0..5 {
            // Same timestamp: no process noise is added, so the measurement
            // update can only shrink the variance
            filter.update(&point_at(2 + i, 54.32, 10.15, 0), 1.0, &config).unwrap();
            assert!(filter.variance() <= prev);
            prev = filter.variance();
        }
    }

    #[test]
    fn test_out_of_order_timestamp_clamped() {
        let mut filter = PositionFilter::new();
        let config = FilterConfig::default();

        filter.update(&point_at(1, 54.32, 10.15, 10), 1.0, &config).unwrap();
        let before = filter.variance();
        // 5 seconds in the past: elapsed clamps to 0
        filter.update(&point_at(2, 54.32, 10.15, 5), 1.0, &config).unwrap();
        assert!(filter.variance() <= before);
    }

    #[test]
    fn test_zero_accuracy_floored() {
        let mut filter = PositionFilter::new();
        let config = FilterConfig::default();
        let mut p = point_at(1, 54.32, 10.15, 0);
        p.accuracy = 0.0;

        filter.update(&p, 1.0, &config).unwrap();
        assert_eq!(filter.variance(), 1.0); // floored to min_accuracy²

        let mut p2 = point_at(2, 54.3201, 10.15, 1);
        p2.accuracy = 0.0;
        // Must not divide by zero
        let (lat, _) = filter.update(&p2, 1.0, &config).unwrap();
        assert!(lat.is_finite());
    }

    #[test]
    fn test_non_finite_input_rejected() {
        let mut filter = PositionFilter::new();
        let config = FilterConfig::default();

        filter.update(&point_at(1, 54.32, 10.15, 0), 1.0, &config).unwrap();
        let state_before = (filter.variance(), filter.is_initialized());

        let bad = point_at(2, f64::NAN, 10.15, 1);
        let err = filter.update(&bad, 1.0, &config).unwrap_err();
        assert!(matches!(err, Error::InvalidPoint { id: 2, .. }));

        // Rejected input leaves the filter untouched
        assert_eq!((filter.variance(), filter.is_initialized()), state_before);
    }

    #[test]
    fn test_faster_process_noise_tracks_closer() {
        let config = FilterConfig::default();
        let mut slow = PositionFilter::new();
        let mut fast = PositionFilter::new();

        slow.update(&point_at(1, 54.3200, 10.15, 0), 0.5, &config).unwrap();
        fast.update(&point_at(1, 54.3200, 10.15, 0), 8.0, &config).unwrap();

        let (slow_lat, _) = slow.update(&point_at(2, 54.3210, 10.15, 1), 0.5, &config).unwrap();
        let (fast_lat, _) = fast.update(&point_at(2, 54.3210, 10.15, 1), 8.0, &config).unwrap();

        // Higher process noise means more trust in the new measurement
        assert!((54.3210 - fast_lat).abs() < (54.3210 - slow_lat).abs());
    }
}
