use crate::table::FrequencyBand;

/// Returned when a sampling window holds no usable estimate
pub const NO_SIGNAL: f64 = 0.0;

/// Turns rising-edge timestamps from one sampling window into a frequency
///
/// The estimate is `1_000_000 / mean_interval_us`. Fewer than two edges,
/// or an estimate outside the configured band, yields [`NO_SIGNAL`].
#[derive(Debug, Clone, Default)]
pub struct FrequencyEstimator {
    band: Option<FrequencyBand>,
}

impl FrequencyEstimator {
    /// Estimator without a range gate
    pub fn new() -> Self {
        Self { band: None }
    }

    /// Estimator that rejects anything outside `band` as noise
    pub fn with_band(band: FrequencyBand) -> Self {
        Self { band: Some(band) }
    }

    pub fn band(&self) -> Option<FrequencyBand> {
        self.band
    }

    /// Estimate a frequency in Hz from microsecond edge timestamps
    pub fn estimate(&self, edges_us: &[u64]) -> f64 {
        if edges_us.len() < 2 {
            return NO_SIGNAL;
        }

        let intervals: Vec<u64> = edges_us
            .windows(2)
            .map(|w| w[1].saturating_sub(w[0]))
            .collect();
        if intervals.is_empty() {
            return NO_SIGNAL;
        }

        let mean_interval = intervals.iter().map(|&i| i as f64).sum::<f64>() / intervals.len() as f64;
        if mean_interval <= 0.0 {
            return NO_SIGNAL;
        }

        let frequency = 1_000_000.0 / mean_interval;
        match self.band {
            Some(band) if !band.contains(frequency) => NO_SIGNAL,
            _ => frequency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_edges(start: u64, interval: u64, count: usize) -> Vec<u64> {
        (0..count as u64).map(|i| start + i * interval).collect()
    }

    #[test]
    fn test_constant_interval() {
        let estimator = FrequencyEstimator::new();
        let edges = constant_edges(12_345, 1000, 50);
        assert!((estimator.estimate(&edges) - 1000.0).abs() < 1e-9);

        let edges = constant_edges(0, 833, 60);
        assert!((estimator.estimate(&edges) - 1_000_000.0 / 833.0).abs() < 1e-9);
    }

    #[test]
    fn test_insufficient_edges() {
        let estimator = FrequencyEstimator::new();
        assert_eq!(estimator.estimate(&[]), NO_SIGNAL);
        assert_eq!(estimator.estimate(&[42]), NO_SIGNAL);
    }

    #[test]
    fn test_two_edges_is_enough() {
        let estimator = FrequencyEstimator::new();
        assert!((estimator.estimate(&[100, 766]) - 1_000_000.0 / 666.0).abs() < 1e-9);
    }

    #[test]
    fn test_mean_of_uneven_intervals() {
        // intervals 800, 1200 -> mean 1000 us
        let estimator = FrequencyEstimator::new();
        assert!((estimator.estimate(&[0, 800, 2000]) - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_coincident_edges_rejected() {
        let estimator = FrequencyEstimator::new();
        assert_eq!(estimator.estimate(&[500, 500, 500]), NO_SIGNAL);
    }

    #[test]
    fn test_out_of_order_edges_do_not_overflow() {
        // saturating intervals MAX, 0, MAX would overflow an integer sum
        let estimator = FrequencyEstimator::new();
        let frequency = estimator.estimate(&[0, u64::MAX, 0, u64::MAX]);
        assert!(frequency > 0.0 && frequency < 1.0);

        let gated = FrequencyEstimator::with_band(FrequencyBand {
            low: 900.0,
            high: 1600.0,
        });
        assert_eq!(gated.estimate(&[0, u64::MAX, 0, u64::MAX]), NO_SIGNAL);
    }

    #[test]
    fn test_band_gate() {
        let estimator = FrequencyEstimator::with_band(FrequencyBand {
            low: 900.0,
            high: 1600.0,
        });
        // 500 Hz and 2000 Hz fall outside the band
        assert_eq!(estimator.estimate(&constant_edges(0, 2000, 10)), NO_SIGNAL);
        assert_eq!(estimator.estimate(&constant_edges(0, 500, 10)), NO_SIGNAL);
        assert!((estimator.estimate(&constant_edges(0, 1000, 10)) - 1000.0).abs() < 1e-9);
    }
}
