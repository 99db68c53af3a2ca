//! Relay / peak-detection autotuner.
//!
//! Coarse Ziegler–Nichols variant: the designated zone is driven at a fixed
//! test output while the tuner watches for new temperature peaks.  Each
//! peak that beats the previous one by more than the threshold counts as
//! one oscillation; the gap since the previous peak is one period sample.
//!
//! The tuner is pure bookkeeping.  Pacing, locking and committing the
//! result belong to the autotune task.

use crate::config::SystemConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutotuneSettings {
    pub window_ms: u32,
    pub sample_ms: u32,
    /// Test output in percent; doubles as the ultimate gain Ku.
    pub output_percent: f32,
    pub peak_threshold_c: f32,
    pub default_period_s: f32,
}

impl From<&SystemConfig> for AutotuneSettings {
    fn from(cfg: &SystemConfig) -> Self {
        Self {
            window_ms: cfg.autotune_window_ms,
            sample_ms: cfg.autotune_sample_ms,
            output_percent: cfg.autotune_output_percent,
            peak_threshold_c: cfg.autotune_peak_threshold_c,
            default_period_s: cfg.autotune_default_period_s,
        }
    }
}

/// Gains derived from one observation window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TunedGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    pub ultimate_gain: f32,
    pub ultimate_period_s: f32,
    pub oscillations: u32,
}

pub struct RelayTuner {
    settings: AutotuneSettings,
    start_ms: u32,
    peak_c: f32,
    last_peak_ms: u32,
    period_sum_ms: u64,
    oscillations: u32,
}

impl RelayTuner {
    /// Start a window at `start_ms` with the zone at `initial_c`.
    pub fn new(settings: AutotuneSettings, start_ms: u32, initial_c: f32) -> Self {
        Self {
            settings,
            start_ms,
            peak_c: initial_c,
            last_peak_ms: start_ms,
            period_sum_ms: 0,
            oscillations: 0,
        }
    }

    /// Feed one sample.  Returns `true` if it was recorded as a new peak.
    pub fn observe(&mut self, temp_c: f32, now_ms: u32) -> bool {
        // A NaN peak (cold start on a faulted read) is replaced by the first real sample.
        if self.peak_c.is_nan() {
            self.peak_c = temp_c;
            return false;
        }
        if temp_c > self.peak_c + self.settings.peak_threshold_c {
            let period = now_ms.wrapping_sub(self.last_peak_ms);
            self.period_sum_ms += u64::from(period);
            self.oscillations += 1;
            self.last_peak_ms = now_ms;
            self.peak_c = temp_c;
            return true;
        }
        false
    }

    pub fn is_complete(&self, now_ms: u32) -> bool {
        now_ms.wrapping_sub(self.start_ms) >= self.settings.window_ms
    }

    pub fn oscillations(&self) -> u32 {
        self.oscillations
    }

    pub fn peak(&self) -> f32 {
        self.peak_c
    }

    /// Derive gains.  With no oscillation the default period is used.
    pub fn finish(&self) -> TunedGains {
        let tu = if self.oscillations > 0 {
            self.period_sum_ms as f32 / self.oscillations as f32 / 1000.0
        } else {
            self.settings.default_period_s
        };
        let ku = self.settings.output_percent;
        TunedGains {
            kp: 0.6 * ku,
            ki: 2.0 * ku / tu,
            kd: ku * tu / 8.0,
            ultimate_gain: ku,
            ultimate_period_s: tu,
            oscillations: self.oscillations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> AutotuneSettings {
        AutotuneSettings::from(&SystemConfig::default())
    }

    #[test]
    fn no_oscillation_falls_back_to_default_period() {
        let mut tuner = RelayTuner::new(settings(), 0, 25.0);
        for i in 1..=60 {
            assert!(!tuner.observe(25.4, i * 500));
        }
        let g = tuner.finish();
        assert_eq!(g.oscillations, 0);
        assert_eq!(g.ultimate_period_s, 5.0);
        assert!((g.kp - 30.0).abs() < 1e-4);
        assert!((g.ki - 20.0).abs() < 1e-4);
        assert!((g.kd - 31.25).abs() < 1e-4);
        assert!(g.ki.is_finite());
    }

    #[test]
    fn period_is_mean_gap_between_peaks() {
        let mut tuner = RelayTuner::new(settings(), 1000, 20.0);
        assert!(tuner.observe(22.0, 3000));
        assert!(!tuner.observe(22.5, 3500));
        assert!(tuner.observe(24.0, 7000));
        let g = tuner.finish();
        assert_eq!(g.oscillations, 2);
        // gaps 2000 ms and 4000 ms
        assert!((g.ultimate_period_s - 3.0).abs() < 1e-4);
        assert!((g.ki - 2.0 * 50.0 / 3.0).abs() < 1e-3);
    }

    #[test]
    fn threshold_is_strict() {
        let mut tuner = RelayTuner::new(settings(), 0, 20.0);
        assert!(!tuner.observe(21.0, 500));
        assert!(tuner.observe(21.01, 1000));
    }

    #[test]
    fn nan_samples_never_count() {
        let mut tuner = RelayTuner::new(settings(), 0, 20.0);
        assert!(!tuner.observe(f32::NAN, 500));
        assert_eq!(tuner.oscillations(), 0);
    }

    #[test]
    fn completes_after_window() {
        let tuner = RelayTuner::new(settings(), 100, 20.0);
        assert!(!tuner.is_complete(30_099));
        assert!(tuner.is_complete(30_100));
    }
}
