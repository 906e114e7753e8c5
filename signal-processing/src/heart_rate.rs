//! Adaptive threshold QRS detector.
//!
//! The detector works on the absolute first difference of the smoothed ECG signal. It learns its
//! threshold from the largest slope seen in a two second window, then times four consecutive
//! threshold crossings and converts the average interval to beats per minute.

use heapless::Vec;

use crate::sampling::SamplingFrequency;

/// Number of peaks timed for one heart rate estimate.
pub const PEAKS_PER_ESTIMATE: usize = 4;

/// Upper bound of reported heart rates, in beats per minute.
pub const MAX_HEART_RATE: f64 = 250.0;

/// Window lengths of the detector, in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    /// Length of the window the threshold is learned from.
    pub calibration_ms: u32,
    /// How long the maximum is tracked after a crossing.
    pub maxima_search_ms: u32,
    /// Upper bound of the dead time after a peak.
    pub min_skip_ms: u32,
    /// Quiet time after which the signal is considered lost.
    pub silence_timeout_ms: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            calibration_ms: 2000,
            maxima_search_ms: 400,
            min_skip_ms: 240,
            silence_timeout_ms: 3000,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Thresholds {
    /// Threshold learned in the last calibration window.
    pub old: i32,
    /// Threshold crossings are detected against.
    pub new: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Armed,
    Searching { samples: u32, peak: i32 },
    Latched,
}

pub struct QrsDetector {
    fs: SamplingFrequency,
    timing: Timing,

    calibration_window: u32,
    maxima_search_window: u32,
    min_skip_window: u32,
    silence_timeout: u32,

    prev_sample: i32,
    max_derivative: i32,
    window_samples: u32,
    thresholds: Thresholds,
    calibrated: bool,

    stage: Stage,
    beat_started: bool,
    sample_count: u32,
    no_peak_count: u32,
    peak_sum: i64,
    peak_timestamps: Vec<u32, PEAKS_PER_ESTIMATE>,
    interval_sum: u32,
}

impl QrsDetector {
    pub fn new(fs: SamplingFrequency) -> Self {
        Self::with_timing(fs, Timing::default())
    }

    pub fn with_timing(fs: SamplingFrequency, timing: Timing) -> Self {
        Self {
            fs,
            timing,

            calibration_window: fs.ms_to_samples(timing.calibration_ms).max(1),
            maxima_search_window: fs.ms_to_samples(timing.maxima_search_ms),
            min_skip_window: fs.ms_to_samples(timing.min_skip_ms),
            silence_timeout: fs.ms_to_samples(timing.silence_timeout_ms),

            prev_sample: 0,
            max_derivative: 0,
            window_samples: 0,
            thresholds: Thresholds::default(),
            calibrated: false,

            stage: Stage::Armed,
            beat_started: false,
            sample_count: 0,
            no_peak_count: 0,
            peak_sum: 0,
            peak_timestamps: Vec::new(),
            interval_sum: 0,
        }
    }

    /// Resets the detector, including the sample history.
    pub fn clear(&mut self) {
        *self = Self::with_timing(self.fs, self.timing);
    }

    #[inline]
    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    #[inline]
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Processes a smoothed ECG sample. Returns a heart rate estimate every fourth detected peak.
    pub fn update(&mut self, sample: i32) -> Option<f64> {
        let derivative = sample.saturating_sub(self.prev_sample).saturating_abs();
        self.prev_sample = sample;

        self.track_maximum(derivative);

        if self.calibrated {
            self.detect(derivative)
        } else {
            None
        }
    }

    fn track_maximum(&mut self, derivative: i32) {
        self.max_derivative = self.max_derivative.max(derivative);
        self.window_samples += 1;

        if self.window_samples >= self.calibration_window {
            let threshold = seventy_percent(i64::from(self.max_derivative));
            if !self.calibrated {
                debug!("QRS threshold calibrated to {}", threshold);
            }

            self.thresholds = Thresholds {
                old: threshold,
                new: threshold,
            };
            self.calibrated = true;
            self.max_derivative = 0;
            self.window_samples = 0;
        }
    }

    fn detect(&mut self, derivative: i32) -> Option<f64> {
        match self.stage {
            Stage::Searching { samples, peak } => {
                self.sample_count += 1;

                let samples = samples + 1;
                let peak = peak.max(derivative);

                self.stage = if samples >= self.maxima_search_window {
                    self.peak_sum += i64::from(peak);
                    Stage::Latched
                } else {
                    Stage::Searching { samples, peak }
                };

                None
            }

            Stage::Latched => {
                self.sample_count += 1;

                // The dead time shares its counter with the silence timer, so quiet time before
                // the crossing shortens it.
                self.no_peak_count += 1;
                if self.no_peak_count >= self.min_skip_window {
                    self.no_peak_count = 0;
                    self.stage = Stage::Armed;
                }

                if self.peak_timestamps.is_full() {
                    Some(self.estimate())
                } else {
                    None
                }
            }

            Stage::Armed if derivative > self.thresholds.new => {
                self.beat_started = true;
                self.sample_count += 1;

                let previous = self.peak_timestamps.last().copied();
                if self.peak_timestamps.push(self.sample_count).is_ok() {
                    if let Some(previous) = previous {
                        self.interval_sum += self.sample_count - previous;
                    }
                }

                trace!("QRS crossing at {}", self.sample_count);
                self.stage = Stage::Searching {
                    samples: 0,
                    peak: derivative,
                };

                None
            }

            Stage::Armed => {
                // Samples exactly on the threshold do not advance the beat clock.
                if self.beat_started && derivative < self.thresholds.new {
                    self.sample_count += 1;
                }

                self.no_peak_count += 1;
                if self.no_peak_count > self.silence_timeout {
                    debug!("No QRS complex for {} samples, recalibrating", self.no_peak_count);
                    self.reset();
                }

                None
            }
        }
    }

    fn estimate(&mut self) -> f64 {
        let intervals = (PEAKS_PER_ESTIMATE - 1) as f64;
        let average_interval = self.interval_sum as f64 / intervals;
        let samples_per_minute = self.fs.s_to_samples(60) as f64;

        let heart_rate = (samples_per_minute / average_interval).min(MAX_HEART_RATE);

        let average_peak = self.peak_sum / PEAKS_PER_ESTIMATE as i64;
        self.thresholds.new = seventy_percent(average_peak);

        debug!(
            "Heart rate {} bpm, threshold {}",
            heart_rate, self.thresholds.new
        );

        self.restart_detection();

        heart_rate
    }

    /// Forgets the current beat sequence but keeps the learned threshold.
    fn restart_detection(&mut self) {
        self.stage = Stage::Armed;
        self.beat_started = false;
        self.sample_count = 0;
        self.no_peak_count = 0;
        self.peak_sum = 0;
        self.peak_timestamps.clear();
        self.interval_sum = 0;
    }

    /// Returns to the uncalibrated state. The previous sample is kept so the next derivative
    /// stays meaningful.
    fn reset(&mut self) {
        self.restart_detection();
        self.calibrated = false;
        self.thresholds = Thresholds::default();
        self.max_derivative = 0;
        self.window_samples = 0;
    }
}

fn seventy_percent(value: i64) -> i32 {
    (value * 7 / 10).clamp(0, i64::from(i32::MAX)) as i32
}
