//! ECG front-end conditioning.

use crate::{
    filter::{
        dc_block::DcBlocker,
        fir::{precomputed::LOW_PASS_40HZ, Fir},
        Filter,
    },
    moving::average::MovingAverage,
};

pub const FILTER_ORDER: usize = 161;
pub const SMOOTHING_WINDOW: usize = 32;

/// Baseline removal and low-pass filtering of raw ECG samples, plus the smoothed signal the QRS
/// detector works on.
///
/// The smoothed signal is a moving average of the raw input, not of the filtered output.
pub struct EcgPreprocessor {
    filter: (DcBlocker, Fir<'static, FILTER_ORDER>),
    smoothing: MovingAverage<SMOOTHING_WINDOW>,
    smoothed: i32,
}

impl Default for EcgPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl EcgPreprocessor {
    pub fn new() -> Self {
        Self {
            filter: (DcBlocker::new(), Fir::from_coeffs(&LOW_PASS_40HZ)),
            smoothing: MovingAverage::new(),
            smoothed: 0,
        }
    }

    pub fn clear(&mut self) {
        self.filter.clear();
        self.smoothing.clear();
        self.smoothed = 0;
    }

    /// Processes a raw sample and returns the filtered amplitude.
    pub fn process(&mut self, raw: i32) -> i16 {
        self.smoothed = self.smoothing.update(raw);

        // The FIR stage output is already within the Q15 range.
        self.filter.update(raw) as i16
    }

    /// Moving average of the most recent raw samples.
    #[inline]
    pub fn smoothed(&self) -> i32 {
        self.smoothed
    }
}
