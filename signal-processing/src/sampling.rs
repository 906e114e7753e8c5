//! Sampling frequency helpers.

/// Sampling frequency in whole samples per second.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SamplingFrequency(u32);

impl SamplingFrequency {
    /// Number of samples spanning `ms` milliseconds, rounded down.
    pub const fn ms_to_samples(self, ms: u32) -> u32 {
        ((ms as u64 * self.0 as u64) / 1000) as u32
    }

    pub const fn s_to_samples(self, s: u32) -> u32 {
        s * self.0
    }
}

pub trait SamplingFrequencyExt {
    fn sps(self) -> SamplingFrequency;
}

impl SamplingFrequencyExt for u32 {
    fn sps(self) -> SamplingFrequency {
        assert!(self > 0, "Sampling frequency must not be zero");
        SamplingFrequency(self)
    }
}
