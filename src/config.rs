use core::{num::NonZeroU32, ops::RangeInclusive};

use clap::ValueEnum;
use signal_processing::heart_rate::Timing;

/// Resolution of the sensor front end's ECG ADC.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AdcResolution {
    #[default]
    #[value(name = "18")]
    Bits18,
    #[value(name = "19")]
    Bits19,
}

impl AdcResolution {
    const REFERENCE_VOLTS: f64 = 1.8;

    pub const fn bits(self) -> u32 {
        match self {
            AdcResolution::Bits18 => 18,
            AdcResolution::Bits19 => 19,
        }
    }

    pub fn to_millivolts(self, raw: u16) -> f64 {
        let full_scale = ((1u32 << self.bits()) - 1) as f64;
        f64::from(raw) / full_scale * Self::REFERENCE_VOLTS * 1000.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub resolution: AdcResolution,
    pub sampling_rate: NonZeroU32,
    /// Heart rates outside of this band are not reported.
    pub heart_rate_band: RangeInclusive<f64>,
    /// SpO2 is estimated on every Nth sample once the windows are full.
    pub spo2_interval: NonZeroU32,
    pub silence_timeout_ms: u32,
}

impl Config {
    pub const SAMPLING_RATE: NonZeroU32 = match NonZeroU32::new(125) {
        Some(rate) => rate,
        None => panic!(),
    };

    pub fn qrs_timing(&self) -> Timing {
        Timing {
            silence_timeout_ms: self.silence_timeout_ms,
            ..Timing::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resolution: AdcResolution::Bits18,
            sampling_rate: Self::SAMPLING_RATE,
            heart_rate_band: 60.0..=140.0,
            spo2_interval: NonZeroU32::MIN,
            silence_timeout_ms: 3000,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn millivolt_conversion() {
        #[rustfmt::skip]
        let table = [
            (AdcResolution::Bits18, 0, 0.0),
            (AdcResolution::Bits18, 100, 100.0 / 262_143.0 * 1800.0),
            (AdcResolution::Bits18, u16::MAX, 65_535.0 / 262_143.0 * 1800.0),
            (AdcResolution::Bits19, 100, 100.0 / 524_287.0 * 1800.0),
        ];

        for (resolution, raw, expected) in table {
            let mv = resolution.to_millivolts(raw);
            assert!(
                (mv - expected).abs() < 1e-9,
                "{resolution:?} {raw}: expected {expected}, got {mv}"
            );
        }
    }

    #[test]
    fn resolution_parses_from_bit_count() {
        assert_eq!(
            AdcResolution::from_str("19", false),
            Ok(AdcResolution::Bits19)
        );
        assert!(AdcResolution::from_str("16", false).is_err());
    }

    #[test]
    fn silence_timeout_reaches_qrs_timing() {
        let config = Config {
            silence_timeout_ms: 5000,
            ..Config::default()
        };

        let timing = config.qrs_timing();

        assert_eq!(timing.silence_timeout_ms, 5000);
        assert_eq!(timing.calibration_ms, Timing::default().calibration_ms);
    }
}
