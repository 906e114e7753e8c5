use super::Filter;
use crate::buffer::FixedRingBuffer;

pub mod precomputed {
    /// 40 Hz low-pass for 125 Hz ECG, Q15 coefficients.
    #[rustfmt::skip]
    pub const LOW_PASS_40HZ: [i16; 161] = [
        -72, 122, -31, -99, 117, 0, -121, 105, 34,
        -137, 84, 70, -146, 55, 104, -147, 20, 135,
        -137, -21, 160, -117, -64, 177, -87, -108, 185,
        -48, -151, 181, 0, -188, 164, 54, -218, 134,
        112, -238, 90, 171, -244, 33, 229, -235, -36,
        280, -208, -115, 322, -161, -203, 350, -92, -296,
        361, 0, -391, 348, 117, -486, 305, 264, -577,
        225, 445, -660, 93, 676, -733, -119, 991, -793,
        -480, 1486, -837, -1226, 2561, -865, -4018, 9438, 20972,
        9438, -4018, -865, 2561, -1226, -837, 1486, -480, -793,
        991, -119, -733, 676, 93, -660, 445, 225, -577,
        264, 305, -486, 117, 348, -391, 0, 361, -296,
        -92, 350, -203, -161, 322, -115, -208, 280, -36,
        -235, 229, 33, -244, 171, 90, -238, 112, 134,
        -218, 54, 164, -188, 0, 181, -151, -48, 185,
        -108, -87, 177, -64, -117, 160, -21, -137, 135,
        20, -147, 104, 55, -146, 70, 84, -137, 34,
        105, -121, 0, 117, -99, -31, 122, -72,
    ];
}

/// Fixed point FIR filter with Q15 coefficients.
///
/// The accumulator is saturated to the Q30 range before it is scaled back to Q15, so the output
/// always fits into an `i16`. The tap line starts out filled with zeros.
pub struct Fir<'a, const N: usize> {
    coeffs: &'a [i16; N],
    taps: FixedRingBuffer<i32, N>,
}

impl<'a, const N: usize> Fir<'a, N> {
    const ACC_MAX: i64 = 0x3fff_ffff;
    const ACC_MIN: i64 = -0x4000_0000;
    const Q_SHIFT: u32 = 15;

    pub fn from_coeffs(coeffs: &'a [i16; N]) -> Self {
        Self {
            coeffs,
            taps: FixedRingBuffer::from_initial([0; N]),
        }
    }

    fn accumulate(&self) -> i64 {
        self.taps
            .iter()
            .zip(self.coeffs.iter())
            .map(|(sample, coeff)| i64::from(sample) * i64::from(*coeff))
            .sum()
    }
}

impl<const N: usize> Filter for Fir<'_, N> {
    fn update(&mut self, sample: i32) -> i32 {
        self.taps.push(sample);

        let acc = self.accumulate().clamp(Self::ACC_MIN, Self::ACC_MAX);

        (acc >> Self::Q_SHIFT) as i32
    }

    fn clear(&mut self) {
        self.taps = FixedRingBuffer::from_initial([0; N]);
    }
}
