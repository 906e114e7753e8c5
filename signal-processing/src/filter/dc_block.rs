use super::Filter;

/// First order high-pass used to strip the baseline from raw ECG samples.
///
/// `y[n] = x[n] - x[n-1] + 3 * y[n-1]`, output scaled down by 4. The feedback coefficient is fixed
/// by the sensor front end. With a gain above one the state runs away on real signals, so every
/// step saturates instead of overflowing.
#[derive(Clone, Default)]
pub struct DcBlocker {
    prev_sample: i32,
    prev_output: i32,
}

impl DcBlocker {
    const FEEDBACK: i32 = 3;
    const OUTPUT_DIVIDER: i32 = 4;

    pub const fn new() -> Self {
        Self {
            prev_sample: 0,
            prev_output: 0,
        }
    }
}

impl Filter for DcBlocker {
    fn update(&mut self, sample: i32) -> i32 {
        let output = sample
            .saturating_sub(self.prev_sample)
            .saturating_add(self.prev_output.saturating_mul(Self::FEEDBACK));

        self.prev_sample = sample;
        self.prev_output = output;

        output / Self::OUTPUT_DIVIDER
    }

    fn clear(&mut self) {
        *self = Self::new();
    }
}
