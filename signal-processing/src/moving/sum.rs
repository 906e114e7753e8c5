use crate::buffer::FixedRingBuffer;

/// Exact running sum over the last `N` samples.
///
/// The window starts out filled with zeros, so the sum is defined from the first sample on.
#[derive(Clone)]
pub struct Sum<const N: usize> {
    window: FixedRingBuffer<i32, N>,
    current: i64,
}

impl<const N: usize> Default for Sum<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Sum<N> {
    pub fn new() -> Self {
        Self {
            window: FixedRingBuffer::from_initial([0; N]),
            current: 0,
        }
    }

    #[inline(always)]
    pub const fn window_size(&self) -> usize {
        N
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn update(&mut self, sample: i32) -> i64 {
        self.current += i64::from(sample);
        if let Some(old) = self.window.push(sample) {
            self.current -= i64::from(old);
        }
        self.current
    }
}
