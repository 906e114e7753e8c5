//! Fixed capacity circular buffer.
//!
//! Pushing into a full buffer evicts the oldest element. Iteration always runs from the oldest to
//! the newest element.

use core::mem::MaybeUninit;

#[derive(Clone)]
pub struct FixedRingBuffer<T: Copy, const N: usize> {
    idx: usize,
    full: bool,
    buffer: [MaybeUninit<T>; N],
}

impl<T: Copy, const N: usize> Default for FixedRingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy, const N: usize> FixedRingBuffer<T, N> {
    pub const fn new() -> Self {
        Self {
            idx: 0,
            full: false,
            buffer: [MaybeUninit::uninit(); N],
        }
    }

    /// Creates a full buffer. `initial[0]` is the oldest element.
    pub fn from_initial(initial: [T; N]) -> Self {
        Self {
            idx: 0,
            full: true,
            buffer: initial.map(MaybeUninit::new),
        }
    }

    pub fn clear(&mut self) {
        self.idx = 0;
        self.full = false;
    }

    pub fn len(&self) -> usize {
        if self.full {
            N
        } else {
            self.idx
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Appends `sample`, returning the evicted element if the buffer was full.
    pub fn push(&mut self, sample: T) -> Option<T> {
        let old = self
            .full
            .then(|| unsafe { self.buffer[self.idx].assume_init() });

        self.buffer[self.idx] = MaybeUninit::new(sample);
        self.idx = (self.idx + 1) % N;
        if self.idx == 0 {
            self.full = true;
        }

        old
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = T> + ExactSizeIterator + Clone + '_ {
        // Until the buffer wraps, the oldest element lives at index 0.
        let start = if self.full { self.idx } else { 0 };

        (0..self.len()).map(move |i| unsafe { self.buffer[(start + i) % N].assume_init() })
    }

    /// Copies the contents into an array, oldest first. Returns `None` until the buffer is full.
    pub fn to_array(&self) -> Option<[T; N]> {
        if !self.full {
            return None;
        }

        Some(core::array::from_fn(|i| unsafe {
            self.buffer[(self.idx + i) % N].assume_init()
        }))
    }
}
