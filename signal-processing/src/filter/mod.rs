pub mod dc_block;
pub mod fir;

/// A streaming integer filter.
pub trait Filter {
    fn update(&mut self, sample: i32) -> i32;
    fn clear(&mut self);
}

/// Filters in series: the output of the first stage feeds the second.
impl<A, B> Filter for (A, B)
where
    A: Filter,
    B: Filter,
{
    fn update(&mut self, sample: i32) -> i32 {
        let sample = self.0.update(sample);
        self.1.update(sample)
    }

    fn clear(&mut self) {
        self.0.clear();
        self.1.clear();
    }
}
