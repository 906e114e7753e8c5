use crate::moving::sum::Sum;

/// Integer moving average over the last `N` samples, truncated towards zero.
#[derive(Default, Clone)]
pub struct MovingAverage<const N: usize> {
    sum: Sum<N>,
}

impl<const N: usize> MovingAverage<N> {
    pub fn new() -> Self {
        Self { sum: Sum::new() }
    }

    pub fn clear(&mut self) {
        self.sum.clear();
    }

    pub fn update(&mut self, sample: i32) -> i32 {
        let window_size = self.sum.window_size() as i64;
        (self.sum.update(sample) / window_size) as i32
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn average_ramps_up_from_zero() {
        let mut average = MovingAverage::<4>::new();

        #[rustfmt::skip]
        let table = [
            (100, 25),
            (100, 50),
            (100, 75),
            (100, 100),
            (100, 100),
            (0, 75),
        ];

        for (sample, expected) in table {
            assert_eq!(average.update(sample), expected);
        }
    }

    #[test]
    fn negative_averages_truncate_towards_zero() {
        let mut average = MovingAverage::<4>::new();
        assert_eq!(average.update(-3), 0);
        assert_eq!(average.update(-3), -1);
    }

    #[test]
    fn clone_continues_from_the_same_window() {
        let mut average = MovingAverage::<4>::new();
        for _ in 0..4 {
            average.update(100);
        }

        let mut copy = average.clone();
        average.update(0);

        assert_eq!(copy.update(100), 100);
        assert_eq!(average.update(0), 50);
    }
}
