//! Ratio-of-ratios SpO2 estimation over fixed IR and RED windows.

use heapless::Vec;

/// Sample rate the valley interval is interpreted at when converting it to beats per minute.
pub const VALLEY_RATE_HZ: f64 = 25.0;

const SMOOTHING: usize = 4;
const MIN_VALLEY_THRESHOLD: f64 = 30.0;
const MAX_VALLEY_THRESHOLD: f64 = 60.0;

/// SpO2 percentage indexed by the integer R value.
#[rustfmt::skip]
pub const SPO2_TABLE: [u8; 183] = [
    95, 95, 95, 96, 96, 96, 97, 97, 97, 97, 97, 98, 98, 98, 98,
    98, 99, 99, 99, 99, 99, 99, 99, 99, 100, 100, 100, 100, 100, 100,
    100, 100, 100, 100, 100, 100, 100, 100, 100, 100, 100, 100, 100, 100, 99,
    99, 99, 99, 99, 99, 99, 99, 98, 98, 98, 98, 98, 98, 97, 97,
    97, 97, 96, 96, 96, 96, 95, 95, 95, 94, 94, 94, 93, 93, 93,
    92, 92, 92, 91, 91, 90, 90, 89, 89, 89, 88, 88, 87, 87, 86,
    86, 85, 85, 84, 84, 83, 82, 82, 81, 81, 80, 80, 79, 78, 78,
    77, 76, 76, 75, 74, 74, 73, 72, 72, 71, 70, 69, 69, 68, 67,
    66, 66, 65, 64, 63, 62, 62, 61, 60, 59, 58, 57, 56, 56, 55,
    54, 53, 52, 51, 50, 49, 48, 47, 46, 45, 44, 43, 42, 41, 40,
    39, 38, 37, 36, 35, 34, 33, 31, 30, 29, 28, 27, 26, 25, 23,
    22, 21, 20, 19, 17, 16, 15, 14, 12, 11, 10, 9, 7, 6, 5,
    3, 2, 1,
];

/// Looks up the saturation for an R value. Values at or below 2 and past the end of the table
/// are not plausible.
pub fn lookup(r: i32) -> Option<u8> {
    if r > 2 {
        SPO2_TABLE.get(r as usize).copied()
    } else {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spo2Estimate {
    /// `None` when no usable R value was found.
    pub spo2: Option<u8>,
    /// Heart rate derived from the spacing of IR valleys.
    pub heart_rate: f64,
}

/// Estimates SpO2 and heart rate from full IR and RED windows.
///
/// Returns `None` if fewer than two valleys are found in the IR signal.
pub fn estimate<const N: usize>(ir: &[f64; N], red: &[f64; N]) -> Option<Spo2Estimate> {
    if N == 0 {
        return None;
    }

    let signal = remove_dc(ir);
    let valleys = find_valleys(&signal);

    if valleys.len() < 2 {
        trace!("Not enough IR valleys: {}", valleys.len());
        return None;
    }
    let (&first, &last) = (valleys.first()?, valleys.last()?);

    // Consecutive gaps sum up to the distance between the outermost valleys.
    let heart_rate = 60.0 * VALLEY_RATE_HZ / (last - first) as f64;

    let mut ratios = valleys
        .windows(2)
        .filter_map(|pair| ratio(&ir[pair[0]..pair[1]], &red[pair[0]..pair[1]]))
        .collect::<Vec<f64, N>>();

    let spo2 = if ratios.is_empty() {
        None
    } else {
        ratios.sort_unstable_by(f64::total_cmp);
        let r = ratios[ratios.len() / 2] as i32;
        trace!("SpO2 R value: {}", r);
        lookup(r)
    };

    Some(Spo2Estimate { spo2, heart_rate })
}

/// Inverted, mean-removed IR signal with a 4 point forward moving average. The last four samples
/// are left unsmoothed.
fn remove_dc<const N: usize>(ir: &[f64; N]) -> [f64; N] {
    let mean = ir.iter().sum::<f64>() / N as f64;

    let mut x = ir.map(|sample| mean - sample);
    for i in 0..N.saturating_sub(SMOOTHING) {
        x[i] = x[i..i + SMOOTHING].iter().sum::<f64>() / SMOOTHING as f64;
    }

    x
}

fn find_valleys<const N: usize>(x: &[f64; N]) -> Vec<usize, N> {
    let mean_abs = x.iter().map(|v| abs(*v)).sum::<f64>() / N as f64;
    let threshold = mean_abs.clamp(MIN_VALLEY_THRESHOLD, MAX_VALLEY_THRESHOLD);

    let mut valleys = Vec::new();
    for i in 1..N.saturating_sub(1) {
        if x[i] < -threshold && x[i] < x[i - 1] && x[i] < x[i + 1] {
            // At most N - 2 indices qualify.
            _ = valleys.push(i);
        }
    }

    valleys
}

/// Ratio of the RED and IR AC/DC ratios over one beat, scaled by 100.
fn ratio(ir: &[f64], red: &[f64]) -> Option<f64> {
    let (ir_dc, ir_ac) = dc_and_ac(ir);
    let (red_dc, red_ac) = dc_and_ac(red);

    let denominator = ir_ac * red_dc;
    (denominator > 0.0).then(|| 100.0 * red_ac * ir_dc / denominator)
}

fn dc_and_ac(samples: &[f64]) -> (f64, f64) {
    let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;

    (max, max - mean)
}

fn abs(value: f64) -> f64 {
    if value < 0.0 {
        -value
    } else {
        value
    }
}
