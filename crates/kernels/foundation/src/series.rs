//! Comparison of time series.

/// Bit-for-bit equality with NaN equal to NaN.
///
/// Two runs of the same network are expected to agree exactly, including
/// where a series is missing data.
pub fn same_values(left: &[f64], right: &[f64]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right)
            .all(|(l, r)| l.to_bits() == r.to_bits() || (l.is_nan() && r.is_nan()))
}
