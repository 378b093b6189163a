//! Conversions between standalone (per segment) and cumulative (since start)
//! time vectors.

/// Running sum of standalone times.
///
/// A missing segment makes its own cumulative entry and every later one
/// missing, since the elapsed time past that point is unknown.
pub fn cumulative_from_standalone(standalone: &[f64]) -> Vec<f64> {
    standalone
        .iter()
        .scan(0.0, |total, &segment| {
            *total += segment;
            Some(*total)
        })
        .collect()
}

/// First difference of cumulative times with 0 prepended.
pub fn standalone_from_cumulative(cumulative: &[f64]) -> Vec<f64> {
    std::iter::once(0.0)
        .chain(cumulative.iter().copied())
        .zip(cumulative.iter().copied())
        .map(|(previous, current)| current - previous)
        .collect()
}

/// Pads a partial vector with missing values up to `len` entries.
pub fn pad_missing(mut times: Vec<f64>, len: usize) -> Vec<f64> {
    times.resize(len.max(times.len()), f64::NAN);
    times
}
