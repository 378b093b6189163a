//! Numeric reductions over segment columns.
//!
//! Every function skips missing values (NaN) the way a column aggregate over a
//! partially recorded table should.

fn present(data: &[f64]) -> impl Iterator<Item = f64> + '_ {
    data.iter().copied().filter(|value| !value.is_nan())
}

pub fn count(data: &[f64]) -> usize {
    present(data).count()
}

/// Sum of the recorded values; an empty or all-missing column sums to zero.
pub fn sum(data: &[f64]) -> f64 {
    present(data).sum::<f64>()
}

pub fn mean(data: &[f64]) -> Option<f64> {
    let sum = sum(data);
    let count = count(data);

    match count {
        positive if positive > 0 => Some(sum / count as f64),
        _ => None,
    }
}

/// Sample standard deviation (one degree of freedom removed).
pub fn std_dev(data: &[f64]) -> Option<f64> {
    match (mean(data), count(data)) {
        (Some(data_mean), count) if count > 1 => {
            let variance = present(data)
                .map(|value| {
                    let diff = data_mean - value;

                    diff * diff
                })
                .sum::<f64>()
                / (count - 1) as f64;

            Some(variance.sqrt())
        }
        _ => None,
    }
}

pub fn median(data: &[f64]) -> Option<f64> {
    let mut values: Vec<f64> = present(data).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);

    let middle = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[middle - 1] + values[middle]) / 2.0)
    } else {
        Some(values[middle])
    }
}

pub fn min(data: &[f64]) -> Option<f64> {
    present(data).reduce(f64::min)
}

pub fn max(data: &[f64]) -> Option<f64> {
    present(data).reduce(f64::max)
}
