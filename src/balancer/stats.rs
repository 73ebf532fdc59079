//! Summary statistics over per-host utilization samples.

use crate::error::DrsError;

/// Arithmetic mean. Empty input is an error, never NaN.
pub(crate) fn mean(samples: &[f64]) -> Result<f64, DrsError> {
    if samples.is_empty() {
        return Err(DrsError::InvalidInput("cannot take the mean of zero samples".into()));
    }
    Ok(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Population standard deviation (divisor N).
///
/// `mean_override` lets callers reuse a mean they already computed.
pub(crate) fn population_std_dev(
    samples: &[f64],
    mean_override: Option<f64>,
) -> Result<f64, DrsError> {
    if samples.is_empty() {
        return Err(DrsError::InvalidInput(
            "cannot take the standard deviation of zero samples".into(),
        ));
    }
    // Identical samples have no spread; skip the rounding noise of the sum.
    #[allow(clippy::float_cmp)]
    if samples.windows(2).all(|w| w[0] == w[1]) {
        return Ok(0.0);
    }
    let mu = match mean_override {
        Some(m) => m,
        None => mean(samples)?,
    };
    let variance =
        samples.iter().map(|s| (s - mu) * (s - mu)).sum::<f64>() / samples.len() as f64;
    Ok(variance.max(0.0).sqrt())
}

/// Coefficient of variation: standard deviation over mean.
pub(crate) fn imbalance(samples: &[f64]) -> Result<f64, DrsError> {
    let mu = mean(samples)?;
    if mu == 0.0 {
        return Err(DrsError::DivisionByZero(
            "mean utilization is zero, imbalance is undefined".into(),
        ));
    }
    Ok(population_std_dev(samples, Some(mu))? / mu)
}
