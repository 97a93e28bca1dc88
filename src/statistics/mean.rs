use crate::analysis::Measurement;

/// First and second moments of a set of measurements
#[derive(Debug, Clone, PartialEq)]
pub struct Moments {
    pub mean: f64,
    /// Standard deviation of the values about `mean`
    pub sd: f64,
    /// Standard error of `mean`
    pub sem: f64,
    /// Mean square weighted deviation; `None` when the errors are unusable
    pub mswd: Option<f64>,
    pub n: usize,
    /// Inverse-variance weights were applied
    pub weighted: bool,
}

impl Moments {
    /// SEM inflated by √MSWD when the scatter exceeds the stated errors
    pub fn msem(&self) -> f64 {
        let factor = self.mswd.map(f64::sqrt).unwrap_or(1.0).max(1.0);
        self.sem * factor
    }
}

/// Inverse-variance weighted mean
///
/// Falls back to [`unweighted_moments`] when any error is missing, zero or
/// non-finite.
pub fn weighted_moments(values: &[Measurement]) -> Option<Moments> {
    if values.is_empty() {
        return None;
    }
    if !values.iter().all(Measurement::has_usable_error) {
        tracing::debug!(
            "weighted mean of {} values has unusable errors; using unweighted mean",
            values.len()
        );
        return unweighted_moments(values);
    }

    let weights: Vec<f64> = values.iter().map(|m| 1.0 / (m.error * m.error)).collect();
    let sum_w: f64 = weights.iter().sum();
    let mean = values
        .iter()
        .zip(&weights)
        .map(|(m, w)| m.value * w)
        .sum::<f64>()
        / sum_w;

    let weighted_ss: f64 = values
        .iter()
        .zip(&weights)
        .map(|(m, w)| w * (m.value - mean).powi(2))
        .sum();

    let n = values.len();
    Some(Moments {
        mean,
        sd: (weighted_ss / sum_w).sqrt(),
        sem: (1.0 / sum_w).sqrt(),
        mswd: Some(if n > 1 {
            weighted_ss / (n - 1) as f64
        } else {
            0.0
        }),
        n,
        weighted: true,
    })
}

/// Arithmetic mean with sample standard deviation
pub fn unweighted_moments(values: &[Measurement]) -> Option<Moments> {
    if values.is_empty() {
        return None;
    }

    let n = values.len();
    let mean = values.iter().map(|m| m.value).sum::<f64>() / n as f64;
    let sd = if n > 1 {
        let ss: f64 = values.iter().map(|m| (m.value - mean).powi(2)).sum();
        (ss / (n - 1) as f64).sqrt()
    } else {
        0.0
    };

    Some(Moments {
        mean,
        sd,
        sem: sd / (n as f64).sqrt(),
        mswd: mswd(values, mean),
        n,
        weighted: false,
    })
}

/// MSWD of `values` about `mean`; needs two or more values with usable errors
pub fn mswd(values: &[Measurement], mean: f64) -> Option<f64> {
    if values.len() < 2 || !values.iter().all(Measurement::has_usable_error) {
        return None;
    }
    let chi2: f64 = values
        .iter()
        .map(|m| ((m.value - mean) / m.error).powi(2))
        .sum();
    Some(chi2 / (values.len() - 1) as f64)
}
