use std::f64::consts::PI;

use crate::analysis::Measurement;

/// Number of grid points the density is evaluated on
pub const GRID_POINTS: usize = 500;

/// Gaussian kernel bandwidth for each value
///
/// Values carry their own error as bandwidth. Without usable errors every value
/// gets Silverman's rule-of-thumb bandwidth; `None` when that is zero too.
fn bandwidths(values: &[Measurement]) -> Option<Vec<f64>> {
    if values.iter().all(Measurement::has_usable_error) {
        return Some(values.iter().map(|m| m.error).collect());
    }

    let n = values.len() as f64;
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().map(|m| m.value).sum::<f64>() / n;
    let sd = (values.iter().map(|m| (m.value - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt();
    let h = 1.06 * sd * n.powf(-0.2);
    if h.is_finite() && h > 0.0 {
        Some(vec![h; values.len()])
    } else {
        None
    }
}

/// Summed Gaussian density of `values` at `x`
pub fn density_at(values: &[Measurement], widths: &[f64], x: f64) -> f64 {
    values
        .iter()
        .zip(widths)
        .map(|(m, h)| {
            let z = (x - m.value) / h;
            (-0.5 * z * z).exp() / (h * (2.0 * PI).sqrt())
        })
        .sum()
}

/// Location of the kernel density maximum
///
/// Evaluated on an even grid spanning the values ±3 bandwidths. Returns `None`
/// for empty input or when no bandwidth can be derived.
pub fn kde_mode(values: &[Measurement]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let widths = bandwidths(values)?;

    let h_max = widths.iter().cloned().fold(0.0, f64::max);
    let lo = values.iter().map(|m| m.value).fold(f64::INFINITY, f64::min) - 3.0 * h_max;
    let hi = values.iter().map(|m| m.value).fold(f64::NEG_INFINITY, f64::max) + 3.0 * h_max;
    let step = (hi - lo) / (GRID_POINTS - 1) as f64;

    let mut best = (lo, f64::NEG_INFINITY);
    for i in 0..GRID_POINTS {
        let x = lo + step * i as f64;
        let d = density_at(values, &widths, x);
        if d > best.1 {
            best = (x, d);
        }
    }
    Some(best.0)
}
