// Statistical helpers for drift detection
//
// Two-sample Kolmogorov-Smirnov test with the asymptotic Kolmogorov
// distribution (Stephens' small-sample correction), plus the descriptive
// statistics shown in the summary report.

use serde::Serialize;

use crate::errors::{MonitorError, MonitorResult};

/// Outcome of a two-sample K-S test
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct KsResult {
    /// Largest distance between the two empirical CDFs
    pub statistic: f64,
    pub p_value: f64,
}

/// Two-sample Kolmogorov-Smirnov test
pub fn ks_two_sample(reference: &[f64], current: &[f64]) -> MonitorResult<KsResult> {
    if reference.is_empty() || current.is_empty() {
        return Err(MonitorError::DriftComputation(
            "K-S test needs at least one value in each sample".to_string(),
        ));
    }
    if reference.iter().chain(current).any(|v| !v.is_finite()) {
        return Err(MonitorError::DriftComputation(
            "K-S test received a non-finite value".to_string(),
        ));
    }

    let a = sorted(reference);
    let b = sorted(current);
    let (n, m) = (a.len(), b.len());

    let mut i = 0;
    let mut j = 0;
    let mut statistic: f64 = 0.0;
    while i < n && j < m {
        let x = a[i].min(b[j]);
        // Step past every copy of x in both samples so ties move together
        while i < n && a[i] <= x {
            i += 1;
        }
        while j < m && b[j] <= x {
            j += 1;
        }
        let gap = (i as f64 / n as f64 - j as f64 / m as f64).abs();
        statistic = statistic.max(gap);
    }

    let en = ((n * m) as f64 / (n + m) as f64).sqrt();
    let lambda = (en + 0.12 + 0.11 / en) * statistic;

    Ok(KsResult {
        statistic,
        p_value: kolmogorov_q(lambda),
    })
}

/// Complementary Kolmogorov distribution Q(λ) = 2 Σ (-1)^(j-1) exp(-2 j² λ²)
fn kolmogorov_q(lambda: f64) -> f64 {
    const EPS_TERM: f64 = 1e-3;
    const EPS_SUM: f64 = 1e-8;

    let a2 = -2.0 * lambda * lambda;
    let mut sign = 2.0;
    let mut sum = 0.0;
    let mut previous = 0.0;

    for j in 1..=100 {
        let jf = j as f64;
        let term = sign * (a2 * jf * jf).exp();
        sum += term;
        if term.abs() <= EPS_TERM * previous || term.abs() <= EPS_SUM * sum {
            return sum.clamp(0.0, 1.0);
        }
        sign = -sign;
        previous = term.abs();
    }
    // Series does not converge for λ near zero, where Q -> 1
    1.0
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(|x, y| x.total_cmp(y));
    v
}

/// Descriptive statistics for one numeric column
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnStats {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub max: f64,
}

impl ColumnStats {
    /// None for an empty column
    pub fn describe(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let v = sorted(values);
        let n = v.len();
        let mean = v.iter().sum::<f64>() / n as f64;
        // Sample standard deviation, 0 for a single value
        let std = if n > 1 {
            (v.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt()
        } else {
            0.0
        };

        Some(Self {
            count: n,
            mean,
            std,
            min: v[0],
            p25: quantile(&v, 0.25),
            median: quantile(&v, 0.5),
            p75: quantile(&v, 0.75),
            max: v[n - 1],
        })
    }
}

/// Linear-interpolated quantile of sorted, non-empty data
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
