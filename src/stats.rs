//! Small descriptive statistics used by the chart builders.

/// Arithmetic mean; `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n − 1 denominator); `None` below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Standard error of the mean; undefined for a single value.
pub fn standard_error(values: &[f64]) -> Option<f64> {
    sample_std(values).map(|sd| sd / (values.len() as f64).sqrt())
}

/// Two-sided 95% Student t critical value for `df` degrees of freedom.
pub fn t_critical_95(df: usize) -> f64 {
    const TABLE: [f64; 30] = [
        12.706, 4.303, 3.182, 2.776, 2.571, 2.447, 2.365, 2.306, 2.262, 2.228, 2.201, 2.179,
        2.160, 2.145, 2.131, 2.120, 2.110, 2.101, 2.093, 2.086, 2.080, 2.074, 2.069, 2.064,
        2.060, 2.056, 2.052, 2.048, 2.045, 2.042,
    ];
    match df {
        0 => f64::INFINITY,
        1..=30 => TABLE[df - 1],
        31..=40 => 2.021,
        41..=60 => 2.000,
        61..=120 => 1.980,
        _ => 1.960,
    }
}

/// Ordinary least squares fit `y = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub n: usize,
    x_mean: f64,
    sxx: f64,
    /// Residual standard error, sqrt(SSE / (n − 2)).
    residual_se: f64,
}

impl LinearFit {
    /// Fit a line through `points`. Needs at least three points and two
    /// distinct x values so that a confidence band exists.
    pub fn fit(points: &[(f64, f64)]) -> Option<Self> {
        let n = points.len();
        if n < 3 {
            return None;
        }
        let nf = n as f64;
        let x_mean = points.iter().map(|p| p.0).sum::<f64>() / nf;
        let y_mean = points.iter().map(|p| p.1).sum::<f64>() / nf;
        let sxx: f64 = points.iter().map(|p| (p.0 - x_mean).powi(2)).sum();
        if sxx <= f64::EPSILON {
            return None;
        }
        let sxy: f64 = points
            .iter()
            .map(|p| (p.0 - x_mean) * (p.1 - y_mean))
            .sum();
        let slope = sxy / sxx;
        let intercept = y_mean - slope * x_mean;
        let sse: f64 = points
            .iter()
            .map(|p| (p.1 - (intercept + slope * p.0)).powi(2))
            .sum();
        Some(Self {
            slope,
            intercept,
            n,
            x_mean,
            sxx,
            residual_se: (sse / (nf - 2.0)).sqrt(),
        })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    /// 95% confidence interval of the fitted mean at `x`.
    pub fn confidence_interval(&self, x: f64) -> (f64, f64) {
        let se = self.residual_se
            * (1.0 / self.n as f64 + (x - self.x_mean).powi(2) / self.sxx).sqrt();
        let half = t_critical_95(self.n - 2) * se;
        let y = self.predict(x);
        (y - half, y + half)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn standard_error_matches_hand_computation() {
        // mean 4, sample var = (4+0+4)/2 = 4, sd 2, se = 2/sqrt(3)
        let values = [2.0, 4.0, 6.0];
        assert_eq!(mean(&values), Some(4.0));
        assert!(close(sample_std(&values).unwrap(), 2.0));
        assert!(close(standard_error(&values).unwrap(), 2.0 / 3f64.sqrt()));
    }

    #[test]
    fn single_value_has_no_standard_error() {
        assert_eq!(standard_error(&[7.0]), None);
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn perfect_line_has_zero_width_band() {
        let pts = [(2019.0, 10.0), (2020.0, 12.0), (2021.0, 14.0)];
        let fit = LinearFit::fit(&pts).unwrap();
        assert!(close(fit.slope, 2.0));
        assert!(close(fit.predict(2022.0), 16.0));
        let (lo, hi) = fit.confidence_interval(2020.0);
        assert!(close(lo, 12.0) && close(hi, 12.0));
    }

    #[test]
    fn band_widens_away_from_the_mean() {
        let pts = [(0.0, 1.0), (1.0, 2.5), (2.0, 2.0), (3.0, 4.0), (4.0, 3.5)];
        let fit = LinearFit::fit(&pts).unwrap();
        let (lo_c, hi_c) = fit.confidence_interval(2.0);
        let (lo_e, hi_e) = fit.confidence_interval(6.0);
        assert!(hi_e - lo_e > hi_c - lo_c);
    }

    #[test]
    fn degenerate_inputs_do_not_fit() {
        assert!(LinearFit::fit(&[(1.0, 1.0), (2.0, 2.0)]).is_none());
        assert!(LinearFit::fit(&[(1.0, 1.0), (1.0, 2.0), (1.0, 3.0)]).is_none());
    }

    #[test]
    fn t_table_lookup() {
        assert!(close(t_critical_95(1), 12.706));
        assert!(close(t_critical_95(500), 1.960));
    }
}
