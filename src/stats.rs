use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

pub fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Summary statistics over a job's retained durations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
}

impl JobStats {
    /// Computes statistics from scratch. All zeros for an empty slice.
    pub fn from_durations(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| cmp_f64(*a, *b));

        Self {
            count: values.len(),
            mean: mean(values),
            median: median_sorted(&sorted),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            std: sample_std(values),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator). Zero when n < 2.
#[allow(clippy::cast_precision_loss)]
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

fn median_sorted(sorted: &[f64]) -> f64 {
    let len = sorted.len();
    if len == 0 {
        return 0.0;
    }
    if len % 2 == 1 {
        sorted[len / 2]
    } else {
        (sorted[len / 2 - 1] + sorted[len / 2]) / 2.0
    }
}

/// Standard normal CDF.
///
/// Uses the Abramowitz-Stegun 7.1.26 rational approximation of erf
/// (max absolute error 1.5e-7).
pub fn normal_cdf(x: f64) -> f64 {
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.327_591_1;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs() / std::f64::consts::SQRT_2;

    let t = 1.0 / (1.0 + P * x);
    let poly = ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t;
    let erf = 1.0 - poly * (-x * x).exp();

    0.5 * (1.0 + sign * erf)
}

pub fn two_tailed_p_value(z: f64) -> f64 {
    (2.0 * (1.0 - normal_cdf(z.abs()))).clamp(0.0, 1.0)
}

/// One-sample z-test of `current` against a baseline mean using the
/// standard error of the mean. Returns `(z, p)`.
///
/// No variance (or fewer than two observations) yields `(0.0, 1.0)`.
#[allow(clippy::cast_precision_loss)]
pub fn z_test(current: f64, mean: f64, std: f64, n: usize) -> (f64, f64) {
    if std <= 0.0 || n < 2 {
        return (0.0, 1.0);
    }
    let standard_error = std / (n as f64).sqrt();
    let z = (current - mean) / standard_error;
    (z, two_tailed_p_value(z))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    mod job_stats {
        use super::*;

        #[test]
        fn computes_stats_for_three_values() {
            let stats = JobStats::from_durations(&[10.0, 20.0, 30.0]);
            assert_eq!(stats.count, 3);
            assert!(approx_eq(stats.mean, 20.0, 1e-9));
            assert!(approx_eq(stats.median, 20.0, 1e-9));
            assert!(approx_eq(stats.std, 10.0, 1e-9));
            assert!(approx_eq(stats.min, 10.0, 1e-9));
            assert!(approx_eq(stats.max, 30.0, 1e-9));
        }

        #[test]
        fn single_value_has_zero_std() {
            let stats = JobStats::from_durations(&[42.0]);
            assert_eq!(stats.count, 1);
            assert!(approx_eq(stats.std, 0.0, 1e-12));
            assert!(approx_eq(stats.median, 42.0, 1e-12));
        }

        #[test]
        fn empty_input_is_all_zero() {
            assert_eq!(JobStats::from_durations(&[]), JobStats::default());
        }

        #[test]
        fn even_count_median_averages_middle_pair() {
            let stats = JobStats::from_durations(&[40.0, 10.0, 30.0, 20.0]);
            assert!(approx_eq(stats.median, 25.0, 1e-9));
            assert!(approx_eq(stats.min, 10.0, 1e-9));
            assert!(approx_eq(stats.max, 40.0, 1e-9));
        }
    }

    mod normal_cdf {
        use super::*;

        #[test]
        fn is_one_half_at_zero() {
            assert!(approx_eq(normal_cdf(0.0), 0.5, 1e-7));
        }

        #[test]
        fn matches_reference_values() {
            assert!(approx_eq(normal_cdf(1.0), 0.841_344_7, 1e-6));
            assert!(approx_eq(normal_cdf(1.96), 0.975_002_1, 1e-6));
            assert!(approx_eq(normal_cdf(-1.96), 0.024_997_9, 1e-6));
        }

        #[test]
        fn saturates_in_the_tails() {
            assert!(normal_cdf(10.0) > 0.999_999);
            assert!(normal_cdf(-10.0) < 1e-6);
        }
    }

    mod z_test {
        use super::*;

        #[test]
        fn zero_variance_is_not_assessable() {
            assert_eq!(z_test(130.0, 100.0, 0.0, 5), (0.0, 1.0));
        }

        #[test]
        fn single_observation_is_not_assessable() {
            assert_eq!(z_test(130.0, 100.0, 5.0, 1), (0.0, 1.0));
        }

        #[test]
        fn large_shift_is_highly_significant() {
            let (z, p) = z_test(130.0, 100.0, 5.0, 20);
            assert!(approx_eq(z, 30.0 / (5.0 / 20f64.sqrt()), 1e-9));
            assert!(p < 1e-6);
        }

        #[test]
        fn two_sigma_of_the_mean_is_about_five_percent() {
            // z = 1.96 -> p ~= 0.05
            let (z, p) = z_test(101.96, 100.0, 2.0, 4);
            assert!(approx_eq(z, 1.96, 1e-9));
            assert!(approx_eq(p, 0.05, 1e-4));
        }

        #[test]
        fn p_value_is_symmetric() {
            let (_, p_up) = z_test(110.0, 100.0, 10.0, 9);
            let (_, p_down) = z_test(90.0, 100.0, 10.0, 9);
            assert!(approx_eq(p_up, p_down, 1e-12));
        }
    }

    mod cmp_f64 {
        use super::*;

        #[test]
        fn orders_numbers_and_treats_nan_as_equal() {
            assert_eq!(cmp_f64(1.0, 2.0), Ordering::Less);
            assert_eq!(cmp_f64(2.0, 1.0), Ordering::Greater);
            assert_eq!(cmp_f64(f64::NAN, 1.0), Ordering::Equal);
        }
    }
}
