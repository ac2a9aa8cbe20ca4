
/// Sentinel for the logarithm of zero probability
pub const LOG_ZERO: f64 = f64::NEG_INFINITY;

/// Numerically stable log(exp(a) + exp(b)).
/// `LOG_ZERO` operands are treated as absent terms.
/// # Arguments
/// * `a` - first log-space value
/// * `b` - second log-space value
pub fn log_add_exact(a: f64, b: f64) -> f64 {
    if a == LOG_ZERO {
        return b;
    }
    if b == LOG_ZERO {
        return a;
    }
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

/// Numerically stable log of the sum of exponentials over a slice.
/// An empty slice (or all-`LOG_ZERO` slice) returns `LOG_ZERO`.
/// # Arguments
/// * `values` - log-space values to sum
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let mut total = LOG_ZERO;
    for &v in values.iter() {
        total = log_add_exact(total, v);
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_log_add_exact() {
        // ln(2) = ln(e^0 + e^0)
        assert_approx_eq!(log_add_exact(0.0, 0.0), 2.0_f64.ln());

        // commutes
        assert_approx_eq!(log_add_exact(-1.0, -5.0), log_add_exact(-5.0, -1.0));

        // exact check against direct computation in a safe range
        let direct = (0.25_f64 + 0.5).ln();
        assert_approx_eq!(log_add_exact(0.25_f64.ln(), 0.5_f64.ln()), direct);
    }

    #[test]
    fn test_log_zero_handling() {
        assert_eq!(log_add_exact(LOG_ZERO, LOG_ZERO), LOG_ZERO);
        assert_approx_eq!(log_add_exact(LOG_ZERO, -2.5), -2.5);
        assert_approx_eq!(log_add_exact(-2.5, LOG_ZERO), -2.5);
    }

    #[test]
    fn test_log_sum_exp() {
        assert_eq!(log_sum_exp(&[]), LOG_ZERO);
        assert_approx_eq!(log_sum_exp(&[0.0, 0.0, 0.0]), 3.0_f64.ln());
        assert_approx_eq!(log_sum_exp(&[-1.0, LOG_ZERO]), -1.0);
    }
}
