//! Small numerical helpers.

/// Convert a `usize` into an `f64`.
#[must_use]
pub const fn usize_to_f64(value: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let newval = value as f64;
    newval
}

/// Horner evaluation of `Σ coeffs[i] * x^i`.
#[must_use]
pub fn polynomial(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc.mul_add(x, *c))
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    #[test]
    fn usize_to_f64_test() {
        assert_relative_eq!(usize_to_f64(11), 11.0);
    }
    #[test]
    fn polynomial_test() {
        assert_relative_eq!(polynomial(&[], 2.0), 0.0);
        assert_relative_eq!(polynomial(&[1.0, 2.0, 3.0], 2.0), 17.0);
    }
}
