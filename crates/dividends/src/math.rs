//! Overflow-aware integer helpers.

/// `floor(value * numerator / denominator)` without forming the full product when it
/// would not fit.
///
/// Splits `value` into `q * denominator + r`, so the result is
/// `q * numerator + floor(r * numerator / denominator)`. Returns `None` for a zero
/// denominator or when an intermediate still overflows `u128`.
pub fn mul_div_floor(value: u128, numerator: u128, denominator: u128) -> Option<u128> {
    if denominator == 0 {
        return None;
    }

    let q = value / denominator;
    let r = value % denominator;

    let whole = q.checked_mul(numerator)?;
    let part = r.checked_mul(numerator)? / denominator;
    whole.checked_add(part)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floors_the_quotient() {
        assert_eq!(mul_div_floor(100, 1, 3), Some(33));
        assert_eq!(mul_div_floor(7, 2, 4), Some(3));
    }

    #[test]
    fn zero_denominator_is_none() {
        assert_eq!(mul_div_floor(1, 1, 0), None);
    }

    #[test]
    fn handles_products_wider_than_u128() {
        // value * numerator overflows, but the result fits.
        let value = u128::MAX / 2;
        assert_eq!(mul_div_floor(value, 4, 8), Some(value / 2));
    }
}
