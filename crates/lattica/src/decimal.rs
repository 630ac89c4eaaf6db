//! Decimal type for arbitrary precision float arithmetic.
//!
//! Float values in the language are decimals, not IEEE binary floats: the
//! mantissa is unbounded and the decimal exponent is a signed 32-bit integer,
//! which comfortably exceeds the precision the data model requires.
//!
//! The implementation uses a coefficient (BigInt) and an exponent (i32)
//! representation: value = coefficient * 10^exponent. There are no NaNs or
//! infinities; operations that would produce them (division by zero) fail
//! before reaching this type.

use std::{
    cmp::Ordering,
    fmt,
    str::FromStr,
};

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

/// Number of significant decimal digits kept by inexact division.
///
/// 80 digits is past the 256-bit-mantissa floor of the data model; results
/// are rounded to nearest (half-even) at this precision.
const DIVISION_PRECISION: i32 = 80;

/// A decimal number with arbitrary precision.
///
/// Stored as coefficient * 10^exponent, where coefficient is a BigInt.
/// Trailing zeros are normalized away so that equal values have equal
/// representations; `-0` keeps its sign through the `negative_zero` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decimal {
    /// The significand/coefficient of the decimal number.
    coefficient: BigInt,
    /// The exponent (power of 10).
    exponent: i32,
    /// Sign bit for zero values.
    ///
    /// `BigInt` does not preserve the sign of zero, but Decimal needs `-0`.
    negative_zero: bool,
}

impl Decimal {
    /// Creates a new Decimal from coefficient and exponent, normalized.
    #[must_use]
    pub(crate) fn new(coefficient: BigInt, exponent: i32) -> Self {
        let mut d = Self {
            coefficient,
            exponent,
            negative_zero: false,
        };
        d.normalize();
        d
    }

    /// Creates a Decimal from an i64.
    #[must_use]
    pub fn from_i64(n: i64) -> Self {
        Self::new(BigInt::from(n), 0)
    }

    /// Creates a Decimal from a BigInt.
    #[must_use]
    pub fn from_bigint(n: &BigInt) -> Self {
        Self::new(n.clone(), 0)
    }

    /// Creates a Decimal from a string.
    ///
    /// Supports formats like:
    /// - "123", "-123", "+123"
    /// - "123.456", "-123.456"
    /// - "1.23E+10", "1.23e-10"
    ///
    /// # Errors
    /// Returns an error if the string is not a valid finite decimal.
    pub fn from_string(s: &str) -> Result<Self, String> {
        let s = s.trim();

        let (negative, rest) = if let Some(rest) = s.strip_prefix('-') {
            (true, rest)
        } else if let Some(rest) = s.strip_prefix('+') {
            (false, rest)
        } else {
            (false, s)
        };

        // Find exponent indicator
        let (mantissa, exp_str) = if let Some(pos) = rest.to_lowercase().find('e') {
            (&rest[..pos], &rest[pos + 1..])
        } else {
            (rest, "")
        };

        let mut exponent: i32 = 0;
        if !exp_str.is_empty() {
            exponent = exp_str
                .parse::<i32>()
                .map_err(|_| format!("invalid exponent in decimal string: {s}"))?;
        }

        // Parse mantissa (handle decimal point)
        let (int_part, frac_part) = if let Some(pos) = mantissa.find('.') {
            (&mantissa[..pos], &mantissa[pos + 1..])
        } else {
            (mantissa, "")
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(format!("invalid decimal string: {s}"));
        }

        let digits = format!("{}{}", int_part.trim_start_matches('0'), frac_part);
        let frac_len = i32::try_from(frac_part.len()).map_err(|_| format!("decimal string too long: {s}"))?;
        exponent -= frac_len;

        let all_zero = digits.is_empty() || digits.chars().all(|c| c == '0');
        let coefficient = if all_zero {
            BigInt::ZERO
        } else {
            BigInt::from_str(&digits).map_err(|_| format!("invalid digits in decimal string: {s}"))?
        };

        let coefficient = if negative { -coefficient } else { coefficient };
        let mut value = Self::new(coefficient, exponent);
        if all_zero {
            value.negative_zero = negative;
        }
        Ok(value)
    }

    /// True if the value is zero (of either sign).
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.coefficient.is_zero()
    }

    /// True if the value is negative (including `-0`).
    #[must_use]
    pub fn is_signed(&self) -> bool {
        if self.coefficient.is_zero() {
            self.negative_zero
        } else {
            self.coefficient.is_negative()
        }
    }

    /// True if the value has no fractional part.
    #[must_use]
    pub fn is_integral(&self) -> bool {
        self.exponent >= 0
    }

    /// Converts to a BigInt when the value is integral.
    ///
    /// Returns `None` when the value has a fractional part; the caller
    /// decides whether that is a precision-loss failure.
    #[must_use]
    pub fn to_bigint_exact(&self) -> Option<BigInt> {
        if self.exponent >= 0 {
            let scale = BigInt::from(10u32).pow(u32::try_from(self.exponent).unwrap_or(0));
            Some(&self.coefficient * scale)
        } else {
            None
        }
    }

    /// Negates the value.
    #[must_use]
    pub fn neg(&self) -> Self {
        if self.coefficient.is_zero() {
            let mut z = self.clone();
            z.negative_zero = !z.negative_zero;
            return z;
        }
        Self::new(-&self.coefficient, self.exponent)
    }

    /// Adds two decimals.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        // Align exponents at the most precise (lowest) exponent.
        let target_exp = self.exponent.min(other.exponent);
        let a = self.adjust_exponent(target_exp);
        let b = other.adjust_exponent(target_exp);
        Self::new(&a.coefficient + &b.coefficient, target_exp)
    }

    /// Subtracts two decimals.
    #[must_use]
    pub fn sub(&self, other: &Self) -> Self {
        self.add(&other.neg())
    }

    /// Multiplies two decimals.
    #[must_use]
    pub fn mul(&self, other: &Self) -> Self {
        let coefficient = &self.coefficient * &other.coefficient;
        let exponent = self.exponent + other.exponent;
        let mut result = Self::new(coefficient, exponent);
        if result.coefficient.is_zero() {
            result.negative_zero = self.is_signed() != other.is_signed();
        }
        result
    }

    /// Divides two decimals (true division).
    ///
    /// Exact when possible; otherwise rounded to nearest (half-even) at
    /// [`DIVISION_PRECISION`] significant digits.
    ///
    /// # Panics
    /// Panics when `other` is zero. Callers reject zero divisors first.
    #[must_use]
    pub fn div(&self, other: &Self) -> Self {
        assert!(!other.is_zero(), "decimal division by zero");
        if self.is_zero() {
            let mut z = Self::new(BigInt::ZERO, 0);
            z.negative_zero = self.is_signed() != other.is_signed();
            return z;
        }

        // Scale up the dividend to get the desired precision.
        let self_digits = i32::try_from(self.coefficient.to_string().trim_start_matches('-').len()).unwrap_or(1);
        let other_digits = i32::try_from(other.coefficient.to_string().trim_start_matches('-').len()).unwrap_or(1);
        let scale_factor = (DIVISION_PRECISION - self_digits + other_digits).max(0);
        let scale_power = BigInt::from(10u32).pow(u32::try_from(scale_factor).unwrap_or(0));

        let scaled_dividend = &self.coefficient * scale_power;
        let (quotient, remainder) = scaled_dividend.div_rem(&other.coefficient);

        // Round to nearest, ties to even.
        let quotient = round_half_even(quotient, &remainder, &other.coefficient);
        let exponent = self.exponent - other.exponent - scale_factor;
        Self::new(quotient, exponent)
    }

    /// Removes trailing zeros from the coefficient, folding them into the
    /// exponent, so equal values compare with equal parts.
    fn normalize(&mut self) {
        if self.coefficient.is_zero() {
            self.exponent = 0;
            return;
        }
        let digits = self.coefficient.to_string();
        let digits = digits.trim_start_matches('-');
        let stripped = digits.trim_end_matches('0').len();
        let zeros_to_remove = digits.len() - stripped;
        if zeros_to_remove > 0 {
            let divisor = BigInt::from(10u32).pow(u32::try_from(zeros_to_remove).unwrap_or(0));
            self.coefficient /= divisor;
            self.exponent = self.exponent.saturating_add(i32::try_from(zeros_to_remove).unwrap_or(0));
        }
    }

    /// Adjusts the exponent to the target value, scaling the coefficient.
    ///
    /// Only called with `target_exp <= self.exponent`, so scaling always
    /// multiplies and never loses digits.
    fn adjust_exponent(&self, target_exp: i32) -> Self {
        let exp_diff = self.exponent - target_exp;
        if exp_diff == 0 {
            return self.clone();
        }
        let multiplier = BigInt::from(10u32).pow(u32::try_from(exp_diff).unwrap_or(0));
        Self {
            coefficient: &self.coefficient * multiplier,
            exponent: target_exp,
            negative_zero: self.negative_zero,
        }
    }

    /// Approximate f64 rendering, used only where a host needs a lossy view.
    #[must_use]
    pub fn to_f64_lossy(&self) -> f64 {
        let coeff = self.coefficient.to_f64().unwrap_or(f64::NAN);
        coeff * 10f64.powi(self.exponent)
    }
}

/// Rounds a truncated quotient to nearest (ties to even) given the remainder
/// and divisor of the division that produced it.
fn round_half_even(quotient: BigInt, remainder: &BigInt, divisor: &BigInt) -> BigInt {
    if remainder.is_zero() {
        return quotient;
    }
    let twice = remainder.abs() * 2u32;
    let divisor_abs = divisor.abs();
    let round_away = match twice.cmp(&divisor_abs) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => quotient.is_odd(),
    };
    if round_away {
        if quotient.is_negative() || (quotient.is_zero() && remainder.is_negative() != divisor.is_negative()) {
            quotient - 1
        } else {
            quotient + 1
        }
    } else {
        quotient
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        // Align exponents at the most precise (lowest) exponent.
        let target_exp = self.exponent.min(other.exponent);
        let a = self.adjust_exponent(target_exp);
        let b = other.adjust_exponent(target_exp);
        a.coefficient.cmp(&b.coefficient)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.coefficient.is_zero() {
            let sign = if self.negative_zero { "-" } else { "" };
            return write!(f, "{sign}0");
        }

        let digits = self.coefficient.abs().to_string();
        let sign = if self.coefficient.is_negative() { "-" } else { "" };
        let adjusted = i32::try_from(digits.len()).unwrap_or(1) + self.exponent - 1;

        if self.exponent <= 0 && adjusted >= -6 {
            let point = i32::try_from(digits.len()).unwrap_or(0) + self.exponent;
            if point > 0 {
                let point = usize::try_from(point).unwrap_or(0);
                let (int_part, frac_part) = digits.split_at(point);
                if frac_part.is_empty() {
                    write!(f, "{sign}{int_part}")
                } else {
                    write!(f, "{sign}{int_part}.{frac_part}")
                }
            } else {
                let zeros = usize::try_from(-point).unwrap_or(0);
                write!(f, "{sign}0.{}{}", "0".repeat(zeros), digits)
            }
        } else if self.exponent > 0 && adjusted <= 20 {
            // Small positive exponents render in plain form.
            let zeros = usize::try_from(self.exponent).unwrap_or(0);
            write!(f, "{sign}{digits}{}", "0".repeat(zeros))
        } else if digits.len() == 1 {
            write!(f, "{sign}{digits}E{adjusted:+}")
        } else {
            let (first, rest) = digits.split_at(1);
            write!(f, "{sign}{first}.{rest}E{adjusted:+}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_string(s).unwrap()
    }

    #[test]
    fn parse_and_display() {
        assert_eq!(dec("123").to_string(), "123");
        assert_eq!(dec("-123.456").to_string(), "-123.456");
        assert_eq!(dec("1.50").to_string(), "1.5");
        assert_eq!(dec("0.001").to_string(), "0.001");
        assert_eq!(dec("1e3").to_string(), "1000");
        assert_eq!(dec("-0").to_string(), "-0");
    }

    #[test]
    fn arithmetic() {
        assert_eq!(dec("0.1").add(&dec("0.2")), dec("0.3"));
        assert_eq!(dec("1.5").mul(&dec("2")), dec("3.0"));
        assert_eq!(dec("10").sub(&dec("2.5")), dec("7.5"));
        assert_eq!(dec("1").div(&dec("4")), dec("0.25"));
    }

    #[test]
    fn division_rounds_to_nearest() {
        let third = dec("1").div(&dec("3"));
        // 80 significant digits of 0.333...
        assert!(third.to_string().starts_with("0.3333333333"));
        assert_eq!(third.mul(&dec("3")).cmp(&dec("1")), Ordering::Less);
    }

    #[test]
    fn ordering_ignores_representation() {
        assert_eq!(dec("1.0"), dec("1"));
        assert_eq!(dec("1.20"), dec("1.2"));
        assert!(dec("1.5") > dec("1.25"));
        assert!(dec("-3") < dec("2"));
    }

    #[test]
    fn integral_conversion() {
        assert_eq!(dec("42.0").to_bigint_exact(), Some(BigInt::from(42)));
        assert_eq!(dec("4e2").to_bigint_exact(), Some(BigInt::from(400)));
        assert_eq!(dec("1.5").to_bigint_exact(), None);
    }
}
