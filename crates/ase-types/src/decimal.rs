//! Fixed-point decimal with up to 38 digits.
//!
//! `DECN`, `NUMN` and the money types all decode into [`Decimal`]. The
//! value is kept as an unscaled `i128` mantissa together with the precision
//! and scale of the column it came from.

use std::fmt;

use crate::error::TypeError;

/// Maximum number of decimal digits ASE supports.
pub const MAX_PRECISION: u8 = 38;

/// Precision of a `DECN`/`NUMN` format that does not announce its own.
pub const DEFAULT_PRECISION: u8 = 18;

/// Scale of decoded `DECN`/`NUMN` values before the format applies its own.
pub const DEFAULT_SCALE: u8 = 0;

/// Precision of `MONEY`.
pub const MONEY_PRECISION: u8 = 20;

/// Scale of `MONEY`.
pub const MONEY_SCALE: u8 = 4;

/// Precision of `SHORTMONEY`.
pub const SHORT_MONEY_PRECISION: u8 = 10;

/// Scale of `SHORTMONEY`.
pub const SHORT_MONEY_SCALE: u8 = 4;

/// A decimal number `mantissa * 10^-scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decimal {
    mantissa: i128,
    precision: u8,
    scale: u8,
}

impl Decimal {
    /// Create a zero value with the given precision and scale.
    pub fn new(precision: u8, scale: u8) -> Result<Self, TypeError> {
        check_bounds(precision, scale)?;
        Ok(Self {
            mantissa: 0,
            precision,
            scale,
        })
    }

    /// Create a value from an unscaled mantissa.
    ///
    /// Fails when the mantissa has more digits than `precision`.
    pub fn from_mantissa(mantissa: i128, precision: u8, scale: u8) -> Result<Self, TypeError> {
        let mut dec = Self::new(precision, scale)?;
        check_digits(mantissa, precision)?;
        dec.mantissa = mantissa;
        Ok(dec)
    }

    /// Parse a textual number such as `"-12.3400"` at the given precision
    /// and scale.
    ///
    /// Fails when the number needs more digits than `precision` once it is
    /// padded to `scale` fractional digits.
    pub fn parse(precision: u8, scale: u8, s: &str) -> Result<Self, TypeError> {
        let mut dec = Self::new(precision, scale)?;
        dec.set_str(s)?;
        Ok(dec)
    }

    fn set_str(&mut self, s: &str) -> Result<(), TypeError> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };

        let (left, mut right) = digits.split_once('.').unwrap_or((digits, ""));
        if left.is_empty() && right.is_empty() {
            return Err(TypeError::InvalidDecimal(format!("no digits in '{s}'")));
        }
        // Trailing zeros past the scale carry no value.
        while right.len() > usize::from(self.scale) && right.ends_with('0') {
            right = &right[..right.len() - 1];
        }
        if right.len() > usize::from(self.scale) {
            return Err(TypeError::InvalidDecimal(format!(
                "'{s}' has more than {} fractional digits",
                self.scale
            )));
        }

        let mut mantissa: i128 = 0;
        for c in left.chars().chain(right.chars()) {
            let digit = c
                .to_digit(10)
                .ok_or_else(|| TypeError::InvalidDecimal(format!("invalid digit in '{s}'")))?;
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(i128::from(digit)))
                .ok_or(TypeError::OutOfRange {
                    target_type: "DECIMAL",
                })?;
        }

        let missing = u32::from(self.scale) - right.len() as u32;
        mantissa = mantissa
            .checked_mul(10i128.pow(missing))
            .ok_or(TypeError::OutOfRange {
                target_type: "DECIMAL",
            })?;
        check_digits(mantissa, self.precision)?;

        self.mantissa = if negative { -mantissa } else { mantissa };
        Ok(())
    }

    /// The unscaled value.
    #[must_use]
    pub fn mantissa(&self) -> i128 {
        self.mantissa
    }

    /// Total number of digits.
    #[must_use]
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Number of digits after the decimal point.
    #[must_use]
    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// Apply the precision and scale announced by a column format.
    ///
    /// The mantissa is left untouched; the wire carries it unscaled.
    pub fn set_precision_scale(&mut self, precision: u8, scale: u8) -> Result<(), TypeError> {
        check_bounds(precision, scale)?;
        check_digits(self.mantissa, precision)?;
        self.precision = precision;
        self.scale = scale;
        Ok(())
    }

    /// Whether the value is below zero.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.mantissa < 0
    }

    /// Magnitude as big-endian bytes with leading zero bytes removed.
    #[must_use]
    pub fn magnitude_bytes(&self) -> Vec<u8> {
        let bytes = self.mantissa.unsigned_abs().to_be_bytes();
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        bytes[first..].to_vec()
    }

    /// Rebuild a value from a sign and big-endian magnitude bytes.
    pub fn from_magnitude(
        negative: bool,
        magnitude: &[u8],
        precision: u8,
        scale: u8,
    ) -> Result<Self, TypeError> {
        if magnitude.len() > 16 {
            return Err(TypeError::OutOfRange {
                target_type: "DECIMAL",
            });
        }
        let mut buf = [0u8; 16];
        buf[16 - magnitude.len()..].copy_from_slice(magnitude);
        let unsigned = u128::from_be_bytes(buf);
        let mantissa = i128::try_from(unsigned).map_err(|_| TypeError::OutOfRange {
            target_type: "DECIMAL",
        })?;
        Self::from_mantissa(
            if negative { -mantissa } else { mantissa },
            precision,
            scale,
        )
    }

    /// The mantissa rescaled to `scale` digits, failing if digits would be
    /// lost.
    pub fn rescaled_mantissa(&self, scale: u8) -> Result<i128, TypeError> {
        if scale >= self.scale {
            let factor = 10i128.pow(u32::from(scale - self.scale));
            return self
                .mantissa
                .checked_mul(factor)
                .ok_or(TypeError::OutOfRange {
                    target_type: "DECIMAL",
                });
        }

        let factor = 10i128.pow(u32::from(self.scale - scale));
        if self.mantissa % factor != 0 {
            return Err(TypeError::InvalidDecimal(format!(
                "{self} cannot be represented with scale {scale}"
            )));
        }
        Ok(self.mantissa / factor)
    }
}

fn check_bounds(precision: u8, scale: u8) -> Result<(), TypeError> {
    if precision > MAX_PRECISION {
        return Err(TypeError::InvalidDecimal(format!(
            "precision {precision} is more than {MAX_PRECISION} digits"
        )));
    }
    if scale > precision {
        return Err(TypeError::InvalidDecimal(format!(
            "scale {scale} is bigger than precision {precision}"
        )));
    }
    Ok(())
}

fn check_digits(mantissa: i128, precision: u8) -> Result<(), TypeError> {
    let digits = digit_count(mantissa);
    if digits > u32::from(precision) {
        return Err(TypeError::PrecisionExceeded { digits, precision });
    }
    Ok(())
}

fn digit_count(mantissa: i128) -> u32 {
    mantissa.unsigned_abs().checked_ilog10().map_or(0, |log| log + 1)
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa.unsigned_abs().to_string();
        let width = usize::from(self.precision).max(digits.len()).max(usize::from(self.scale));
        let padded = format!("{digits:0>width$}");
        let split = width - usize::from(self.scale);

        let left = padded[..split].trim_start_matches('0');
        let right = padded[split..].trim_end_matches('0');

        let sign = if self.is_negative() { "-" } else { "" };
        let left = if left.is_empty() { "0" } else { left };
        let right = if right.is_empty() { "0" } else { right };
        write!(f, "{sign}{left}.{right}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let cases = [
            (1, 1, "0.0"),
            (5, 4, "-0.0001"),
            (10, 2, "123.45"),
            (38, 0, "99999999999999999999999999999999999999.0"),
            (38, 0, "-99999999999999999999999999999999999999.0"),
        ];
        for (precision, scale, s) in cases {
            let dec = Decimal::parse(precision, scale, s).unwrap();
            assert_eq!(dec.to_string(), s);
        }
    }

    #[test]
    fn test_fractional_padding() {
        let dec = Decimal::parse(10, 4, "1.5").unwrap();
        assert_eq!(dec.mantissa(), 15000);
        assert_eq!(dec.to_string(), "1.5");
    }

    #[test]
    fn test_bounds() {
        assert!(Decimal::new(39, 0).is_err());
        assert!(Decimal::new(5, 6).is_err());
        assert!(Decimal::parse(10, 1, "1.25").is_err());
        assert!(Decimal::parse(10, 1, "abc").is_err());
    }

    #[test]
    fn test_precision_limit() {
        assert!(matches!(
            Decimal::parse(5, 2, "12345.67"),
            Err(TypeError::PrecisionExceeded {
                digits: 7,
                precision: 5
            })
        ));
        assert!(matches!(
            Decimal::from_mantissa(10_000_000_000, 3, 0),
            Err(TypeError::PrecisionExceeded {
                digits: 11,
                precision: 3
            })
        ));
        // fractional padding counts towards the precision
        assert!(Decimal::parse(4, 2, "123").is_err());
        assert_eq!(Decimal::parse(5, 2, "123").unwrap().mantissa(), 12300);
        assert_eq!(Decimal::from_mantissa(-999, 3, 0).unwrap().to_string(), "-999.0");

        let mut dec = Decimal::parse(10, 2, "1234.5").unwrap();
        assert!(dec.set_precision_scale(5, 2).is_err());
        assert_eq!(dec.precision(), 10);
    }

    #[test]
    fn test_magnitude_roundtrip() {
        let dec = Decimal::parse(20, 4, "-922337203685477.5807").unwrap();
        let bytes = dec.magnitude_bytes();
        let back = Decimal::from_magnitude(true, &bytes, 20, 4).unwrap();
        assert_eq!(back, dec);
        assert!(Decimal::new(5, 0).unwrap().magnitude_bytes().is_empty());
    }

    #[test]
    fn test_rescale() {
        let dec = Decimal::parse(10, 2, "1.20").unwrap();
        assert_eq!(dec.rescaled_mantissa(4).unwrap(), 12000);
        assert_eq!(dec.rescaled_mantissa(1).unwrap(), 12);
        assert!(Decimal::parse(10, 2, "1.25").unwrap().rescaled_mantissa(1).is_err());
    }
}
