//! Fixed-point quantities used by stage data and pricing.
//!
//! Money is held in paise, weight in grams and percentages in hundredths of a
//! percent. Decimal input is parsed exactly: a value with more fractional
//! digits than the unit can hold is rejected instead of rounded.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const GRAMS_PER_KG: i64 = 1_000;
pub const GRAMS_PER_QUINTAL: i64 = 100_000;
pub const GRAMS_PER_TON: i64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitParseError {
    #[error("'{0}' is not a decimal number")]
    NotANumber(String),
    #[error("'{value}' has more than {scale} digits after the decimal point")]
    TooPrecise { value: String, scale: u32 },
    #[error("'{0}' is out of range")]
    OutOfRange(String),
}

fn parse_fixed(raw: &str, scale: u32) -> Result<i64, UnitParseError> {
    let trimmed = raw.trim();
    let not_a_number = || UnitParseError::NotANumber(raw.to_string());
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (whole, fraction) = match digits.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (digits, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(not_a_number());
    }
    if !whole.chars().all(|ch| ch.is_ascii_digit())
        || !fraction.chars().all(|ch| ch.is_ascii_digit())
    {
        return Err(not_a_number());
    }
    if fraction.len() > scale as usize {
        return Err(UnitParseError::TooPrecise {
            value: raw.to_string(),
            scale,
        });
    }

    let out_of_range = || UnitParseError::OutOfRange(raw.to_string());
    let factor = 10i64.pow(scale);
    let whole_value = if whole.is_empty() {
        0
    } else {
        whole.parse::<i64>().map_err(|_| out_of_range())?
    };
    let fraction_value = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{fraction:0<width$}", width = scale as usize);
        padded.parse::<i64>().map_err(|_| out_of_range())?
    };
    let magnitude = whole_value
        .checked_mul(factor)
        .and_then(|value| value.checked_add(fraction_value))
        .ok_or_else(out_of_range)?;
    Ok(if negative { -magnitude } else { magnitude })
}

fn format_fixed(value: i64, scale: u32) -> String {
    let factor = 10i64.pow(scale);
    let sign = if value < 0 { "-" } else { "" };
    let magnitude = value.unsigned_abs();
    let whole = magnitude / factor as u64;
    let fraction = magnitude % factor as u64;
    format!("{sign}{whole}.{fraction:0width$}", width = scale as usize)
}

/// Divide rounding half away from zero.
pub(crate) fn div_round(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder.abs() * 2 >= denominator.abs() {
        if (numerator < 0) == (denominator < 0) {
            quotient + 1
        } else {
            quotient - 1
        }
    } else {
        quotient
    }
}

macro_rules! fixed_unit {
    ($name:ident, $scale:expr, $suffix:expr) => {
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn raw(self) -> i64 {
                self.0
            }

            pub fn is_positive(self) -> bool {
                self.0 > 0
            }
        }

        impl FromStr for $name {
            type Err = UnitParseError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                parse_fixed(value, $scale).map($name)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", format_fixed(self.0, $scale), $suffix)
            }
        }
    };
}

fixed_unit!(Money, 2, "");
fixed_unit!(Weight, 3, " kg");
fixed_unit!(Percent, 2, "%");

impl Money {
    pub fn from_rupees(rupees: i64) -> Self {
        Money(rupees * 100)
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }
}

impl Weight {
    pub fn from_kg(kg: i64) -> Self {
        Weight(kg * GRAMS_PER_KG)
    }

    pub fn grams(self) -> i64 {
        self.0
    }
}

impl Percent {
    pub fn within_hundred(self) -> bool {
        (0..=10_000).contains(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{div_round, Money, Percent, UnitParseError, Weight};
    use std::str::FromStr;

    #[test]
    fn parses_money_into_paise() {
        assert_eq!(Money::from_str("2150.5").unwrap(), Money(215_050));
        assert_eq!(Money::from_str("2150").unwrap(), Money(215_000));
        assert_eq!(Money::from_str(".75").unwrap(), Money(75));
        assert_eq!(Money::from_str("-3.10").unwrap(), Money(-310));
    }

    #[test]
    fn parses_weight_into_grams() {
        assert_eq!(Weight::from_str("12500.125").unwrap(), Weight(12_500_125));
        assert_eq!(Weight::from_str("0.5").unwrap(), Weight(500));
    }

    #[test]
    fn rejects_excess_precision_and_garbage() {
        assert!(matches!(
            Money::from_str("1.005"),
            Err(UnitParseError::TooPrecise { scale: 2, .. })
        ));
        assert!(matches!(
            Percent::from_str("12,5"),
            Err(UnitParseError::NotANumber(_))
        ));
        assert!(matches!(
            Weight::from_str("."),
            Err(UnitParseError::NotANumber(_))
        ));
        assert!(matches!(
            Money::from_str("99999999999999999999"),
            Err(UnitParseError::OutOfRange(_))
        ));
    }

    #[test]
    fn displays_with_fixed_scale() {
        assert_eq!(Money(215_050).to_string(), "2150.50");
        assert_eq!(Money(-5).to_string(), "-0.05");
        assert_eq!(Weight(1_250).to_string(), "1.250 kg");
        assert_eq!(Percent(1_450).to_string(), "14.50%");
    }

    #[test]
    fn percent_bounds() {
        assert!(Percent(0).within_hundred());
        assert!(Percent(10_000).within_hundred());
        assert!(!Percent(10_001).within_hundred());
        assert!(!Percent(-1).within_hundred());
    }

    #[test]
    fn div_round_is_half_away_from_zero() {
        assert_eq!(div_round(5, 2), 3);
        assert_eq!(div_round(-5, 2), -3);
        assert_eq!(div_round(4, 3), 1);
        assert_eq!(div_round(7, 10), 1);
        assert_eq!(div_round(-4, 10), 0);
    }
}
