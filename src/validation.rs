//! Value checks and arithmetic for the declared column types.
//!
//! Values are always stored as the caller's original string; these functions
//! only decide whether a string is acceptable for a type, and compute the
//! result of a "modify" on numeric columns.
use std::fmt;
use std::str::FromStr;

use crate::data_types::DataType;

// Same bound as a 128-bit base-10 decimal
pub const MAX_DECIMAL_SCALE: u32 = 28;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("{value:?} is not a valid {data_type} value")]
    Invalid { data_type: DataType, value: String },

    #[error("{lhs} + {rhs} overflows the {data_type} type")]
    Overflow {
        data_type: DataType,
        lhs: String,
        rhs: String,
    },
}

/// Exact base-10 number: `mantissa * 10^-scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimal {
    mantissa: i128,
    scale: u32,
}

impl Decimal {
    pub const ZERO: Decimal = Decimal {
        mantissa: 0,
        scale: 0,
    };

    fn rescale(&self, scale: u32) -> Option<i128> {
        10i128
            .checked_pow(scale - self.scale)
            .and_then(|factor| self.mantissa.checked_mul(factor))
    }

    /// Adds keeping the larger of the two scales, so `1.50 + 1` is `2.50`.
    pub fn checked_add(&self, other: &Decimal) -> Option<Decimal> {
        let scale = self.scale.max(other.scale);
        let mantissa = self.rescale(scale)?.checked_add(other.rescale(scale)?)?;
        Some(Decimal { mantissa, scale })
    }
}

impl FromStr for Decimal {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, unsigned) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };
        let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));

        if whole.is_empty() && fraction.is_empty() {
            return Err(());
        }
        if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(());
        }
        let scale = u32::try_from(fraction.len()).map_err(|_| ())?;
        if scale > MAX_DECIMAL_SCALE {
            return Err(());
        }

        let mut mantissa: i128 = 0;
        for digit in whole.bytes().chain(fraction.bytes()) {
            mantissa = mantissa
                .checked_mul(10)
                .and_then(|m| m.checked_add(i128::from(digit - b'0')))
                .ok_or(())?;
        }

        Ok(Decimal {
            mantissa: if negative { -mantissa } else { mantissa },
            scale,
        })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.mantissa.unsigned_abs().to_string();
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let scale = self.scale as usize;

        if scale == 0 {
            return write!(f, "{sign}{digits}");
        }

        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (whole, fraction) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{whole}.{fraction}")
    }
}

/// Checks whether `value` is acceptable for a column of type `data_type`.
pub fn validate(data_type: DataType, value: &str) -> bool {
    match data_type {
        DataType::Integer => value.parse::<i64>().is_ok(),
        DataType::Decimal => value.parse::<Decimal>().is_ok(),
        DataType::Text => true,
        DataType::User | DataType::Role | DataType::Channel => {
            value.parse::<u64>().is_ok()
        }
        _ => false,
    }
}

fn invalid(data_type: DataType, value: &str) -> ValueError {
    ValueError::Invalid {
        data_type,
        value: value.to_string(),
    }
}

fn parse_operand<T: FromStr>(
    data_type: DataType,
    value: Option<&str>,
    zero: T,
) -> Result<T, ValueError> {
    match value {
        None | Some("") => Ok(zero),
        Some(value) => value.parse().map_err(|_| invalid(data_type, value)),
    }
}

/// Computes the value a cell holds after being modified by `modifier`.
///
/// Numeric columns add the modifier to the current value (an unset value counts
/// as zero); any other column is simply overwritten with the modifier.
pub fn apply_modifier(
    data_type: DataType,
    current: Option<&str>,
    modifier: &str,
) -> Result<String, ValueError> {
    let overflow = || ValueError::Overflow {
        data_type,
        lhs: current.unwrap_or_default().to_string(),
        rhs: modifier.to_string(),
    };

    match data_type {
        DataType::Integer => {
            let rhs: i64 = parse_operand(data_type, Some(modifier), 0)?;
            let lhs: i64 = parse_operand(data_type, current, 0)?;
            lhs.checked_add(rhs)
                .map(|sum| sum.to_string())
                .ok_or_else(overflow)
        }
        DataType::Decimal => {
            let rhs: Decimal = parse_operand(data_type, Some(modifier), Decimal::ZERO)?;
            let lhs: Decimal = parse_operand(data_type, current, Decimal::ZERO)?;
            lhs.checked_add(&rhs)
                .map(|sum| sum.to_string())
                .ok_or_else(overflow)
        }
        _ if validate(data_type, modifier) => Ok(modifier.to_string()),
        _ => Err(invalid(data_type, modifier)),
    }
}
