use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const GHS_CURRENCY_CODE: &str = "GHS";

//--------------------------------------        Cedi        ----------------------------------------------------------
/// A Ghana Cedi amount, stored as an integer number of pesewas (1 GHS = 100 Gp).
///
/// The payment gateway reports amounts as decimal strings ("15.21"), so [`FromStr`] parses those exactly, without
/// going through floating point.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Cedi(i64);

op!(binary Cedi, Add, add);
op!(binary Cedi, Sub, sub);
op!(inplace Cedi, SubAssign, sub_assign);
op!(unary Cedi, Neg, neg);

impl Mul<i64> for Cedi {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Cedi {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in pesewas: {0}")]
pub struct CediConversionError(String);

impl From<i64> for Cedi {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Cedi {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Cedi {}

impl FromStr for Cedi {
    type Err = CediConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        let whole = whole.parse::<i64>().map_err(|e| CediConversionError(format!("{s}: {e}")))?;
        let pesewas = match frac.len() {
            0 => 0,
            1 | 2 => {
                let f = frac.parse::<i64>().map_err(|e| CediConversionError(format!("{s}: {e}")))?;
                if frac.len() == 1 {
                    f * 10
                } else {
                    f
                }
            },
            _ => return Err(CediConversionError(format!("{s}: too many decimal places"))),
        };
        if whole < 0 || s.starts_with('-') {
            return Err(CediConversionError(format!("{s}: negative amounts are not accepted")));
        }
        Ok(Self(whole * 100 + pesewas))
    }
}

impl Display for Cedi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GHS {}.{:02}", self.0 / 100, (self.0 % 100).abs())
    }
}

impl Cedi {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_cedis(cedis: i64) -> Self {
        Self(cedis * 100)
    }

    /// Plain decimal form without the currency code, e.g. "15.21". Round-trips through [`FromStr`].
    pub fn to_decimal_string(&self) -> String {
        format!("{}.{:02}", self.0 / 100, (self.0 % 100).abs())
    }
}
