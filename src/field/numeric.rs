//! Arithmetic on the values of numeric fields.
//!
//! [`Number`] is what integer, enumeration and floating point number fields
//! hold, and supports arithmetic and ordering. [`Integral`] is the integer-only
//! subset, which also supports bitwise operations.

use derive_more::{Display, From, Into};
use std::cmp::Ordering;
use std::ops::{Add, BitAnd, BitOr, BitXor, Div, Mul, Neg, Not, Rem, Shl, Shr, Sub};

#[derive(Copy, Clone, Debug, Display)]
pub enum Number {
    #[display(fmt = "{}", _0)]
    Integer(i128),
    #[display(fmt = "{}", _0)]
    Real(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(i) => i as f64,
            Number::Real(r) => r,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, Number::Integer(_))
    }

    pub fn abs(self) -> Number {
        match self {
            Number::Integer(i) => i
                .checked_abs()
                .map(Number::Integer)
                .unwrap_or(Number::Real((i as f64).abs())),
            Number::Real(r) => Number::Real(r.abs()),
        }
    }

    pub fn floor_div(self, rhs: Number) -> Number {
        match (self, rhs) {
            (Number::Integer(a), Number::Integer(b)) if b != 0 => match a.checked_div(b) {
                Some(q) if a % b != 0 && ((a < 0) != (b < 0)) => Number::Integer(q - 1),
                Some(q) => Number::Integer(q),
                None => Number::Real((a as f64 / b as f64).floor()),
            },
            (a, b) => Number::Real((a.as_f64() / b.as_f64()).floor()),
        }
    }

    fn integer_op(
        self,
        rhs: Number,
        checked: fn(i128, i128) -> Option<i128>,
        real: fn(f64, f64) -> f64,
    ) -> Number {
        match (self, rhs) {
            (Number::Integer(a), Number::Integer(b)) => checked(a, b)
                .map(Number::Integer)
                .unwrap_or_else(|| Number::Real(real(a as f64, b as f64))),
            (a, b) => Number::Real(real(a.as_f64(), b.as_f64())),
        }
    }
}

impl From<i64> for Number {
    fn from(v: i64) -> Self {
        Number::Integer(v.into())
    }
}

impl From<u64> for Number {
    fn from(v: u64) -> Self {
        Number::Integer(v.into())
    }
}

impl From<i32> for Number {
    fn from(v: i32) -> Self {
        Number::Integer(v.into())
    }
}

impl From<f64> for Number {
    fn from(v: f64) -> Self {
        Number::Real(v)
    }
}

impl From<Integral> for Number {
    fn from(v: Integral) -> Self {
        Number::Integer(v.0)
    }
}

impl Add for Number {
    type Output = Number;

    fn add(self, rhs: Number) -> Number {
        self.integer_op(rhs, i128::checked_add, |a, b| a + b)
    }
}

impl Sub for Number {
    type Output = Number;

    fn sub(self, rhs: Number) -> Number {
        self.integer_op(rhs, i128::checked_sub, |a, b| a - b)
    }
}

impl Mul for Number {
    type Output = Number;

    fn mul(self, rhs: Number) -> Number {
        self.integer_op(rhs, i128::checked_mul, |a, b| a * b)
    }
}

/// True division: the quotient is always real, so dividing by zero yields an
/// infinity or NaN rather than panicking.
impl Div for Number {
    type Output = Number;

    fn div(self, rhs: Number) -> Number {
        Number::Real(self.as_f64() / rhs.as_f64())
    }
}

impl Rem for Number {
    type Output = Number;

    fn rem(self, rhs: Number) -> Number {
        self.integer_op(rhs, i128::checked_rem, |a, b| a % b)
    }
}

impl Neg for Number {
    type Output = Number;

    fn neg(self) -> Number {
        match self {
            Number::Integer(i) => i
                .checked_neg()
                .map(Number::Integer)
                .unwrap_or(Number::Real(-(i as f64))),
            Number::Real(r) => Number::Real(-r),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Number) -> bool {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => a == b,
            (a, b) => a.as_f64() == b.as_f64(),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => a.partial_cmp(b),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

/// The value of an integer or enumeration field.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, From, Into)]
pub struct Integral(pub i128);

impl From<i64> for Integral {
    fn from(v: i64) -> Self {
        Integral(v.into())
    }
}

impl From<u64> for Integral {
    fn from(v: u64) -> Self {
        Integral(v.into())
    }
}

impl BitAnd for Integral {
    type Output = Integral;

    fn bitand(self, rhs: Integral) -> Integral {
        Integral(self.0 & rhs.0)
    }
}

impl BitOr for Integral {
    type Output = Integral;

    fn bitor(self, rhs: Integral) -> Integral {
        Integral(self.0 | rhs.0)
    }
}

impl BitXor for Integral {
    type Output = Integral;

    fn bitxor(self, rhs: Integral) -> Integral {
        Integral(self.0 ^ rhs.0)
    }
}

impl Not for Integral {
    type Output = Integral;

    fn not(self) -> Integral {
        Integral(!self.0)
    }
}

/// Shifts wider than the value saturate to zero (or -1 for negative right shifts).
impl Shl<u32> for Integral {
    type Output = Integral;

    fn shl(self, rhs: u32) -> Integral {
        Integral(self.0.checked_shl(rhs).unwrap_or(0))
    }
}

impl Shr<u32> for Integral {
    type Output = Integral;

    fn shr(self, rhs: u32) -> Integral {
        Integral(
            self.0
                .checked_shr(rhs)
                .unwrap_or(if self.0 < 0 { -1 } else { 0 }),
        )
    }
}
