use std::fmt;

use super::{Insn, Type};

/// An opaque reference to an SSA value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Value(pub u32);
cranelift_entity::entity_impl!(Value);

/// A value definition: the instruction computing the value and its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueData {
    pub insn: Insn,
    pub ty: Type,
}

/// A compile time constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Immediate {
    I1(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
}

impl Immediate {
    pub fn ty(self) -> Type {
        match self {
            Self::I1(..) => Type::I1,
            Self::I8(..) => Type::I8,
            Self::I16(..) => Type::I16,
            Self::I32(..) => Type::I32,
            Self::I64(..) => Type::I64,
        }
    }

    pub(crate) fn as_i64(self) -> i64 {
        match self {
            Self::I1(val) => val as i64,
            Self::I8(val) => val as i64,
            Self::I16(val) => val as i64,
            Self::I32(val) => val as i64,
            Self::I64(val) => val,
        }
    }

    pub(crate) fn from_i64(val: i64, ty: Type) -> Self {
        match ty {
            Type::I1 => Self::I1(val & 1 != 0),
            Type::I8 => Self::I8(val as i8),
            Type::I16 => Self::I16(val as i16),
            Type::I32 => Self::I32(val as i32),
            Type::I64 => Self::I64(val),
        }
    }
}

impl From<bool> for Immediate {
    fn from(val: bool) -> Self {
        Self::I1(val)
    }
}

impl From<i8> for Immediate {
    fn from(val: i8) -> Self {
        Self::I8(val)
    }
}

impl From<i16> for Immediate {
    fn from(val: i16) -> Self {
        Self::I16(val)
    }
}

impl From<i32> for Immediate {
    fn from(val: i32) -> Self {
        Self::I32(val)
    }
}

impl From<i64> for Immediate {
    fn from(val: i64) -> Self {
        Self::I64(val)
    }
}

impl fmt::Display for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::I1(val) => write!(f, "{}", *val as u8),
            Self::I8(val) => write!(f, "{val}"),
            Self::I16(val) => write!(f, "{val}"),
            Self::I32(val) => write!(f, "{val}"),
            Self::I64(val) => write!(f, "{val}"),
        }
    }
}
