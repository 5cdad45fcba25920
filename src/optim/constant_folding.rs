use std::ops;

use crate::ir::{
    insn::{BinaryOp, UnaryOp},
    DataFlowGraph, Immediate, InsnData, Type,
};

pub(super) fn fold_constant(dfg: &DataFlowGraph, insn_data: &InsnData) -> Option<Immediate> {
    match insn_data {
        InsnData::Unary { code, args } => {
            let arg = dfg.value_imm(args[0])?;
            Some(match *code {
                UnaryOp::Not => !arg,
                UnaryOp::Neg => -arg,
            })
        }

        InsnData::Binary { code, args } => {
            let lhs = dfg.value_imm(args[0])?;
            let rhs = dfg.value_imm(args[1])?;
            if *code == BinaryOp::Sdiv && rhs.is_zero() {
                return None;
            }
            Some(match *code {
                BinaryOp::Add => lhs + rhs,
                BinaryOp::Sub => lhs - rhs,
                BinaryOp::Mul => lhs * rhs,
                BinaryOp::Sdiv => lhs.sdiv(rhs),
                BinaryOp::Slt => lhs.slt(rhs),
                BinaryOp::Sle => lhs.sle(rhs),
                BinaryOp::Eq => lhs.imm_eq(rhs),
                BinaryOp::Ne => lhs.imm_ne(rhs),
                BinaryOp::And => lhs & rhs,
                BinaryOp::Or => lhs | rhs,
                BinaryOp::Xor => lhs ^ rhs,
            })
        }

        InsnData::Arg { .. }
        | InsnData::Imm { .. }
        | InsnData::Load { .. }
        | InsnData::Store { .. }
        | InsnData::Call { .. }
        | InsnData::Jump { .. }
        | InsnData::Branch { .. }
        | InsnData::Return { .. }
        | InsnData::Phi { .. } => None,
    }
}

impl Immediate {
    pub(super) fn sdiv(self, rhs: Self) -> Self {
        self.apply_binop(rhs, |lhs, rhs| lhs.wrapping_div(rhs))
    }

    pub(super) fn slt(self, rhs: Self) -> Self {
        self.apply_binop_raw(rhs, |lhs, rhs| (lhs < rhs).into())
    }

    pub(super) fn sle(self, rhs: Self) -> Self {
        self.apply_binop_raw(rhs, |lhs, rhs| (lhs <= rhs).into())
    }

    pub(super) fn imm_eq(self, rhs: Self) -> Self {
        debug_assert_eq!(self.ty(), rhs.ty());

        (self == rhs).into()
    }

    pub(super) fn imm_ne(self, rhs: Self) -> Self {
        debug_assert_eq!(self.ty(), rhs.ty());

        (self != rhs).into()
    }

    pub(super) fn zero(ty: Type) -> Self {
        Self::from_i64(0, ty)
    }

    pub(super) fn is_zero(self) -> bool {
        self.as_i64() == 0
    }

    pub(super) fn is_one(self) -> bool {
        self.as_i64() == 1
    }

    fn apply_binop<F>(self, rhs: Self, f: F) -> Self
    where
        F: FnOnce(i64, i64) -> i64,
    {
        debug_assert_eq!(self.ty(), rhs.ty());

        let res = self.apply_binop_raw(rhs, f);
        Self::from_i64(res, self.ty())
    }

    fn apply_binop_raw<F, R>(self, rhs: Self, f: F) -> R
    where
        F: FnOnce(i64, i64) -> R,
    {
        debug_assert_eq!(self.ty(), rhs.ty());

        f(self.as_i64(), rhs.as_i64())
    }

    fn apply_unop<F>(self, f: F) -> Self
    where
        F: FnOnce(i64) -> i64,
    {
        Self::from_i64(f(self.as_i64()), self.ty())
    }
}

impl ops::Add for Immediate {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        self.apply_binop(rhs, |lhs, rhs| lhs.wrapping_add(rhs))
    }
}

impl ops::Sub for Immediate {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.apply_binop(rhs, |lhs, rhs| lhs.wrapping_sub(rhs))
    }
}

impl ops::Mul for Immediate {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        self.apply_binop(rhs, |lhs, rhs| lhs.wrapping_mul(rhs))
    }
}

impl ops::BitAnd for Immediate {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.apply_binop(rhs, ops::BitAnd::bitand)
    }
}

impl ops::BitOr for Immediate {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.apply_binop(rhs, ops::BitOr::bitor)
    }
}

impl ops::BitXor for Immediate {
    type Output = Self;

    fn bitxor(self, rhs: Self) -> Self {
        self.apply_binop(rhs, ops::BitXor::bitxor)
    }
}

impl ops::Not for Immediate {
    type Output = Self;

    fn not(self) -> Self {
        self.apply_unop(ops::Not::not)
    }
}

impl ops::Neg for Immediate {
    type Output = Self;

    fn neg(self) -> Self {
        self.apply_unop(|val| val.wrapping_neg())
    }
}
