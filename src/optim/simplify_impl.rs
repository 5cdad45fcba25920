//! Algebraic simplification of a single instruction.

use crate::ir::{
    insn::{BinaryOp, UnaryOp},
    DataFlowGraph, Immediate, InsnData, Value,
};

/// The outcome of a successful simplification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimplifyResult {
    /// The instruction folds to an existing value.
    Value(Value),
    /// The instruction folds to a new, simpler instruction.
    Insn(InsnData),
}

/// Tries to simplify `insn_data`, treating two operands as interchangeable
/// when `same` says so. Callers pass plain identity while value numbers are
/// still in flux, and value number equality once they are stable.
pub(super) fn simplify_insn_data<F>(
    dfg: &DataFlowGraph,
    insn_data: &InsnData,
    same: F,
) -> Option<SimplifyResult>
where
    F: Fn(Value, Value) -> bool,
{
    match insn_data {
        InsnData::Unary { code, args } => simplify_unary(dfg, *code, args[0]),
        InsnData::Binary { code, args } => simplify_binary(dfg, *code, args[0], args[1], &same),
        InsnData::Phi { values, .. } => {
            let first = *values.first()?;
            if values.iter().all(|&value| same(value, first)) {
                Some(SimplifyResult::Value(first))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn simplify_unary(dfg: &DataFlowGraph, code: UnaryOp, arg: Value) -> Option<SimplifyResult> {
    // `not (not x)` and `neg (neg x)` are both `x`.
    match dfg.insn_data(dfg.value_insn(arg)) {
        InsnData::Unary { code: inner, args } if *inner == code => {
            Some(SimplifyResult::Value(args[0]))
        }
        _ => None,
    }
}

fn simplify_binary<F>(
    dfg: &DataFlowGraph,
    code: BinaryOp,
    lhs: Value,
    rhs: Value,
    same: &F,
) -> Option<SimplifyResult>
where
    F: Fn(Value, Value) -> bool,
{
    let ty = dfg.value_ty(lhs);
    let lhs_imm = dfg.value_imm(lhs);
    let rhs_imm = dfg.value_imm(rhs);

    match code {
        BinaryOp::Add => {
            if rhs_imm.is_some_and(Immediate::is_zero) {
                return Some(SimplifyResult::Value(lhs));
            }
            if lhs_imm.is_some_and(Immediate::is_zero) {
                return Some(SimplifyResult::Value(rhs));
            }
            None
        }

        BinaryOp::Sub => {
            if rhs_imm.is_some_and(Immediate::is_zero) {
                return Some(SimplifyResult::Value(lhs));
            }
            if same(lhs, rhs) {
                return Some(SimplifyResult::Insn(InsnData::Imm {
                    imm: Immediate::zero(ty),
                }));
            }
            None
        }

        BinaryOp::Mul => {
            if rhs_imm.is_some_and(Immediate::is_one) {
                return Some(SimplifyResult::Value(lhs));
            }
            if lhs_imm.is_some_and(Immediate::is_one) {
                return Some(SimplifyResult::Value(rhs));
            }
            if rhs_imm.is_some_and(Immediate::is_zero) || lhs_imm.is_some_and(Immediate::is_zero) {
                return Some(SimplifyResult::Insn(InsnData::Imm {
                    imm: Immediate::zero(ty),
                }));
            }
            None
        }

        BinaryOp::And | BinaryOp::Or => {
            if same(lhs, rhs) {
                return Some(SimplifyResult::Value(lhs));
            }
            None
        }

        BinaryOp::Xor => {
            if same(lhs, rhs) {
                return Some(SimplifyResult::Insn(InsnData::Imm {
                    imm: Immediate::zero(ty),
                }));
            }
            None
        }

        BinaryOp::Eq | BinaryOp::Sle => {
            if same(lhs, rhs) {
                return Some(SimplifyResult::Insn(InsnData::Imm {
                    imm: Immediate::I1(true),
                }));
            }
            None
        }

        BinaryOp::Ne | BinaryOp::Slt => {
            if same(lhs, rhs) {
                return Some(SimplifyResult::Insn(InsnData::Imm {
                    imm: Immediate::I1(false),
                }));
            }
            None
        }

        BinaryOp::Sdiv => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBuilder, Signature, Type};

    #[test]
    fn binary_identities() {
        let mut builder = FunctionBuilder::new("test_func", Signature::new(&[Type::I32], &[]));
        let entry = builder.append_block();
        builder.switch_to_block(entry);
        let a = builder.arg(0);
        let zero = builder.make_imm_value(0i32);
        let one = builder.make_imm_value(1i32);
        builder.ret(None);
        let func = builder.build();

        let same = |lhs: Value, rhs: Value| lhs == rhs;

        assert_eq!(
            simplify_insn_data(&func.dfg, &InsnData::binary(BinaryOp::Add, a, zero), same),
            Some(SimplifyResult::Value(a))
        );
        assert_eq!(
            simplify_insn_data(&func.dfg, &InsnData::binary(BinaryOp::Mul, one, a), same),
            Some(SimplifyResult::Value(a))
        );
        assert_eq!(
            simplify_insn_data(&func.dfg, &InsnData::binary(BinaryOp::Sub, a, a), same),
            Some(SimplifyResult::Insn(InsnData::Imm {
                imm: Immediate::I32(0)
            }))
        );
        assert_eq!(
            simplify_insn_data(&func.dfg, &InsnData::binary(BinaryOp::Sle, a, a), same),
            Some(SimplifyResult::Insn(InsnData::Imm {
                imm: Immediate::I1(true)
            }))
        );
        assert_eq!(
            simplify_insn_data(&func.dfg, &InsnData::binary(BinaryOp::Add, a, one), same),
            None
        );
    }

    #[test]
    fn double_negation() {
        let mut builder = FunctionBuilder::new("test_func", Signature::new(&[Type::I32], &[]));
        let entry = builder.append_block();
        builder.switch_to_block(entry);
        let a = builder.arg(0);
        let neg = builder.unary(UnaryOp::Neg, a);
        builder.ret(None);
        let func = builder.build();

        assert_eq!(
            simplify_insn_data(
                &func.dfg,
                &InsnData::unary(UnaryOp::Neg, neg),
                |lhs, rhs| lhs == rhs
            ),
            Some(SimplifyResult::Value(a))
        );
    }
}
