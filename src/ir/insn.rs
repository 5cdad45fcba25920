//! Instruction definitions.

use std::fmt;

use smallvec::SmallVec;

use super::{Block, DataFlowGraph, Immediate, Type, Value};

/// An opaque reference to [`InsnData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Insn(pub u32);
cranelift_entity::entity_impl!(Insn);

/// An instruction data definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsnData {
    /// Function argument.
    Arg { idx: usize, ty: Type },

    /// Compile time constant.
    Imm { imm: Immediate },

    /// Unary instructions.
    Unary { code: UnaryOp, args: [Value; 1] },

    /// Binary instructions.
    Binary { code: BinaryOp, args: [Value; 2] },

    /// Load a value from memory.
    Load { args: [Value; 1], ty: Type },

    /// Store a value to memory.
    Store { args: [Value; 2] },

    /// Call an external function.
    Call {
        callee: u32,
        args: SmallVec<[Value; 4]>,
        ret_ty: Type,
    },

    /// Unconditional jump instruction.
    Jump { dests: [Block; 1] },

    /// Conditional jump instruction.
    Branch { args: [Value; 1], dests: [Block; 2] },

    /// Return.
    Return { args: Option<Value> },

    /// Phi function.
    Phi {
        values: SmallVec<[Value; 8]>,
        blocks: SmallVec<[Block; 8]>,
        ty: Type,
    },
}

impl InsnData {
    pub fn unary(code: UnaryOp, lhs: Value) -> Self {
        Self::Unary { code, args: [lhs] }
    }

    pub fn binary(code: BinaryOp, lhs: Value, rhs: Value) -> Self {
        Self::Binary {
            code,
            args: [lhs, rhs],
        }
    }

    pub fn jump(dest: Block) -> Self {
        Self::Jump { dests: [dest] }
    }

    pub fn phi(ty: Type) -> Self {
        Self::Phi {
            values: SmallVec::new(),
            blocks: SmallVec::new(),
            ty,
        }
    }

    pub fn args(&self) -> &[Value] {
        match self {
            Self::Binary { args, .. } | Self::Store { args, .. } => args,
            Self::Unary { args, .. } | Self::Load { args, .. } | Self::Branch { args, .. } => args,
            Self::Call { args, .. } => args,
            Self::Phi { values, .. } => values,
            Self::Return { args } => args.as_slice(),
            Self::Arg { .. } | Self::Imm { .. } | Self::Jump { .. } => &[],
        }
    }

    pub fn args_mut(&mut self) -> &mut [Value] {
        match self {
            Self::Binary { args, .. } | Self::Store { args, .. } => args,
            Self::Unary { args, .. } | Self::Load { args, .. } | Self::Branch { args, .. } => args,
            Self::Call { args, .. } => args,
            Self::Phi { values, .. } => values,
            Self::Return { args } => args.as_mut_slice(),
            Self::Arg { .. } | Self::Imm { .. } | Self::Jump { .. } => &mut [],
        }
    }

    pub fn branch_dests(&self) -> &[Block] {
        match self {
            Self::Jump { dests } => dests,
            Self::Branch { dests, .. } => dests,
            _ => &[],
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Self::Jump { .. } | Self::Branch { .. } | Self::Return { .. }
        )
    }

    pub fn has_side_effect(&self) -> bool {
        // We assume `Load` has side effect because it may cause trap.
        matches!(
            self,
            Self::Load { .. } | Self::Store { .. } | Self::Call { .. } | Self::Return { .. }
        )
    }

    /// Returns `true` if relocating the instruction preserves program
    /// semantics.
    pub fn is_movable(&self) -> bool {
        matches!(
            self,
            Self::Arg { .. } | Self::Imm { .. } | Self::Unary { .. } | Self::Binary { .. }
        )
    }

    pub fn append_phi_arg(&mut self, value: Value, block: Block) {
        match self {
            Self::Phi { values, blocks, .. } => {
                values.push(value);
                blocks.push(block)
            }
            _ => panic!("expects `InsnData::Phi` but got `{:?}`", self),
        }
    }

    pub(crate) fn result_type(&self, dfg: &DataFlowGraph) -> Option<Type> {
        match self {
            Self::Arg { ty, .. } => Some(*ty),
            Self::Imm { imm } => Some(imm.ty()),
            Self::Unary { args, .. } => Some(dfg.value_ty(args[0])),
            Self::Binary { code, args } => Some(code.result_type(dfg, args)),
            Self::Load { ty, .. } => Some(*ty),
            Self::Call { ret_ty, .. } => Some(*ret_ty),
            Self::Phi { ty, .. } => Some(*ty),
            Self::Store { .. } | Self::Jump { .. } | Self::Branch { .. } | Self::Return { .. } => {
                None
            }
        }
    }
}

/// Unary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    Neg,
}

impl UnaryOp {
    pub(super) fn as_str(self) -> &'static str {
        match self {
            Self::Not => "not",
            Self::Neg => "neg",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Sdiv,
    Slt,
    Sle,
    Eq,
    Ne,
    And,
    Or,
    Xor,
}

impl BinaryOp {
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            Self::Add | Self::Mul | Self::Eq | Self::Ne | Self::And | Self::Or | Self::Xor
        )
    }

    pub(super) fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Sdiv => "sdiv",
            Self::Slt => "slt",
            Self::Sle => "sle",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
        }
    }

    fn result_type(self, dfg: &DataFlowGraph, args: &[Value; 2]) -> Type {
        if self.is_cmp() {
            Type::I1
        } else {
            dfg.value_ty(args[0])
        }
    }

    fn is_cmp(self) -> bool {
        matches!(self, Self::Slt | Self::Sle | Self::Eq | Self::Ne)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
