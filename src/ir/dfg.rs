//! Data flow graph: instructions, their results and the def-use relation.

use std::collections::BTreeSet;

use cranelift_entity::{packed_option::PackedOption, PrimaryMap, SecondaryMap};
use smallvec::SmallVec;

use super::{Immediate, Insn, InsnData, Type, Value, ValueData};

/// An opaque reference to a basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Block(pub u32);
cranelift_entity::entity_impl!(Block);

/// A block data definition.
/// A block data doesn't hold any layout information, which is managed by
/// [`super::layout::Layout`].
#[derive(Debug, Default, Clone)]
pub struct BlockData {}

#[derive(Default, Debug)]
pub struct DataFlowGraph {
    blocks: PrimaryMap<Block, BlockData>,
    insns: PrimaryMap<Insn, InsnData>,
    values: PrimaryMap<Value, ValueData>,
    insn_results: SecondaryMap<Insn, PackedOption<Value>>,
    users: SecondaryMap<Value, BTreeSet<Insn>>,
}

impl DataFlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn make_block(&mut self) -> Block {
        self.blocks.push(BlockData::default())
    }

    pub fn make_insn(&mut self, data: InsnData) -> Insn {
        let insn = self.insns.push(data);
        self.attach_user(insn);
        insn
    }

    /// Allocates the result value of `insn`, if it produces one.
    pub fn make_result(&mut self, insn: Insn) -> Option<Value> {
        let ty = self.insns[insn].result_type(self)?;
        debug_assert!(self.insn_results[insn].is_none());
        let value = self.values.push(ValueData { insn, ty });
        self.insn_results[insn] = value.into();
        Some(value)
    }

    pub fn insn_data(&self, insn: Insn) -> &InsnData {
        &self.insns[insn]
    }

    pub fn insn_result(&self, insn: Insn) -> Option<Value> {
        self.insn_results[insn].expand()
    }

    pub fn value_insn(&self, value: Value) -> Insn {
        self.values[value].insn
    }

    pub fn value_ty(&self, value: Value) -> Type {
        self.values[value].ty
    }

    /// Returns the constant if `value` is defined by a constant instruction.
    pub fn value_imm(&self, value: Value) -> Option<Immediate> {
        match self.insns[self.values[value].insn] {
            InsnData::Imm { imm } => Some(imm),
            _ => None,
        }
    }

    /// Returns all instructions that use `value`.
    pub fn users(&self, value: Value) -> impl Iterator<Item = &Insn> {
        self.users[value].iter()
    }

    /// Returns the number of instructions that use `value`.
    pub fn users_num(&self, value: Value) -> usize {
        self.users[value].len()
    }

    /// Rewrites all uses of `value` to `alias`.
    pub fn change_to_alias(&mut self, value: Value, alias: Value) {
        let users = std::mem::take(&mut self.users[value]);
        for &insn in &users {
            for arg in self.insns[insn].args_mut() {
                if *arg == value {
                    *arg = alias;
                }
            }
            self.users[alias].insert(insn);
        }
    }

    /// Removes `insn` from the use lists of its arguments. Must be called
    /// before the instruction is dropped from the layout.
    pub fn untrack_insn(&mut self, insn: Insn) {
        let args: SmallVec<[Value; 4]> = self.insns[insn].args().iter().copied().collect();
        for arg in args {
            self.users[arg].remove(&insn);
        }
    }

    pub fn append_phi_arg(&mut self, insn: Insn, value: Value, block: Block) {
        self.insns[insn].append_phi_arg(value, block);
        self.users[value].insert(insn);
    }

    pub fn is_phi(&self, insn: Insn) -> bool {
        matches!(self.insns[insn], InsnData::Phi { .. })
    }

    pub fn is_terminator(&self, insn: Insn) -> bool {
        self.insns[insn].is_terminator()
    }

    pub fn has_side_effect(&self, insn: Insn) -> bool {
        self.insns[insn].has_side_effect()
    }

    pub fn is_movable(&self, insn: Insn) -> bool {
        self.insns[insn].is_movable()
    }

    pub fn branch_dests(&self, insn: Insn) -> &[Block] {
        self.insns[insn].branch_dests()
    }

    /// Returns `true` if every use of `old`'s result can legally be rewritten
    /// to `new`'s result.
    pub fn can_replace(&self, new: Insn, old: Insn) -> bool {
        match (self.insn_result(new), self.insn_result(old)) {
            (Some(new), Some(old)) => self.value_ty(new) == self.value_ty(old),
            (None, None) => true,
            _ => false,
        }
    }

    fn attach_user(&mut self, insn: Insn) {
        let args: SmallVec<[Value; 4]> = self.insns[insn].args().iter().copied().collect();
        for arg in args {
            self.users[arg].insert(insn);
        }
    }
}
