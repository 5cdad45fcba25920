//! Global value numbering and dominator-based redundant code elimination.
//!
//! Value numbers are computed with an SCC-style congruence partition after
//! Cooper & Simpson: either a single pessimistic sweep in which every
//! definition starts in its own class, or an optimistic worklist fixpoint in
//! which loop-carried definitions start congruent and classes are split as
//! evidence accumulates. A dominator tree pre-order walk then removes every
//! movable, effect-free definition that recomputes a value already available
//! from a dominating definition.

use cranelift_entity::{packed_option::PackedOption, SecondaryMap};
use log::{debug, trace};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{
    domtree::DomTree,
    ir::{
        insn::{BinaryOp, UnaryOp},
        Block, DataFlowGraph, Function, Immediate, Insn, InsnData, Value,
    },
};

use super::{
    constant_folding,
    simplify_impl::{simplify_insn_data, SimplifyResult},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("out of memory")]
    OutOfMemory,
}

/// Congruence discovery strategy, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// One sweep over the graph. Every definition is its own congruence
    /// class seed, so loop-carried equivalences are never discovered.
    Pessimistic,
    /// Worklist iteration to a fixpoint. Definitions whose operands have not
    /// been numbered yet compare equal, which lets congruent loop phis merge.
    Optimistic,
}

/// Per-definition numbering state. `class_prev`/`class_next` form an
/// unordered doubly linked list over all definitions currently believed
/// equivalent; the list head is the class representative.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
struct ValueNumberData {
    value_number: u32,
    class_prev: PackedOption<Insn>,
    class_next: PackedOption<Insn>,
}

/// The reprocessing set of the optimistic fixpoint.
#[derive(Default, Debug)]
struct WorkQueue {
    in_queue: SecondaryMap<Insn, bool>,
    len: usize,
}

impl WorkQueue {
    fn insert(&mut self, insn: Insn) {
        if !self.in_queue[insn] {
            self.in_queue[insn] = true;
            self.len += 1;
        }
    }

    fn remove(&mut self, insn: Insn) {
        if self.in_queue[insn] {
            self.in_queue[insn] = false;
            self.len -= 1;
        }
    }

    fn contains(&self, insn: Insn) -> bool {
        self.in_queue[insn]
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn clear(&mut self) {
        self.in_queue.clear();
        self.len = 0;
    }
}

/// Structural signature a definition is congruent under: operator kind plus
/// operand value numbers. The key is a snapshot; when operand numbers change
/// the definition is simply looked up again under its new key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ValueKey {
    Arg(u32),
    Imm(Immediate),
    Unary(UnaryOp, [u32; 1]),
    Binary(BinaryOp, [u32; 2]),
    Phi(Block, SmallVec<[(Block, u32); 8]>),
    /// Effectful definitions are only ever congruent to themselves.
    Opaque(Insn),
}

/// Hash table with an optional capacity ceiling. Running into the ceiling
/// surfaces as `Error::OutOfMemory` and fails the whole pass.
#[derive(Debug)]
struct BoundedMap<K, V> {
    map: FxHashMap<K, V>,
    limit: Option<usize>,
}

impl<K, V> BoundedMap<K, V>
where
    K: Eq + std::hash::Hash,
{
    fn new(limit: Option<usize>) -> Self {
        Self {
            map: FxHashMap::default(),
            limit,
        }
    }

    fn get(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    fn insert(&mut self, key: K, value: V) -> Result<(), Error> {
        if !self.map.contains_key(&key) && self.is_full() {
            return Err(Error::OutOfMemory);
        }
        self.map.insert(key, value);
        Ok(())
    }

    /// Inserts only when the key is unbound; an existing binding wins.
    fn insert_if_absent(&mut self, key: K, value: V) -> Result<(), Error> {
        if self.map.contains_key(&key) {
            return Ok(());
        }
        if self.is_full() {
            return Err(Error::OutOfMemory);
        }
        self.map.insert(key, value);
        Ok(())
    }

    fn is_full(&self) -> bool {
        self.limit.is_some_and(|limit| self.map.len() >= limit)
    }

    fn clear(&mut self) {
        self.map.clear();
    }
}

#[derive(Debug, Clone, Copy)]
struct TableEntry {
    owner: Insn,
    number: u32,
}

pub struct ValueNumberer {
    mode: Mode,
    values: BoundedMap<ValueKey, TableEntry>,
    data: SecondaryMap<Insn, ValueNumberData>,
    work: WorkQueue,
    dominating_limit: Option<usize>,
}

impl ValueNumberer {
    pub fn new(mode: Mode) -> Self {
        Self::with_limits(mode, None, None)
    }

    /// `value_limit` bounds the congruence table and `dominating_limit` the
    /// transient dominating-definition table of the elimination walk.
    pub fn with_limits(
        mode: Mode,
        value_limit: Option<usize>,
        dominating_limit: Option<usize>,
    ) -> Self {
        Self {
            mode,
            values: BoundedMap::new(value_limit),
            data: SecondaryMap::default(),
            work: WorkQueue::default(),
            dominating_limit,
        }
    }

    /// Runs value numbering followed by redundant code elimination. On
    /// failure the graph is left in whatever partially processed state it
    /// had reached; the caller is expected to fall back to unoptimized code.
    pub fn analyze(&mut self, func: &mut Function, domtree: &DomTree) -> Result<(), Error> {
        self.compute_value_numbers(func, domtree)?;
        self.eliminate_redundancies(func, domtree)
    }

    /// Returns the value number of `insn`, 0 if it has not been assigned.
    /// Equal non-zero numbers imply the definitions compute the same value.
    pub fn value_number(&self, insn: Insn) -> u32 {
        self.data[insn].value_number
    }

    pub fn compute_value_numbers(
        &mut self,
        func: &mut Function,
        domtree: &DomTree,
    ) -> Result<(), Error> {
        self.values.clear();
        self.data.clear();
        self.work.clear();

        match self.mode {
            Mode::Pessimistic => {
                // Every definition seeds its own class.
                for &block in domtree.rpo() {
                    for insn in func.layout.iter_insn(block) {
                        if !func.dfg.is_terminator(insn) {
                            self.data[insn].value_number = Self::identity(insn);
                        }
                    }
                }
            }
            Mode::Optimistic => {
                if let Some(entry) = func.layout.entry_block() {
                    self.mark_block(func, entry);
                }
                if let Some(osr_entry) = func.osr_entry {
                    self.mark_block(func, osr_entry);
                }
            }
        }

        loop {
            for block_idx in 0..domtree.rpo().len() {
                let block = domtree.rpo()[block_idx];
                self.visit_block(func, block)?;
            }

            if self.mode == Mode::Pessimistic || self.work.is_empty() {
                break;
            }
        }

        if cfg!(debug_assertions) {
            debug_assert!(self.work.is_empty());
            for &block in domtree.rpo() {
                for insn in func.layout.iter_insn(block) {
                    debug_assert!(
                        func.dfg.is_terminator(insn) || self.value_number(insn) != 0,
                        "definition left without a value number"
                    );
                }
            }
        }

        Ok(())
    }

    /// Runs the elimination walk alone. Requires a preceding successful
    /// `compute_value_numbers` on the same graph.
    pub fn eliminate_redundancies(
        &mut self,
        func: &mut Function,
        domtree: &DomTree,
    ) -> Result<(), Error> {
        let limit = self.dominating_limit;
        RedundancyEliminator::new(self, limit).run(func, domtree)
    }

    fn visit_block(&mut self, func: &mut Function, block: Block) -> Result<(), Error> {
        let mut next_insn = func.layout.first_insn_of(block);
        while let Some(insn) = next_insn {
            if func.dfg.is_terminator(insn) {
                // Terminators bypass the table: they get their identity as
                // value number and propagate reachability to successors.
                if self.work.contains(insn) {
                    self.work.remove(insn);
                    if self.data[insn].value_number == 0 {
                        self.data[insn].value_number = Self::identity(insn);
                        let dests: SmallVec<[Block; 2]> =
                            func.dfg.branch_dests(insn).iter().copied().collect();
                        for dest in dests {
                            self.mark_block(func, dest);
                        }
                    }
                }
                next_insn = func.layout.next_insn_of(insn);
                continue;
            }

            if !self.is_marked(insn) {
                next_insn = func.layout.next_insn_of(insn);
                continue;
            }
            self.unmark_definition(insn);

            if self.simplify(func, insn, false)?.is_some() {
                // The fold redirected all uses; a fresh replacement sits
                // right after `insn` and is picked up next.
                next_insn = func.layout.next_insn_of(insn);
                func.dfg.untrack_insn(insn);
                func.layout.remove_insn(insn);
                continue;
            }

            let old_number = self.data[insn].value_number;
            let number = self.lookup_value(func, insn)?;
            debug_assert_ne!(number, 0);
            if old_number != number {
                trace!("insn{} gets value number {}", insn.as_u32(), number);
                self.data[insn].value_number = number;
                self.mark_consumers(func, insn);
            }

            next_insn = func.layout.next_insn_of(insn);
        }

        Ok(())
    }

    /// Tries to fold `insn`. On success the replacement has taken over all
    /// of `insn`'s uses and the caller must unlink `insn` from its block.
    fn simplify(
        &mut self,
        func: &mut Function,
        insn: Insn,
        use_value_numbers: bool,
    ) -> Result<Option<Insn>, Error> {
        if func.dfg.has_side_effect(insn) {
            return Ok(None);
        }

        let data = func.dfg.insn_data(insn).clone();
        let folded = match constant_folding::fold_constant(&func.dfg, &data) {
            Some(imm) => Some(SimplifyResult::Insn(InsnData::Imm { imm })),
            None => {
                let numberer = &*self;
                let dfg = &func.dfg;
                simplify_insn_data(dfg, &data, |lhs, rhs| {
                    if use_value_numbers {
                        numberer.congruent_values(dfg, lhs, rhs)
                    } else {
                        lhs == rhs
                    }
                })
            }
        };
        let Some(folded) = folded else {
            return Ok(None);
        };

        let (replacement, replacement_value, unattached) = match folded {
            SimplifyResult::Value(value) => (func.dfg.value_insn(value), value, false),
            SimplifyResult::Insn(new_data) => {
                // A phi only ever folds to one of its own inputs.
                debug_assert!(!matches!(data, InsnData::Phi { .. }));
                let new_insn = func.dfg.make_insn(new_data);
                let new_value = func
                    .dfg
                    .make_result(new_insn)
                    .expect("fold produced a valueless instruction");
                (new_insn, new_value, true)
            }
        };

        if replacement == insn || !func.dfg.can_replace(replacement, insn) {
            return Ok(None);
        }

        if unattached {
            // Brand-new nodes go right after the original and get a number
            // of their own immediately.
            func.layout.insert_insn_after(replacement, insn);
            let number = self.lookup_value(func, replacement)?;
            self.data[replacement].value_number = number;
        }

        trace!("folded insn{} to insn{}", insn.as_u32(), replacement.as_u32());

        if let Some(old_value) = func.dfg.insn_result(insn) {
            func.dfg.change_to_alias(old_value, replacement_value);
        }

        Ok(Some(replacement))
    }

    /// Looks `insn` up under its current structural key. A hit re-joins the
    /// key owner's congruence class; a miss starts a fresh class keyed by
    /// `insn`'s identity.
    fn lookup_value(&mut self, func: &Function, insn: Insn) -> Result<u32, Error> {
        let key = self.value_key(func, insn);
        if let Some(&entry) = self.values.get(&key) {
            self.set_class(insn, entry.owner);
            Ok(entry.number)
        } else {
            let number = Self::identity(insn);
            self.values.insert(key, TableEntry { owner: insn, number })?;
            self.break_class(func, insn)?;
            Ok(number)
        }
    }

    fn value_key(&self, func: &Function, insn: Insn) -> ValueKey {
        let data = func.dfg.insn_data(insn);
        if data.has_side_effect() {
            return ValueKey::Opaque(insn);
        }

        match data {
            InsnData::Arg { idx, .. } => ValueKey::Arg(*idx as u32),
            InsnData::Imm { imm } => ValueKey::Imm(*imm),
            InsnData::Unary { code, args } => {
                ValueKey::Unary(*code, [self.operand_number(func, args[0])])
            }
            InsnData::Binary { code, args } => {
                let mut numbers = [
                    self.operand_number(func, args[0]),
                    self.operand_number(func, args[1]),
                ];
                if code.is_commutative() && numbers[1] < numbers[0] {
                    numbers.swap(0, 1);
                }
                ValueKey::Binary(*code, numbers)
            }
            InsnData::Phi { values, blocks, .. } => {
                // Keyed by owning block: phis of different joins never merge.
                let block = func.layout.insn_block(insn);
                let mut incoming: SmallVec<[(Block, u32); 8]> = blocks
                    .iter()
                    .zip(values.iter())
                    .map(|(&block, &value)| (block, self.operand_number(func, value)))
                    .collect();
                incoming.sort_unstable();
                ValueKey::Phi(block, incoming)
            }
            _ => ValueKey::Opaque(insn),
        }
    }

    /// Value number of the definition of `value`. 0 ("not yet known") makes
    /// unprocessed operands compare equal, which is what lets the optimistic
    /// pass seed loop phis as congruent.
    fn operand_number(&self, func: &Function, value: Value) -> u32 {
        self.data[func.dfg.value_insn(value)].value_number
    }

    fn congruent_values(&self, dfg: &DataFlowGraph, lhs: Value, rhs: Value) -> bool {
        if lhs == rhs {
            return true;
        }
        let lhs_number = self.data[dfg.value_insn(lhs)].value_number;
        lhs_number != 0 && lhs_number == self.data[dfg.value_insn(rhs)].value_number
    }

    /// Identity seed of a definition. Offset by one so that 0 stays reserved
    /// for "unassigned".
    fn identity(insn: Insn) -> u32 {
        insn.as_u32() + 1
    }

    /// Splices `def` into `rep`'s congruence class, right after `rep`.
    fn set_class(&mut self, def: Insn, rep: Insn) {
        if def == rep {
            return;
        }
        trace!("insn{} joins the class of insn{}", def.as_u32(), rep.as_u32());

        let prev = self.data[def].class_prev;
        let next = self.data[def].class_next;
        if let Some(prev) = prev.expand() {
            self.data[prev].class_next = next;
        }
        if let Some(next) = next.expand() {
            self.data[next].class_prev = prev;
        }

        let rep_next = self.data[rep].class_next;
        self.data[def].class_prev = rep.into();
        self.data[def].class_next = rep_next;
        if let Some(rep_next) = rep_next.expand() {
            self.data[rep_next].class_prev = def.into();
        }
        self.data[rep].class_next = def.into();
    }

    /// Removes `def` from its congruence class. If `def` led a multi-member
    /// class, the next member takes over: it is re-keyed into the table and
    /// the remaining members are renumbered to it.
    fn break_class(&mut self, func: &Function, def: Insn) -> Result<(), Error> {
        if self.data[def].value_number == Self::identity(def) {
            debug_assert!(self.data[def].class_prev.is_none());
            let Some(new_rep) = self.data[def].class_next.expand() else {
                return Ok(());
            };
            trace!(
                "breaking the class of insn{}, insn{} takes over",
                def.as_u32(),
                new_rep.as_u32()
            );

            self.data[def].class_next = PackedOption::default();
            self.data[new_rep].class_prev = PackedOption::default();

            let number = Self::identity(new_rep);
            let key = self.value_key(func, new_rep);
            self.values.insert_if_absent(
                key,
                TableEntry {
                    owner: new_rep,
                    number,
                },
            )?;

            // The new representative is renumbered like any other member. A
            // queued member keeps its old number until it is reprocessed, so
            // the lookup there still observes the change and marks its
            // consumers.
            let mut member = Some(new_rep);
            while let Some(current) = member {
                member = self.data[current].class_next.expand();
                if self.work.contains(current) {
                    continue;
                }
                self.data[current].value_number = number;
                self.mark_consumers(func, current);
            }
        } else {
            let prev = self.data[def].class_prev;
            let next = self.data[def].class_next;
            if let Some(prev) = prev.expand() {
                self.data[prev].class_next = next;
            }
            if let Some(next) = next.expand() {
                self.data[next].class_prev = prev;
            }
            self.data[def].class_prev = PackedOption::default();
            self.data[def].class_next = PackedOption::default();
        }

        Ok(())
    }

    fn is_marked(&self, insn: Insn) -> bool {
        self.mode == Mode::Pessimistic || self.work.contains(insn)
    }

    fn mark_definition(&mut self, insn: Insn) {
        if self.mode == Mode::Optimistic && !self.work.contains(insn) {
            trace!("marking insn{}", insn.as_u32());
            self.work.insert(insn);
        }
    }

    fn unmark_definition(&mut self, insn: Insn) {
        if self.mode == Mode::Optimistic && self.work.contains(insn) {
            trace!("unmarking insn{}", insn.as_u32());
            self.work.remove(insn);
        }
    }

    fn mark_block(&mut self, func: &Function, block: Block) {
        for insn in func.layout.iter_insn(block) {
            self.mark_definition(insn);
        }
    }

    /// Queues every user of `insn`'s result for reprocessing.
    fn mark_consumers(&mut self, func: &Function, insn: Insn) {
        if self.mode == Mode::Pessimistic {
            return;
        }
        debug_assert!(!self.work.contains(insn));
        debug_assert!(!func.dfg.is_terminator(insn));

        let Some(result) = func.dfg.insn_result(insn) else {
            return;
        };
        let users: SmallVec<[Insn; 8]> = func.dfg.users(result).copied().collect();
        for user in users {
            self.mark_definition(user);
        }
    }
}

/// A dominating definition and the pre-order position up to which its
/// dominance reach extends (inclusive).
#[derive(Debug, Clone, Copy)]
struct DominatingValue {
    def: Insn,
    valid_until: usize,
}

/// The dominator tree pre-order walk. Holds the transient value-number to
/// dominating-definition table; the table dies with the walk.
struct RedundancyEliminator<'a> {
    numberer: &'a mut ValueNumberer,
    defs: BoundedMap<u32, DominatingValue>,
}

impl<'a> RedundancyEliminator<'a> {
    fn new(numberer: &'a mut ValueNumberer, limit: Option<usize>) -> Self {
        Self {
            numberer,
            defs: BoundedMap::new(limit),
        }
    }

    fn run(&mut self, func: &mut Function, domtree: &DomTree) -> Result<(), Error> {
        // Every root of the dominator forest seeds the walk; children are
        // pushed as their parent is visited, so each subtree occupies a
        // contiguous run of pre-order positions.
        let mut worklist: Vec<Block> = domtree
            .rpo()
            .iter()
            .rev()
            .copied()
            .filter(|&block| domtree.is_self_dominating(block))
            .collect();

        let mut index = 0;
        while let Some(block) = worklist.pop() {
            trace!("eliminating redundancies in block{}", block.as_u32());
            worklist.extend_from_slice(domtree.children_of(block));
            self.visit_block(func, domtree, block, index)?;
            index += 1;
        }

        debug_assert_eq!(index, domtree.rpo().len(), "dominator walk missed blocks");
        Ok(())
    }

    fn visit_block(
        &mut self,
        func: &mut Function,
        domtree: &DomTree,
        block: Block,
        index: usize,
    ) -> Result<(), Error> {
        let mut next_insn = func.layout.first_insn_of(block);
        while let Some(insn) = next_insn {
            if func.dfg.is_terminator(insn) {
                next_insn = func.layout.next_insn_of(insn);
                continue;
            }

            if self.numberer.simplify(func, insn, true)?.is_some() {
                next_insn = func.layout.next_insn_of(insn);
                func.dfg.untrack_insn(insn);
                func.layout.remove_insn(insn);
                continue;
            }

            // Equal value numbers never justify moving an effect.
            if !func.dfg.is_movable(insn) || func.dfg.has_side_effect(insn) {
                next_insn = func.layout.next_insn_of(insn);
                continue;
            }

            let dom = self.find_dominating_def(func, domtree, insn, index)?;
            if dom == insn || !func.dfg.can_replace(dom, insn) {
                next_insn = func.layout.next_insn_of(insn);
                continue;
            }

            debug!(
                "insn{} is redundant with dominating insn{}",
                insn.as_u32(),
                dom.as_u32()
            );

            if let (Some(old_value), Some(dom_value)) =
                (func.dfg.insn_result(insn), func.dfg.insn_result(dom))
            {
                func.dfg.change_to_alias(old_value, dom_value);
                debug_assert_eq!(func.dfg.users_num(old_value), 0);
            }

            next_insn = func.layout.next_insn_of(insn);
            func.dfg.untrack_insn(insn);
            func.layout.remove_insn(insn);
        }

        Ok(())
    }

    /// Returns the definition that dominates `insn` with the same value
    /// number, installing `insn` itself when no recorded definition still
    /// covers this pre-order position.
    fn find_dominating_def(
        &mut self,
        func: &Function,
        domtree: &DomTree,
        insn: Insn,
        index: usize,
    ) -> Result<Insn, Error> {
        let number = self.numberer.value_number(insn);
        debug_assert_ne!(number, 0);

        match self.defs.get(&number).copied() {
            Some(stored) if stored.valid_until >= index => {
                debug_assert!(domtree.dominates(
                    func.layout.insn_block(stored.def),
                    func.layout.insn_block(insn)
                ));
                Ok(stored.def)
            }
            _ => {
                let block = func.layout.insn_block(insn);
                let valid_until = index + domtree.num_dominated(block);
                self.defs.insert(
                    number,
                    DominatingValue {
                        def: insn,
                        valid_until,
                    },
                )?;
                Ok(insn)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        cfg::ControlFlowGraph,
        ir::{FunctionBuilder, Signature, Type},
    };

    fn domtree_of(func: &Function) -> DomTree {
        let mut cfg = ControlFlowGraph::new();
        cfg.compute(func);
        let mut domtree = DomTree::new();
        domtree.compute(&cfg);
        domtree
    }

    fn run(func: &mut Function, mode: Mode) -> ValueNumberer {
        let domtree = domtree_of(func);
        let mut numberer = ValueNumberer::new(mode);
        numberer.analyze(func, &domtree).unwrap();
        numberer
    }

    fn block_insns(func: &Function, block: Block) -> Vec<Insn> {
        func.layout.iter_insn(block).collect()
    }

    fn insn_count(func: &Function) -> usize {
        func.layout
            .iter_block()
            .map(|block| func.layout.iter_insn(block).count())
            .sum()
    }

    #[test]
    fn dominated_common_subexpression() {
        let mut builder = FunctionBuilder::new(
            "test_func",
            Signature::new(&[Type::I32, Type::I32], &[Type::I32]),
        );
        let b1 = builder.append_block();
        let b2 = builder.append_block();

        builder.switch_to_block(b1);
        let a = builder.arg(0);
        let b = builder.arg(1);
        let x = builder.binary(BinaryOp::Add, a, b);
        builder.jump(b2);

        builder.switch_to_block(b2);
        let y = builder.binary(BinaryOp::Add, a, b);
        builder.ret(Some(y));

        let mut func = builder.build();
        let numberer = run(&mut func, Mode::Pessimistic);

        let x_insn = func.dfg.value_insn(x);
        let y_insn = func.dfg.value_insn(y);
        assert_eq!(numberer.value_number(x_insn), numberer.value_number(y_insn));

        // The recomputation is gone and the return reads `x` instead.
        let insns = block_insns(&func, b2);
        assert_eq!(insns.len(), 1);
        assert_eq!(func.dfg.insn_data(insns[0]).args(), &[x]);
        assert!(!func.layout.is_insn_inserted(y_insn));
    }

    #[test]
    fn commutative_operands_unify() {
        let mut builder = FunctionBuilder::new(
            "test_func",
            Signature::new(&[Type::I32, Type::I32], &[Type::I32]),
        );
        let entry = builder.append_block();

        builder.switch_to_block(entry);
        let a = builder.arg(0);
        let b = builder.arg(1);
        let x = builder.binary(BinaryOp::Mul, a, b);
        let y = builder.binary(BinaryOp::Mul, b, a);
        let z = builder.binary(BinaryOp::Sub, a, b);
        let w = builder.binary(BinaryOp::Sub, b, a);
        builder.ret(Some(y));

        let mut func = builder.build();
        let numberer = run(&mut func, Mode::Pessimistic);
        let vn = |value| numberer.value_number(func.dfg.value_insn(value));

        assert_eq!(vn(x), vn(y));
        assert_ne!(vn(z), vn(w));
        assert!(!func.layout.is_insn_inserted(func.dfg.value_insn(y)));
        assert!(func.layout.is_insn_inserted(func.dfg.value_insn(w)));
    }

    fn build_counting_loop() -> (Function, [Block; 4], [Value; 4]) {
        let mut builder = FunctionBuilder::new(
            "test_func",
            Signature::new(&[Type::I32, Type::I1], &[Type::I32]),
        );
        let entry = builder.append_block();
        let header = builder.append_block();
        let body = builder.append_block();
        let exit = builder.append_block();

        builder.switch_to_block(entry);
        let init = builder.arg(0);
        let cond = builder.arg(1);
        let one = builder.make_imm_value(1i32);
        builder.jump(header);

        builder.switch_to_block(header);
        let i = builder.phi(Type::I32, &[(init, entry)]);
        let k = builder.phi(Type::I32, &[(init, entry)]);
        builder.br(cond, body, exit);

        builder.switch_to_block(body);
        let x = builder.binary(BinaryOp::Add, i, one);
        let y = builder.binary(BinaryOp::Add, k, one);
        builder.append_phi_arg(i, x, body);
        builder.append_phi_arg(k, y, body);
        builder.jump(header);

        builder.switch_to_block(exit);
        builder.ret(Some(i));

        (builder.build(), [entry, header, body, exit], [i, k, x, y])
    }

    #[test]
    fn loop_phis_merge_optimistically() {
        let (mut func, [_, header, body, _], [i, k, x, y]) = build_counting_loop();
        let numberer = run(&mut func, Mode::Optimistic);
        let vn = |value| numberer.value_number(func.dfg.value_insn(value));

        // The two counters are loop-carried copies of each other.
        assert_eq!(vn(i), vn(k));
        assert_eq!(vn(x), vn(y));

        // Phis are not movable and survive, but the body keeps a single
        // increment that now feeds both of them.
        assert_eq!(block_insns(&func, header).len(), 3);
        let body_insns = block_insns(&func, body);
        assert_eq!(body_insns.len(), 2);
        assert_eq!(body_insns[0], func.dfg.value_insn(x));
        assert!(func.dfg.insn_data(func.dfg.value_insn(k)).args().contains(&x));
    }

    #[test]
    fn loop_phis_stay_distinct_pessimistically() {
        let (mut func, [_, header, body, _], [i, k, x, y]) = build_counting_loop();
        let numberer = run(&mut func, Mode::Pessimistic);
        let vn = |value| numberer.value_number(func.dfg.value_insn(value));

        // Back-edge operands keep their identity seeds, so nothing merges.
        assert_ne!(vn(i), vn(k));
        assert_ne!(vn(x), vn(y));
        assert_eq!(block_insns(&func, header).len(), 3);
        assert_eq!(block_insns(&func, body).len(), 3);
    }

    #[test]
    fn class_split_renumbers_downstream_users() {
        let mut builder = FunctionBuilder::new(
            "test_func",
            Signature::new(&[Type::I32, Type::I1], &[Type::I32]),
        );
        let entry = builder.append_block();
        let header = builder.append_block();
        let body = builder.append_block();
        let latch = builder.append_block();
        let exit = builder.append_block();

        builder.switch_to_block(entry);
        let init = builder.arg(0);
        let cond = builder.arg(1);
        let one = builder.make_imm_value(1i32);
        let two = builder.make_imm_value(2i32);
        builder.jump(header);

        builder.switch_to_block(header);
        let p = builder.phi(Type::I32, &[(init, entry)]);
        let q = builder.phi(Type::I32, &[(init, entry)]);
        builder.br(cond, body, exit);

        builder.switch_to_block(body);
        let xp = builder.binary(BinaryOp::Add, p, one);
        builder.jump(latch);

        builder.switch_to_block(latch);
        let xq = builder.binary(BinaryOp::Add, q, two);
        builder.append_phi_arg(p, xp, latch);
        builder.append_phi_arg(q, xq, latch);
        builder.jump(header);

        builder.switch_to_block(exit);
        let j = builder.binary(BinaryOp::Add, p, two);
        builder.ret(Some(j));

        let mut func = builder.build();
        let numberer = run(&mut func, Mode::Optimistic);
        let vn = |value| numberer.value_number(func.dfg.value_insn(value));

        // The two phis start out congruent and split once their increments
        // diverge. The split has to reach `j`, which reads `p`; a stale
        // number would alias it with `q + 2` from the loop latch.
        assert_ne!(vn(p), vn(q));
        assert_ne!(vn(j), vn(xq));
        assert!(func.layout.is_insn_inserted(func.dfg.value_insn(j)));

        let exit_insns = block_insns(&func, exit);
        assert_eq!(exit_insns.len(), 2);
        assert_eq!(func.dfg.insn_data(exit_insns[1]).args(), &[j]);
    }

    #[test]
    fn side_effecting_calls_survive() {
        let mut builder = FunctionBuilder::new(
            "test_func",
            Signature::new(&[Type::I32, Type::I32], &[Type::I32]),
        );
        let entry = builder.append_block();

        builder.switch_to_block(entry);
        let a = builder.arg(0);
        let b = builder.arg(1);
        let c1 = builder.call(0, &[a, b], Type::I32);
        let c2 = builder.call(0, &[a, b], Type::I32);
        builder.ret(Some(c2));

        let mut func = builder.build();
        let numberer = run(&mut func, Mode::Pessimistic);

        let c1_insn = func.dfg.value_insn(c1);
        let c2_insn = func.dfg.value_insn(c2);
        assert_ne!(numberer.value_number(c1_insn), numberer.value_number(c2_insn));
        assert!(func.layout.is_insn_inserted(c1_insn));
        assert!(func.layout.is_insn_inserted(c2_insn));
    }

    #[test]
    fn constant_fold_unifies_with_existing_literal() {
        let mut builder = FunctionBuilder::new("test_func", Signature::new(&[], &[Type::I32]));
        let entry = builder.append_block();

        builder.switch_to_block(entry);
        let four = builder.make_imm_value(4i32);
        let two = builder.make_imm_value(2i32);
        let sum = builder.binary(BinaryOp::Add, two, two);
        builder.ret(Some(sum));

        let mut func = builder.build();
        run(&mut func, Mode::Pessimistic);

        // `2 + 2` folded to a fresh literal which then unified with the
        // preexisting `4`; the return reads the survivor.
        let insns = block_insns(&func, entry);
        assert_eq!(insns.len(), 3);
        assert_eq!(func.dfg.insn_data(insns[2]).args(), &[four]);
        let fours = insns
            .iter()
            .filter(|&&insn| {
                matches!(
                    func.dfg.insn_data(insn),
                    InsnData::Imm {
                        imm: Immediate::I32(4)
                    }
                )
            })
            .count();
        assert_eq!(fours, 1);
    }

    #[test]
    fn validity_window_covers_last_dominated_block() {
        let mut builder = FunctionBuilder::new(
            "test_func",
            Signature::new(&[Type::I32, Type::I32], &[Type::I32]),
        );
        let b1 = builder.append_block();
        let b2 = builder.append_block();
        let b3 = builder.append_block();

        builder.switch_to_block(b1);
        let a = builder.arg(0);
        let b = builder.arg(1);
        let x = builder.binary(BinaryOp::Add, a, b);
        builder.jump(b2);

        builder.switch_to_block(b2);
        builder.jump(b3);

        builder.switch_to_block(b3);
        let y = builder.binary(BinaryOp::Add, a, b);
        builder.ret(Some(y));

        let mut func = builder.build();
        run(&mut func, Mode::Pessimistic);

        // `b3` sits at the far end of `b1`'s dominance window; the window is
        // inclusive, so the recomputation is still eliminated.
        assert!(!func.layout.is_insn_inserted(func.dfg.value_insn(y)));
        let insns = block_insns(&func, b3);
        assert_eq!(insns.len(), 1);
        assert_eq!(func.dfg.insn_data(insns[0]).args(), &[x]);
    }

    #[test]
    fn elimination_is_idempotent() {
        let mut builder = FunctionBuilder::new(
            "test_func",
            Signature::new(&[Type::I32, Type::I32], &[Type::I32]),
        );
        let b1 = builder.append_block();
        let b2 = builder.append_block();

        builder.switch_to_block(b1);
        let a = builder.arg(0);
        let b = builder.arg(1);
        builder.binary(BinaryOp::Add, a, b);
        builder.jump(b2);

        builder.switch_to_block(b2);
        let y = builder.binary(BinaryOp::Add, a, b);
        builder.ret(Some(y));

        let mut func = builder.build();
        let domtree = domtree_of(&func);
        let mut numberer = ValueNumberer::new(Mode::Pessimistic);
        numberer.analyze(&mut func, &domtree).unwrap();

        let after_first = insn_count(&func);
        numberer.eliminate_redundancies(&mut func, &domtree).unwrap();
        assert_eq!(insn_count(&func), after_first);
    }

    #[test]
    fn osr_merge_blocks_keep_their_definitions() {
        let mut builder =
            FunctionBuilder::new("test_func", Signature::new(&[Type::I32], &[Type::I32]));
        let entry = builder.append_block();
        let osr = builder.append_block();
        let merge = builder.append_block();

        builder.switch_to_block(entry);
        let a = builder.arg(0);
        let x = builder.binary(BinaryOp::Mul, a, a);
        builder.jump(merge);

        builder.switch_to_block(osr);
        builder.jump(merge);
        builder.set_osr_entry(osr);

        builder.switch_to_block(merge);
        let y = builder.binary(BinaryOp::Mul, a, a);
        builder.ret(Some(y));

        let mut func = builder.build();
        let numberer = run(&mut func, Mode::Pessimistic);

        // Congruent, but the merge block is reachable from the OSR entry
        // without passing `x`, so the recomputation must stay.
        assert_eq!(
            numberer.value_number(func.dfg.value_insn(x)),
            numberer.value_number(func.dfg.value_insn(y))
        );
        assert!(func.layout.is_insn_inserted(func.dfg.value_insn(y)));
    }

    #[test]
    fn dominating_table_exhaustion_fails_analyze() {
        let mut builder = FunctionBuilder::new(
            "test_func",
            Signature::new(&[Type::I32, Type::I32], &[Type::I32]),
        );
        let entry = builder.append_block();

        builder.switch_to_block(entry);
        let a = builder.arg(0);
        let b = builder.arg(1);
        let x = builder.binary(BinaryOp::Add, a, b);
        builder.ret(Some(x));

        let mut func = builder.build();
        let domtree = domtree_of(&func);
        let mut numberer = ValueNumberer::with_limits(Mode::Pessimistic, None, Some(0));

        assert_eq!(numberer.analyze(&mut func, &domtree), Err(Error::OutOfMemory));

        // Numbering had already finished and the graph is intact.
        assert_ne!(numberer.value_number(func.dfg.value_insn(x)), 0);
        assert!(func.layout.is_insn_inserted(func.dfg.value_insn(x)));
    }

    #[test]
    fn value_table_exhaustion_fails_analyze() {
        let mut builder = FunctionBuilder::new(
            "test_func",
            Signature::new(&[Type::I32, Type::I32], &[Type::I32]),
        );
        let entry = builder.append_block();

        builder.switch_to_block(entry);
        let a = builder.arg(0);
        let b = builder.arg(1);
        let x = builder.binary(BinaryOp::Add, a, b);
        builder.ret(Some(x));

        let mut func = builder.build();
        let domtree = domtree_of(&func);
        let mut numberer = ValueNumberer::with_limits(Mode::Pessimistic, Some(1), None);

        assert_eq!(numberer.analyze(&mut func, &domtree), Err(Error::OutOfMemory));
    }
}
