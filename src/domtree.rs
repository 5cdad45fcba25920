//! This module contains dominator tree related structs.
//!
//! The algorithm is based on Keith D. Cooper., Timothy J. Harvey., and Ken Kennedy.: A Simple, Fast Dominance Algorithm:
//! <https://www.cs.rice.edu/~keith/EMBED/dom.pdf>
//!
//! With an OSR entry the result is a dominator forest rather than a tree:
//! every root dominates itself, and a block whose predecessor chains meet no
//! common ancestor becomes self-dominating as well.

use cranelift_entity::{packed_option::PackedOption, SecondaryMap};

use super::cfg::ControlFlowGraph;
use super::ir::Block;

#[derive(Default, Debug)]
pub struct DomTree {
    doms: SecondaryMap<Block, PackedOption<Block>>,
    rpo: Vec<Block>,
    children: SecondaryMap<Block, Vec<Block>>,
    num_dominated: SecondaryMap<Block, u32>,
}

impl DomTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.doms.clear();
        self.rpo.clear();
        self.children.clear();
        self.num_dominated.clear();
    }

    /// Returns the immediate dominator of the `block`.
    /// Returns None if the `block` is unreachable from any root, or the
    /// `block` is self-dominating.
    pub fn idom_of(&self, block: Block) -> Option<Block> {
        let dom = self.doms[block].expand()?;
        (dom != block).then_some(dom)
    }

    /// Returns `true` if block is reachable from one of the roots.
    pub fn is_reachable(&self, block: Block) -> bool {
        self.doms[block].is_some()
    }

    /// Returns `true` if the `block` is a root of the dominator forest.
    pub fn is_self_dominating(&self, block: Block) -> bool {
        self.doms[block].expand() == Some(block)
    }

    /// Returns `true` if block1 strictly dominates block2.
    pub fn strictly_dominates(&self, block1: Block, block2: Block) -> bool {
        let mut current_block = block2;
        while let Some(block) = self.idom_of(current_block) {
            if block == block1 {
                return true;
            }
            current_block = block;
        }

        false
    }

    /// Returns `true` if block1 dominates block2.
    pub fn dominates(&self, block1: Block, block2: Block) -> bool {
        if block1 == block2 {
            return true;
        }

        self.strictly_dominates(block1, block2)
    }

    /// Returns the blocks immediately dominated by the `block`.
    pub fn children_of(&self, block: Block) -> &[Block] {
        &self.children[block]
    }

    /// Returns the number of blocks strictly dominated by the `block`.
    pub fn num_dominated(&self, block: Block) -> usize {
        self.num_dominated[block] as usize
    }

    /// Returns blocks in RPO.
    pub fn rpo(&self) -> &[Block] {
        &self.rpo
    }

    pub fn compute(&mut self, cfg: &ControlFlowGraph) {
        self.clear();

        self.rpo = cfg.post_order().collect();
        self.rpo.reverse();

        let block_num = self.rpo.len();

        if self.doms.capacity() < block_num {
            self.doms = SecondaryMap::with_capacity(block_num);
        } else {
            self.doms.clear();
        }

        let mut rpo_nums = SecondaryMap::with_capacity(block_num);
        for (i, &block) in self.rpo.iter().enumerate() {
            rpo_nums[block] = (block_num - i) as u32;
        }

        if self.rpo.is_empty() {
            return;
        }
        for &root in cfg.roots() {
            self.doms[root] = root.into();
        }

        let mut changed = true;
        while changed {
            changed = false;
            for &block in self.rpo.iter().skip(1) {
                if cfg.roots().contains(&block) {
                    continue;
                }

                let processed_pred =
                    match cfg.preds_of(block).find(|&&pred| self.doms[pred].is_some()) {
                        Some(pred) => *pred,
                        _ => continue,
                    };
                let mut new_dom = Some(processed_pred);

                for &pred in cfg.preds_of(block) {
                    if pred != processed_pred && self.doms[pred].is_some() {
                        new_dom = match new_dom {
                            Some(dom) => self.intersect(dom, pred, &rpo_nums),
                            None => None,
                        };
                    }
                }

                // Predecessor chains rooted in different entries meet no
                // common ancestor; the block then dominates itself.
                let new_dom = new_dom.unwrap_or(block);
                if Some(new_dom) != self.doms[block].expand() {
                    changed = true;
                    self.doms[block] = new_dom.into();
                }
            }
        }

        self.compute_children();
        self.compute_num_dominated();
    }

    fn compute_children(&mut self) {
        for block_idx in 0..self.rpo.len() {
            let block = self.rpo[block_idx];
            if let Some(idom) = self.idom_of(block) {
                self.children[idom].push(block);
            }
        }
    }

    fn compute_num_dominated(&mut self) {
        // An idom always precedes its dominated blocks in RPO, so one pass in
        // reverse RPO accumulates full subtree counts.
        for block_idx in (0..self.rpo.len()).rev() {
            let block = self.rpo[block_idx];
            let num = self.num_dominated[block];
            if let Some(idom) = self.idom_of(block) {
                self.num_dominated[idom] += num + 1;
            }
        }
    }

    fn intersect(
        &self,
        mut b1: Block,
        mut b2: Block,
        rpo_nums: &SecondaryMap<Block, u32>,
    ) -> Option<Block> {
        while b1 != b2 {
            while rpo_nums[b1] < rpo_nums[b2] {
                let dom = self.doms[b1].unwrap();
                if dom == b1 {
                    return None;
                }
                b1 = dom;
            }
            while rpo_nums[b2] < rpo_nums[b1] {
                let dom = self.doms[b2].unwrap();
                if dom == b2 {
                    return None;
                }
                b2 = dom;
            }
        }

        Some(b1)
    }
}
