pub mod cfg;
pub mod domtree;
pub mod ir;
pub mod optim;

pub use cfg::ControlFlowGraph;
pub use domtree::DomTree;
pub use ir::{Block, DataFlowGraph, Function, Immediate, Insn, InsnData, Signature, Type, Value};
pub use optim::gvn::{Error, Mode, ValueNumberer};
