use smallvec::SmallVec;

use super::{Block, DataFlowGraph, Layout, Type};

#[derive(Debug, Clone, Default)]
pub struct Signature {
    pub args: SmallVec<[Type; 8]>,
    pub rets: SmallVec<[Type; 8]>,
}

impl Signature {
    pub fn new(args: &[Type], rets: &[Type]) -> Self {
        Self {
            args: args.into(),
            rets: rets.into(),
        }
    }
}

#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub sig: Signature,
    pub dfg: DataFlowGraph,
    pub layout: Layout,
    /// Secondary entry used when execution transitions into the function
    /// mid-flight. Dominance must be computed over both entries.
    pub osr_entry: Option<Block>,
}

impl Function {
    pub fn new(name: &str, sig: Signature) -> Self {
        Self {
            name: name.to_string(),
            sig,
            dfg: DataFlowGraph::new(),
            layout: Layout::new(),
            osr_entry: None,
        }
    }
}
