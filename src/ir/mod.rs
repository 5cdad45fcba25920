pub mod builder;
pub mod dfg;
pub mod function;
pub mod insn;
pub mod layout;
pub mod types;
pub mod value;

pub use builder::FunctionBuilder;
pub use dfg::{Block, DataFlowGraph};
pub use function::{Function, Signature};
pub use insn::{BinaryOp, Insn, InsnData, UnaryOp};
pub use layout::Layout;
pub use types::Type;
pub use value::{Immediate, Value, ValueData};
