//! A straight-line function builder, mainly for tests and embedders that
//! construct SSA graphs by hand.

use smallvec::SmallVec;

use super::{
    insn::{BinaryOp, UnaryOp},
    Block, Function, Immediate, Insn, InsnData, Signature, Type, Value,
};

#[derive(Debug)]
pub struct FunctionBuilder {
    func: Function,
    cursor: Option<Block>,
}

impl FunctionBuilder {
    pub fn new(name: &str, sig: Signature) -> Self {
        Self {
            func: Function::new(name, sig),
            cursor: None,
        }
    }

    pub fn append_block(&mut self) -> Block {
        let block = self.func.dfg.make_block();
        self.func.layout.append_block(block);
        block
    }

    pub fn switch_to_block(&mut self, block: Block) {
        self.cursor = Some(block);
    }

    pub fn set_osr_entry(&mut self, block: Block) {
        self.func.osr_entry = Some(block);
    }

    pub fn arg(&mut self, idx: usize) -> Value {
        let ty = self.func.sig.args[idx];
        self.insert_with_result(InsnData::Arg { idx, ty })
    }

    pub fn make_imm_value<Imm>(&mut self, imm: Imm) -> Value
    where
        Imm: Into<Immediate>,
    {
        self.insert_with_result(InsnData::Imm { imm: imm.into() })
    }

    pub fn unary(&mut self, code: UnaryOp, arg: Value) -> Value {
        self.insert_with_result(InsnData::unary(code, arg))
    }

    pub fn binary(&mut self, code: BinaryOp, lhs: Value, rhs: Value) -> Value {
        self.insert_with_result(InsnData::binary(code, lhs, rhs))
    }

    pub fn load(&mut self, addr: Value, ty: Type) -> Value {
        self.insert_with_result(InsnData::Load { args: [addr], ty })
    }

    pub fn store(&mut self, addr: Value, data: Value) {
        self.insert(InsnData::Store { args: [addr, data] });
    }

    pub fn call(&mut self, callee: u32, args: &[Value], ret_ty: Type) -> Value {
        self.insert_with_result(InsnData::Call {
            callee,
            args: args.into(),
            ret_ty,
        })
    }

    pub fn phi(&mut self, ty: Type, args: &[(Value, Block)]) -> Value {
        let mut values = SmallVec::new();
        let mut blocks = SmallVec::new();
        for (value, block) in args {
            values.push(*value);
            blocks.push(*block);
        }
        self.insert_with_result(InsnData::Phi { values, blocks, ty })
    }

    /// Appends an incoming edge to the phi that defines `phi_value`.
    pub fn append_phi_arg(&mut self, phi_value: Value, value: Value, block: Block) {
        let phi = self.func.dfg.value_insn(phi_value);
        self.func.dfg.append_phi_arg(phi, value, block);
    }

    pub fn jump(&mut self, dest: Block) {
        self.insert(InsnData::jump(dest));
    }

    pub fn br(&mut self, cond: Value, then: Block, else_: Block) {
        self.insert(InsnData::Branch {
            args: [cond],
            dests: [then, else_],
        });
    }

    pub fn ret(&mut self, arg: Option<Value>) {
        self.insert(InsnData::Return { args: arg });
    }

    pub fn build(self) -> Function {
        self.func
    }

    fn insert(&mut self, data: InsnData) -> Insn {
        let block = self.cursor.expect("no block selected");
        let insn = self.func.dfg.make_insn(data);
        self.func.layout.append_insn(insn, block);
        insn
    }

    fn insert_with_result(&mut self, data: InsnData) -> Value {
        let insn = self.insert(data);
        self.func
            .dfg
            .make_result(insn)
            .expect("instruction produces no result")
    }
}
