//! Module bodies: arena-allocated operations, values and blocks
//!
//! Blocks are plain vectors of [`OpId`]s. Erasing an operation leaves a
//! tombstone in its block so positions held by a walking cursor stay valid;
//! [`Body::compact`] removes the tombstones once the walk is over.

use crate::{FirType, IrError, OpKind};
use la_arena::{Arena, Idx};

/// Operation handle
pub type OpId = Idx<Operation>;
/// Value handle
pub type ValueId = Idx<ValueData>;
/// Block handle
pub type BlockId = Idx<Block>;

/// One operand slot that reads a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Use {
    /// Reading operation
    pub op: OpId,
    /// Operand position
    pub operand: usize,
}

/// Where a value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDef {
    /// Result `index` of `op`
    Result {
        /// Defining operation
        op: OpId,
        /// Result position
        index: usize,
    },
    /// A module port argument
    Argument,
}

/// A typed SSA value
#[derive(Debug, Clone)]
pub struct ValueData {
    /// Value type
    pub ty: FirType,
    /// Definition site
    pub def: ValueDef,
    uses: Vec<Use>,
}

impl ValueData {
    /// Every operand slot reading this value
    pub fn uses(&self) -> &[Use] {
        &self.uses
    }
}

/// An operation
#[derive(Debug, Clone)]
pub struct Operation {
    /// What the operation does
    pub kind: OpKind,
    operands: Vec<ValueId>,
    results: Vec<ValueId>,
    block: BlockId,
    erased: bool,
}

impl Operation {
    /// Operand values
    pub fn operands(&self) -> &[ValueId] {
        &self.operands
    }

    /// Result values
    pub fn results(&self) -> &[ValueId] {
        &self.results
    }

    /// Block containing the operation
    pub fn block(&self) -> BlockId {
        self.block
    }
}

/// Ordered list of operations
#[derive(Debug, Clone, Default)]
pub struct Block {
    ops: Vec<OpId>,
    parent: Option<OpId>,
}

impl Block {
    /// Operation owning this block, `None` for a module's entry block
    pub fn parent(&self) -> Option<OpId> {
        self.parent
    }
}

/// A module body
#[derive(Debug, Clone)]
pub struct Body {
    ops: Arena<Operation>,
    values: Arena<ValueData>,
    blocks: Arena<Block>,
    entry: BlockId,
    args: Vec<ValueId>,
}

impl Default for Body {
    fn default() -> Self {
        Self::new()
    }
}

impl Body {
    /// Body with an empty entry block and no arguments
    pub fn new() -> Self {
        let mut blocks = Arena::new();
        let entry = blocks.alloc(Block::default());
        Self {
            ops: Arena::new(),
            values: Arena::new(),
            blocks,
            entry,
            args: Vec::new(),
        }
    }

    /// Top-level block
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    /// Port arguments in port order
    pub fn args(&self) -> &[ValueId] {
        &self.args
    }

    /// Appends a port argument
    pub fn add_argument(&mut self, ty: FirType) -> ValueId {
        let index = self.args.len();
        self.insert_argument(index, ty)
    }

    /// Inserts a port argument before position `index`
    pub fn insert_argument(&mut self, index: usize, ty: FirType) -> ValueId {
        let value = self.values.alloc(ValueData {
            ty,
            def: ValueDef::Argument,
            uses: Vec::new(),
        });
        self.args.insert(index, value);
        value
    }

    /// Removes the port argument at `index`; it must no longer be used
    pub fn remove_argument(&mut self, index: usize) -> ValueId {
        self.args.remove(index)
    }

    /// Block data
    pub fn block(&self, block: BlockId) -> &Block {
        &self.blocks[block]
    }

    /// Raw operation slots of `block`, tombstones included
    pub fn block_ops(&self, block: BlockId) -> &[OpId] {
        &self.blocks[block].ops
    }

    /// Live operations of `block`
    pub fn live_ops(&self, block: BlockId) -> impl Iterator<Item = OpId> + '_ {
        self.blocks[block]
            .ops
            .iter()
            .copied()
            .filter(|op| !self.ops[*op].erased)
    }

    /// Operation data
    pub fn op(&self, op: OpId) -> &Operation {
        &self.ops[op]
    }

    /// Operation kind
    pub fn kind(&self, op: OpId) -> &OpKind {
        &self.ops[op].kind
    }

    /// Mutable operation kind
    pub fn kind_mut(&mut self, op: OpId) -> &mut OpKind {
        &mut self.ops[op].kind
    }

    /// Operand `index` of `op`
    pub fn operand(&self, op: OpId, index: usize) -> ValueId {
        self.ops[op].operands[index]
    }

    /// Result `index` of `op`
    pub fn result(&self, op: OpId, index: usize) -> ValueId {
        self.ops[op].results[index]
    }

    /// Returns true if `op` was erased
    pub fn is_erased(&self, op: OpId) -> bool {
        self.ops[op].erased
    }

    /// Value data
    pub fn value(&self, value: ValueId) -> &ValueData {
        &self.values[value]
    }

    /// Type of `value`
    pub fn value_type(&self, value: ValueId) -> &FirType {
        &self.values[value].ty
    }

    /// Defining operation of `value`, `None` for port arguments
    pub fn defining_op(&self, value: ValueId) -> Option<OpId> {
        match self.values[value].def {
            ValueDef::Result { op, .. } => Some(op),
            ValueDef::Argument => None,
        }
    }

    /// Distinct operations reading `value`, in first-use order
    pub fn users(&self, value: ValueId) -> Vec<OpId> {
        let mut users: Vec<OpId> = Vec::new();
        for use_ in &self.values[value].uses {
            if !users.contains(&use_.op) {
                users.push(use_.op);
            }
        }
        users
    }

    /// Returns true if any operation reads `value`
    pub fn has_uses(&self, value: ValueId) -> bool {
        !self.values[value].uses.is_empty()
    }

    /// Returns true if any result of `op` is read
    pub fn op_has_uses(&self, op: OpId) -> bool {
        self.ops[op]
            .results
            .iter()
            .any(|result| self.has_uses(*result))
    }

    /// Creates a block owned by `parent`
    pub fn create_block(&mut self, parent: OpId) -> BlockId {
        self.blocks.alloc(Block {
            ops: Vec::new(),
            parent: Some(parent),
        })
    }

    /// Inserts a new operation into `block` before position `index`
    pub fn insert_op(
        &mut self,
        block: BlockId,
        index: usize,
        kind: OpKind,
        operands: Vec<ValueId>,
        result_types: Vec<FirType>,
    ) -> OpId {
        let op = self.ops.alloc(Operation {
            kind,
            operands: Vec::new(),
            results: Vec::new(),
            block,
            erased: false,
        });
        for (operand, value) in operands.iter().enumerate() {
            self.values[*value].uses.push(Use { op, operand });
        }
        let results = result_types
            .into_iter()
            .enumerate()
            .map(|(index, ty)| {
                self.values.alloc(ValueData {
                    ty,
                    def: ValueDef::Result { op, index },
                    uses: Vec::new(),
                })
            })
            .collect();
        let data = &mut self.ops[op];
        data.operands = operands;
        data.results = results;
        self.blocks[block].ops.insert(index, op);
        op
    }

    fn remove_use(&mut self, value: ValueId, use_: Use) {
        let uses = &mut self.values[value].uses;
        if let Some(pos) = uses.iter().position(|u| *u == use_) {
            uses.remove(pos);
        }
    }

    /// Detaches every operand of `op`
    pub fn drop_operands(&mut self, op: OpId) {
        let operands = std::mem::take(&mut self.ops[op].operands);
        for (operand, value) in operands.into_iter().enumerate() {
            self.remove_use(value, Use { op, operand });
        }
    }

    /// Redirects every reader of `from` to `to`
    pub fn replace_all_uses_with(&mut self, from: ValueId, to: ValueId) {
        if from == to {
            return;
        }
        let uses = std::mem::take(&mut self.values[from].uses);
        for use_ in &uses {
            self.ops[use_.op].operands[use_.operand] = to;
        }
        self.values[to].uses.extend(uses);
    }

    /// Erases `op`, which must have no remaining readers
    ///
    /// Nested blocks are erased with it.
    pub fn erase_op(&mut self, op: OpId) -> Result<(), IrError> {
        if self.op_has_uses(op) {
            return Err(IrError::OpHasUses { op });
        }
        self.force_erase(op);
        Ok(())
    }

    fn force_erase(&mut self, op: OpId) {
        if let OpKind::When {
            then_block,
            else_block,
        } = self.ops[op].kind
        {
            for block in std::iter::once(then_block).chain(else_block) {
                let nested: Vec<OpId> = self.live_ops(block).collect();
                for inner in nested.into_iter().rev() {
                    self.force_erase(inner);
                }
            }
        }
        self.drop_operands(op);
        self.ops[op].erased = true;
    }

    /// Drops tombstones from every block
    pub fn compact(&mut self) {
        let ops = &self.ops;
        for (_, block) in self.blocks.iter_mut() {
            block.ops.retain(|op| !ops[*op].erased);
        }
    }

    /// Visits every live operation in pre-order, descending into nested blocks
    pub fn walk(&self, f: &mut impl FnMut(OpId)) {
        self.walk_block(self.entry, f);
    }

    fn walk_block(&self, block: BlockId, f: &mut impl FnMut(OpId)) {
        for op in self.live_ops(block) {
            f(op);
            if let OpKind::When {
                then_block,
                else_block,
            } = self.ops[op].kind
            {
                self.walk_block(then_block, f);
                if let Some(else_block) = else_block {
                    self.walk_block(else_block, f);
                }
            }
        }
    }

    /// Live operations in walk order
    pub fn all_ops(&self) -> Vec<OpId> {
        let mut ops = Vec::new();
        self.walk(&mut |op| ops.push(op));
        ops
    }
}
