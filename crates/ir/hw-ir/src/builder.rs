//! Insertion-cursor based operation builder

use crate::{
    BlockId, Body, DeclInfo, FirType, InstanceDecl, IrError, MemDecl, OpId, OpKind, PrimOp,
    ValueId,
};

/// Position new operations are inserted before
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertPoint {
    /// Target block
    pub block: BlockId,
    /// Slot index within the block
    pub index: usize,
}

/// Creates operations at an insertion point, advancing past each one
pub struct Builder<'a> {
    body: &'a mut Body,
    ip: InsertPoint,
}

impl<'a> Builder<'a> {
    /// Builder inserting at `ip`
    pub fn new(body: &'a mut Body, ip: InsertPoint) -> Self {
        Self { body, ip }
    }

    /// Builder appending to `block`
    pub fn at_end(body: &'a mut Body, block: BlockId) -> Self {
        let index = body.block_ops(block).len();
        Self {
            body,
            ip: InsertPoint { block, index },
        }
    }

    /// Body being edited
    pub fn body(&self) -> &Body {
        self.body
    }

    /// Mutable access to the body being edited
    pub fn body_mut(&mut self) -> &mut Body {
        self.body
    }

    /// Current insertion point
    pub fn insertion_point(&self) -> InsertPoint {
        self.ip
    }

    /// Moves the insertion point
    pub fn set_insertion_point(&mut self, ip: InsertPoint) {
        self.ip = ip;
    }

    /// Inserts an operation and advances past it
    pub fn create(
        &mut self,
        kind: OpKind,
        operands: Vec<ValueId>,
        result_types: Vec<FirType>,
    ) -> OpId {
        let op = self
            .body
            .insert_op(self.ip.block, self.ip.index, kind, operands, result_types);
        self.ip.index += 1;
        op
    }

    fn create_value(&mut self, kind: OpKind, operands: Vec<ValueId>, ty: FirType) -> ValueId {
        let op = self.create(kind, operands, vec![ty]);
        self.body.result(op, 0)
    }

    fn ty(&self, value: ValueId) -> &FirType {
        self.body.value_type(value)
    }

    /// `wire`
    pub fn wire(&mut self, ty: FirType, decl: DeclInfo) -> OpId {
        self.create(OpKind::Wire(decl), vec![], vec![ty])
    }

    /// `reg`
    pub fn reg(&mut self, ty: FirType, clock: ValueId, decl: DeclInfo) -> OpId {
        self.create(OpKind::Reg(decl), vec![clock], vec![ty])
    }

    /// `regreset`
    pub fn reg_reset(
        &mut self,
        ty: FirType,
        clock: ValueId,
        reset: ValueId,
        init: ValueId,
        decl: DeclInfo,
    ) -> OpId {
        self.create(OpKind::RegReset(decl), vec![clock, reset, init], vec![ty])
    }

    /// `node`
    pub fn node(&mut self, input: ValueId, decl: DeclInfo) -> OpId {
        let ty = self.ty(input).clone();
        self.create(OpKind::Node(decl), vec![input], vec![ty])
    }

    /// `mem`, one result per port
    pub fn mem(&mut self, mem: MemDecl) -> OpId {
        let types = mem.port_types();
        self.create(OpKind::Mem(mem), vec![], types)
    }

    /// `instance`, one result per entry of `port_types`
    pub fn instance(&mut self, inst: InstanceDecl, port_types: Vec<FirType>) -> OpId {
        self.create(OpKind::Instance(inst), vec![], port_types)
    }

    /// Integer literal
    pub fn constant(&mut self, ty: FirType, value: u128) -> ValueId {
        self.create_value(OpKind::Constant { value }, vec![], ty)
    }

    /// Placeholder invalid value
    pub fn invalid(&mut self, ty: FirType) -> ValueId {
        self.create_value(OpKind::Invalid, vec![], ty)
    }

    /// Static bundle field access
    pub fn subfield(&mut self, input: ValueId, index: usize) -> Result<ValueId, IrError> {
        let ty = match self.ty(input) {
            FirType::Bundle(bundle) => match bundle.elements.get(index) {
                Some(elt) => elt.ty.clone(),
                None => {
                    return Err(IrError::IndexOutOfRange {
                        index,
                        ty: self.ty(input).clone(),
                    });
                }
            },
            other => return Err(IrError::NotAggregate { ty: other.clone() }),
        };
        Ok(self.create_value(OpKind::Subfield { index }, vec![input], ty))
    }

    /// Static vector element access
    pub fn subindex(&mut self, input: ValueId, index: usize) -> Result<ValueId, IrError> {
        let ty = match self.ty(input) {
            FirType::Vector(vector) if index < vector.len => (*vector.element).clone(),
            FirType::Vector(_) => {
                return Err(IrError::IndexOutOfRange {
                    index,
                    ty: self.ty(input).clone(),
                });
            }
            other => return Err(IrError::NotAggregate { ty: other.clone() }),
        };
        Ok(self.create_value(OpKind::Subindex { index }, vec![input], ty))
    }

    /// Dynamic vector element access
    pub fn subaccess(&mut self, input: ValueId, index: ValueId) -> Result<ValueId, IrError> {
        let ty = match self.ty(input) {
            FirType::Vector(vector) => (*vector.element).clone(),
            other => return Err(IrError::NotAggregate { ty: other.clone() }),
        };
        Ok(self.create_value(OpKind::Subaccess, vec![input, index], ty))
    }

    /// Subfield or subindex, whichever fits the type of `input`
    pub fn sub_whatever(&mut self, input: ValueId, index: usize) -> Result<ValueId, IrError> {
        match self.ty(input) {
            FirType::Bundle(_) => self.subfield(input, index),
            FirType::Vector(_) => self.subindex(input, index),
            other => Err(IrError::NotAggregate { ty: other.clone() }),
        }
    }

    /// Two-way select
    pub fn mux(&mut self, sel: ValueId, high: ValueId, low: ValueId) -> ValueId {
        let ty = self.ty(high).clone();
        self.create_value(OpKind::Mux, vec![sel, high, low], ty)
    }

    /// N-way select over `inputs`, highest index first
    pub fn multibit_mux(&mut self, index: ValueId, inputs: Vec<ValueId>) -> Result<ValueId, IrError> {
        let Some(first) = inputs.first() else {
            return Err(IrError::EmptyMux);
        };
        let ty = self.ty(*first).clone();
        let mut operands = Vec::with_capacity(inputs.len() + 1);
        operands.push(index);
        operands.extend(inputs);
        Ok(self.create_value(OpKind::MultibitMux, operands, ty))
    }

    /// Bit reinterpretation to `ty`
    pub fn bitcast(&mut self, ty: FirType, input: ValueId) -> ValueId {
        self.create_value(OpKind::BitCast, vec![input], ty)
    }

    /// Unresolved cast to `ty`
    pub fn unrealized_cast(&mut self, ty: FirType, input: ValueId) -> ValueId {
        self.create_value(OpKind::UnrealizedCast, vec![input], ty)
    }

    fn known_width(&self, value: ValueId) -> Result<u32, IrError> {
        let ty = self.ty(value);
        let width = ty
            .bit_width()
            .ok_or_else(|| IrError::UnknownWidth { ty: ty.clone() })?;
        u32::try_from(width).map_err(|_| IrError::WidthOverflow { width })
    }

    /// Equality comparison
    pub fn eq(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.create_value(OpKind::Prim(PrimOp::Eq), vec![lhs, rhs], FirType::uint(1))
    }

    /// Concatenation with `high` in the upper bits
    pub fn cat(&mut self, high: ValueId, low: ValueId) -> Result<ValueId, IrError> {
        let (high_width, low_width) = (self.known_width(high)?, self.known_width(low)?);
        let width = high_width
            .checked_add(low_width)
            .ok_or(IrError::WidthOverflow {
                width: u64::from(high_width) + u64::from(low_width),
            })?;
        Ok(self.create_value(OpKind::Prim(PrimOp::Cat), vec![high, low], FirType::uint(width)))
    }

    /// Bits `hi` down to `lo`, inclusive
    pub fn bits(&mut self, input: ValueId, hi: u32, lo: u32) -> ValueId {
        self.create_value(
            OpKind::Prim(PrimOp::Bits { hi, lo }),
            vec![input],
            FirType::uint(hi - lo + 1),
        )
    }

    /// Reinterpret a ground value as unsigned
    pub fn as_uint(&mut self, input: ValueId) -> Result<ValueId, IrError> {
        let width = self.known_width(input)?;
        Ok(self.create_value(OpKind::Prim(PrimOp::AsUInt), vec![input], FirType::uint(width)))
    }

    /// Reinterpret a ground value as signed
    pub fn as_sint(&mut self, input: ValueId) -> Result<ValueId, IrError> {
        let width = self.known_width(input)?;
        Ok(self.create_value(OpKind::Prim(PrimOp::AsSInt), vec![input], FirType::sint(width)))
    }

    /// Any other ground primitive with an explicit result type
    pub fn prim(&mut self, prim: PrimOp, operands: Vec<ValueId>, ty: FirType) -> ValueId {
        self.create_value(OpKind::Prim(prim), operands, ty)
    }

    /// `connect dest, src`
    pub fn connect(&mut self, dest: ValueId, src: ValueId) -> OpId {
        self.create(OpKind::Connect, vec![dest, src], vec![])
    }

    /// `strict_connect dest, src`
    pub fn strict_connect(&mut self, dest: ValueId, src: ValueId) -> OpId {
        self.create(OpKind::StrictConnect, vec![dest, src], vec![])
    }

    /// Conditional block; returns the op, its then block and its optional else block
    pub fn when(&mut self, cond: ValueId, with_else: bool) -> (OpId, BlockId, Option<BlockId>) {
        let placeholder = OpKind::Invalid;
        let op = self.create(placeholder, vec![cond], vec![]);
        let then_block = self.body.create_block(op);
        let else_block = with_else.then(|| self.body.create_block(op));
        *self.body.kind_mut(op) = OpKind::When {
            then_block,
            else_block,
        };
        (op, then_block, else_block)
    }
}
