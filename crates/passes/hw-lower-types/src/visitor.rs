//! Per-operation lowering of aggregate values
//!
//! Blocks are walked back to front. Lowering an operation only ever inserts
//! new operations directly in front of it, so the cursor meets them next and
//! lowers them in turn until every value is ground.

use crate::annotations::filter_annotations;
use crate::error::{LowerTypesError, Result};
use crate::peel::{peel_type, FlatField};
use crate::renames::{SymbolTracker, TargetKind};
use crate::PassContext;
use hw_ir::{
    BlockId, Body, Builder, DeclInfo, FirType, InsertPoint, InstanceDecl, InstancePort, OpId,
    OpKind, ValueId,
};
use tracing::trace;

/// Rewires every static accessor of `value` to the matching entry of `mapping`
///
/// Accessors are the only legal readers of an aggregate at this point; any
/// other reader is an invariant violation.
pub(crate) fn process_users(body: &mut Body, value: ValueId, mapping: &[ValueId]) -> Result<()> {
    for user in body.users(value) {
        let index = match *body.kind(user) {
            OpKind::Subfield { index } | OpKind::Subindex { index } => index,
            ref other => {
                return Err(LowerTypesError::UnknownAggregateUser {
                    user: other.mnemonic(),
                    ty: body.value_type(value).clone(),
                });
            }
        };
        let Some(&replacement) = mapping.get(index) else {
            return Err(LowerTypesError::Malformed {
                what: format!("accessor index {index} past {} lowered fields", mapping.len()),
            });
        };
        let result = body.result(user, 0);
        body.replace_all_uses_with(result, replacement);
        body.erase_op(user)?;
    }
    Ok(())
}

/// Returns true for a subaccess whose index is not a usable constant
fn is_dynamic_access(body: &Body, op: OpId) -> bool {
    if !matches!(body.kind(op), OpKind::Subaccess) {
        return false;
    }
    let constant_index = body
        .defining_op(body.operand(op, 1))
        .is_some_and(|index| matches!(body.kind(index), OpKind::Constant { .. }));
    let empty = matches!(body.value_type(body.operand(op, 0)), FirType::Vector(v) if v.len == 0);
    !constant_index || empty
}

/// Number of bits needed to select among `len` elements
pub(crate) fn select_width(len: usize) -> u32 {
    usize::BITS - len.saturating_sub(1).leading_zeros()
}

/// Lowers the operations of one module body
pub(crate) struct TypeLoweringVisitor<'a> {
    pub(crate) builder: Builder<'a>,
    pub(crate) ctx: &'a PassContext<'a>,
    pub(crate) symbols: &'a mut SymbolTracker,
}

impl<'a> TypeLoweringVisitor<'a> {
    pub(crate) fn new(
        builder: Builder<'a>,
        ctx: &'a PassContext<'a>,
        symbols: &'a mut SymbolTracker,
    ) -> Self {
        Self {
            builder,
            ctx,
            symbols,
        }
    }

    pub(crate) fn body(&self) -> &Body {
        self.builder.body()
    }

    /// Lowers every operation of `block`, last to first
    pub(crate) fn lower_block(&mut self, block: BlockId) -> Result<()> {
        let mut cursor = self.body().block_ops(block).len();
        while cursor > 0 {
            cursor -= 1;
            let op = self.body().block_ops(block)[cursor];
            if self.body().is_erased(op) {
                continue;
            }

            let saved = self.builder.insertion_point();
            self.builder.set_insertion_point(InsertPoint {
                block,
                index: cursor,
            });
            let before = self.body().block_ops(block).len();
            let remove = self.dispatch(op)?;
            let inserted = self.body().block_ops(block).len() - before;
            self.builder.set_insertion_point(saved);

            if remove {
                self.builder.body_mut().erase_op(op)?;
            }
            cursor += inserted;
        }
        Ok(())
    }

    /// Returns true when `op` was replaced and must be erased
    fn dispatch(&mut self, op: OpId) -> Result<bool> {
        trace!(op = self.body().kind(op).mnemonic(), "visit");
        match self.body().kind(op) {
            OpKind::Wire(_) => self.lower_producer(op, self.preserve(), |b, field| {
                let wire = b.wire(field.ty.clone(), DeclInfo::anonymous());
                Ok(b.body().result(wire, 0))
            }),
            OpKind::Reg(_) => {
                let clock = self.body().operand(op, 0);
                self.lower_producer(op, self.preserve(), |b, field| {
                    let reg = b.reg(field.ty.clone(), clock, DeclInfo::anonymous());
                    Ok(b.body().result(reg, 0))
                })
            }
            OpKind::RegReset(_) => {
                let [clock, reset, init] = [0, 1, 2].map(|i| self.body().operand(op, i));
                self.lower_producer(op, self.preserve(), |b, field| {
                    let init = b.sub_whatever(init, field.index)?;
                    let reg =
                        b.reg_reset(field.ty.clone(), clock, reset, init, DeclInfo::anonymous());
                    Ok(b.body().result(reg, 0))
                })
            }
            OpKind::Node(_) => {
                let input = self.body().operand(op, 0);
                self.lower_producer(op, self.preserve(), |b, field| {
                    let input = b.sub_whatever(input, field.index)?;
                    let node = b.node(input, DeclInfo::anonymous());
                    Ok(b.body().result(node, 0))
                })
            }
            OpKind::Invalid => self.lower_producer(op, self.preserve(), |b, field| {
                Ok(b.invalid(field.ty.clone()))
            }),
            OpKind::Mux => {
                let [sel, high, low] = [0, 1, 2].map(|i| self.body().operand(op, i));
                self.lower_producer(op, self.preserve(), |b, field| {
                    let high = b.sub_whatever(high, field.index)?;
                    let low = b.sub_whatever(low, field.index)?;
                    Ok(b.mux(sel, high, low))
                })
            }
            OpKind::MultibitMux => {
                let operands = self.body().op(op).operands().to_vec();
                let Some((&index, inputs)) = operands.split_first() else {
                    return Err(LowerTypesError::Malformed {
                        what: "multibit mux without an index".to_owned(),
                    });
                };
                self.lower_producer(op, self.preserve(), |b, field| {
                    let inputs = inputs
                        .iter()
                        .map(|input| b.sub_whatever(*input, field.index))
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    Ok(b.multibit_mux(index, inputs)?)
                })
            }
            OpKind::UnrealizedCast => {
                let input = self.body().operand(op, 0);
                self.lower_producer(op, self.preserve(), |b, field| {
                    let input = b.sub_whatever(input, field.index)?;
                    Ok(b.unrealized_cast(field.ty.clone(), input))
                })
            }
            OpKind::BitCast => self.lower_bitcast(op),
            OpKind::Subaccess => self.lower_subaccess(op),
            OpKind::Connect => self.lower_connect(op, false),
            OpKind::StrictConnect => self.lower_connect(op, true),
            OpKind::When {
                then_block,
                else_block,
            } => {
                let (then_block, else_block) = (*then_block, *else_block);
                self.lower_block(then_block)?;
                if let Some(else_block) = else_block {
                    self.lower_block(else_block)?;
                }
                Ok(false)
            }
            OpKind::Mem(_) => self.lower_mem(op),
            OpKind::Instance(_) => self.lower_instance(op),
            OpKind::Constant { .. }
            | OpKind::Subfield { .. }
            | OpKind::Subindex { .. }
            | OpKind::Prim(_) => Ok(false),
        }
    }

    fn preserve(&self) -> bool {
        self.ctx.options.preserve_aggregate
    }

    /// Replaces a single-result producer by one clone per peeled field
    ///
    /// `clone` builds the field's value; the clone's declaration, if any,
    /// then receives the field's name, symbol and annotations.
    pub(crate) fn lower_producer<F>(
        &mut self,
        op: OpId,
        allow_preserve: bool,
        mut clone: F,
    ) -> Result<bool>
    where
        F: FnMut(&mut Builder<'a>, &FlatField) -> Result<ValueId>,
    {
        let result = self.body().result(op, 0);
        let src_ty = self.body().value_type(result).clone();
        let Some(fields) = peel_type(&src_ty, allow_preserve) else {
            return Ok(false);
        };

        let interner = self.ctx.interner;
        let decl = self.body().kind(op).decl().cloned().unwrap_or_default();
        let mut lowered = Vec::with_capacity(fields.len());
        for field in &fields {
            let filtered = filter_annotations(&decl.annotations, field);
            let value = clone(&mut self.builder, field)?;

            let new_op = self.body().defining_op(value);
            let inner_sym = match (decl.inner_sym, new_op) {
                (Some(base), Some(new_op)) => Some(self.symbols.derive(
                    interner,
                    base,
                    &field.suffix,
                    field.ty.is_ground(),
                    TargetKind::Operation(new_op),
                )),
                (None, Some(_)) if filtered.needs_sym => {
                    Some(self.symbols.detached(interner, decl.name.as_deref(), &field.suffix))
                }
                _ => None,
            };

            if let Some(new_op) = new_op {
                if let Some(new_decl) = self.builder.body_mut().kind_mut(new_op).decl_mut() {
                    new_decl.name = decl.name.as_ref().map(|name| format!("{name}{}", field.suffix));
                    new_decl.name_kind = decl.name_kind;
                    new_decl.annotations = filtered.annotations;
                    new_decl.inner_sym = inner_sym;
                }
            }
            lowered.push(value);
        }

        process_users(self.builder.body_mut(), result, &lowered)?;
        Ok(true)
    }

    fn emit_connect(&mut self, strict: bool, dest: ValueId, src: ValueId) {
        if strict {
            self.builder.strict_connect(dest, src);
        } else {
            self.builder.connect(dest, src);
        }
    }

    fn lower_connect(&mut self, op: OpId, strict: bool) -> Result<bool> {
        if self.process_write_path(op, strict)? {
            return Ok(true);
        }

        let dest = self.body().operand(op, 0);
        let src = self.body().operand(op, 1);
        // connects always split, even when aggregates are preserved
        let Some(fields) = peel_type(self.body().value_type(dest), false) else {
            return Ok(false);
        };
        for field in &fields {
            let mut src = self.builder.sub_whatever(src, field.index)?;
            let mut dest = self.builder.sub_whatever(dest, field.index)?;
            if field.is_output {
                std::mem::swap(&mut src, &mut dest);
            }
            self.emit_connect(strict, dest, src);
        }
        Ok(true)
    }

    /// Accessor chain from a connect's destination up to the outermost dynamic subaccess
    ///
    /// The first entry feeds the destination directly. Empty when no
    /// dynamic subaccess is on the chain.
    fn write_path(&self, op: OpId) -> Vec<OpId> {
        let body = self.body();
        let mut path = Vec::new();
        let mut value = body.operand(op, 0);
        while let Some(def) = body.defining_op(value) {
            if !body.kind(def).is_accessor() {
                break;
            }
            path.push(def);
            value = body.operand(def, 0);
        }
        while path.last().is_some_and(|last| !is_dynamic_access(body, *last)) {
            path.pop();
        }
        path
    }

    fn clone_access(&mut self, accessor: OpId, input: ValueId) -> Result<ValueId> {
        match *self.body().kind(accessor) {
            OpKind::Subfield { index } => Ok(self.builder.subfield(input, index)?),
            OpKind::Subindex { index } => Ok(self.builder.subindex(input, index)?),
            OpKind::Subaccess => {
                let index = self.body().operand(accessor, 1);
                Ok(self.builder.subaccess(input, index)?)
            }
            ref other => Err(LowerTypesError::UnknownAccessor {
                op: other.mnemonic(),
            }),
        }
    }

    /// Expands a write through a dynamic index into one guarded write per element
    fn process_write_path(&mut self, op: OpId, strict: bool) -> Result<bool> {
        let path = self.write_path(op);
        let Some((&access, inner)) = path.split_last() else {
            return Ok(false);
        };

        let vector = self.body().operand(access, 0);
        let index = self.body().operand(access, 1);
        let src = self.body().operand(op, 1);
        let len = match self.body().value_type(vector) {
            FirType::Vector(vector) => vector.len,
            other => {
                return Err(LowerTypesError::Malformed {
                    what: format!("subaccess of non-vector `{other}`"),
                });
            }
        };
        let width = select_width(len);

        for element in 0..len {
            let constant = self.builder.constant(FirType::uint(width), element as u128);
            let cond = self.builder.eq(index, constant);
            let (_, then_block, _) = self.builder.when(cond, false);

            let after_when = self.builder.insertion_point();
            self.builder.set_insertion_point(InsertPoint {
                block: then_block,
                index: 0,
            });
            let mut leaf = self.builder.subindex(vector, element)?;
            for accessor in inner.iter().rev() {
                leaf = self.clone_access(*accessor, leaf)?;
            }
            self.emit_connect(strict, leaf, src);
            self.builder.set_insertion_point(after_when);
        }

        let body = self.builder.body_mut();
        body.drop_operands(op);
        for accessor in &path {
            if body.op_has_uses(*accessor) {
                break;
            }
            body.erase_op(*accessor)?;
        }
        Ok(true)
    }

    /// Lowers a subaccess read
    fn lower_subaccess(&mut self, op: OpId) -> Result<bool> {
        let input = self.body().operand(op, 0);
        let index = self.body().operand(op, 1);
        let result = self.body().result(op, 0);
        let (len, element) = match self.body().value_type(input) {
            FirType::Vector(vector) => (vector.len, (*vector.element).clone()),
            other => {
                return Err(LowerTypesError::Malformed {
                    what: format!("subaccess of non-vector `{other}`"),
                });
            }
        };

        let replacement = if len == 0 {
            self.builder.invalid(element)
        } else if let Some(value) = self.constant_value(index) {
            self.builder.subindex(input, value as usize)?
        } else {
            let inputs = (0..len)
                .rev()
                .map(|element| self.builder.subindex(input, element))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            self.builder.multibit_mux(index, inputs)?
        };
        self.builder.body_mut().replace_all_uses_with(result, replacement);
        Ok(true)
    }

    fn constant_value(&self, value: ValueId) -> Option<u128> {
        let def = self.body().defining_op(value)?;
        match self.body().kind(def) {
            OpKind::Constant { value } => Some(*value),
            _ => None,
        }
    }

    /// Lowers an instance port by port
    fn lower_instance(&mut self, op: OpId) -> Result<bool> {
        let OpKind::Instance(inst) = self.body().kind(op).clone() else {
            return Ok(false);
        };
        let interner = self.ctx.interner;
        let Some(entry) = self.ctx.modules.get(inst.module) else {
            return Err(LowerTypesError::MissingModule {
                name: interner.resolve(&inst.module).to_owned(),
            });
        };
        let allow_preserve = self.ctx.options.ports_may_preserve(entry);
        let old_results = self.body().op(op).results().to_vec();

        let mut changed = false;
        let mut needs_sym = false;
        let mut ports = Vec::new();
        let mut types = Vec::new();
        let mut ranges = Vec::with_capacity(old_results.len());
        for (port, result) in inst.ports.iter().zip(&old_results) {
            let start = types.len();
            let ty = self.body().value_type(*result).clone();
            match peel_type(&ty, allow_preserve) {
                None => {
                    ports.push(port.clone());
                    types.push(ty);
                }
                Some(fields) => {
                    changed = true;
                    for field in &fields {
                        let filtered = filter_annotations(&port.annotations, field);
                        needs_sym |= filtered.needs_sym;
                        ports.push(InstancePort {
                            name: format!("{}{}", port.name, field.suffix),
                            direction: port.direction.flip_if(field.is_output),
                            annotations: filtered.annotations,
                        });
                        types.push(field.ty.clone());
                    }
                }
            }
            ranges.push(start..types.len());
        }
        if !changed {
            return Ok(false);
        }

        let mut decl = inst.decl.clone();
        if decl.inner_sym.is_none() && needs_sym {
            let name = decl.name.as_deref().unwrap_or_default();
            decl.inner_sym = Some(self.symbols.fresh(interner, &format!("sym{name}")));
        }
        let new_inst = self.builder.instance(
            InstanceDecl {
                decl,
                module: inst.module,
                ports,
                lower_to_bind: inst.lower_to_bind,
            },
            types.clone(),
        );

        let new_results = self.body().op(new_inst).results().to_vec();
        for (result, range) in old_results.into_iter().zip(ranges) {
            let same_type = range.len() == 1
                && self.body().value_type(result) == &types[range.start];
            let lowered = &new_results[range];
            if same_type {
                self.builder.body_mut().replace_all_uses_with(result, lowered[0]);
            } else {
                process_users(self.builder.body_mut(), result, lowered)?;
            }
        }
        Ok(true)
    }
}
