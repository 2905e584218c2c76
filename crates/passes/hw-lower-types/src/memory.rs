//! Splitting memories with aggregate data into one memory per field

use crate::annotations::retarget_port_annotations;
use crate::error::{LowerTypesError, Result};
use crate::peel::{peel_type, FlatField};
use crate::renames::TargetKind;
use crate::visitor::TypeLoweringVisitor;
use hw_ir::{DeclInfo, FirType, MemDecl, MemPort, NameKind, OpId, OpKind, ValueId};

/// Port fields whose type follows the memory's data type
const DATA_FIELDS: [&str; 5] = ["data", "mask", "rdata", "wdata", "wmask"];

fn port_bundle(ty: &FirType) -> Result<&hw_ir::BundleType> {
    match ty {
        FirType::Bundle(bundle) => Ok(bundle),
        other => Err(LowerTypesError::Malformed {
            what: format!("memory port of non-bundle type `{other}`"),
        }),
    }
}

impl TypeLoweringVisitor<'_> {
    /// Replaces a memory by one memory per field of its data type
    ///
    /// Each original port becomes a wire named `<mem>_<port>`. Data and mask
    /// fields are distributed over the new memories, everything else is
    /// broadcast to all of them.
    pub(crate) fn lower_mem(&mut self, op: OpId) -> Result<bool> {
        let OpKind::Mem(mem) = self.body().kind(op).clone() else {
            return Ok(false);
        };
        // memories never keep aggregate data
        let Some(fields) = peel_type(&mem.data_type, false) else {
            return Ok(false);
        };

        let mem_name = mem.decl.name.clone().unwrap_or_default();
        let old_types = mem.port_types();
        let mut port_wires: Vec<ValueId> = Vec::with_capacity(mem.ports.len());
        for (index, (port, ty)) in mem.ports.iter().zip(&old_types).enumerate() {
            let wire = self.builder.wire(
                ty.clone(),
                DeclInfo {
                    name: Some(format!("{mem_name}_{}", port.name)),
                    name_kind: NameKind::Droppable,
                    ..DeclInfo::default()
                },
            );
            let wire = self.body().result(wire, 0);
            let old = self.body().result(op, index);
            self.builder.body_mut().replace_all_uses_with(old, wire);
            port_wires.push(wire);
        }

        let mut memories = Vec::with_capacity(fields.len());
        for field in &fields {
            memories.push(self.clone_mem(&mem, &old_types, field)?);
        }

        for (index, (wire, ty)) in port_wires.iter().zip(&old_types).enumerate() {
            let bundle = port_bundle(ty)?;
            for (field_index, elt) in bundle.elements.iter().enumerate() {
                let old_field = self.builder.subfield(*wire, field_index)?;
                if DATA_FIELDS.contains(&elt.name.as_str()) {
                    for (field, memory) in fields.iter().zip(&memories) {
                        let mut old_leaf = self.builder.sub_whatever(old_field, field.index)?;
                        let new_port = self.body().result(*memory, index);
                        let mut new_field = self.builder.subfield(new_port, field_index)?;
                        if elt.flip {
                            std::mem::swap(&mut old_leaf, &mut new_field);
                        }
                        self.builder.strict_connect(new_field, old_leaf);
                    }
                } else {
                    for memory in &memories {
                        let new_port = self.body().result(*memory, index);
                        let new_field = self.builder.subfield(new_port, field_index)?;
                        self.builder.strict_connect(new_field, old_field);
                    }
                }
            }
        }
        Ok(true)
    }

    fn clone_mem(&mut self, mem: &MemDecl, old_types: &[FirType], field: &FlatField) -> Result<OpId> {
        let interner = self.ctx.interner;
        let mut ports = Vec::with_capacity(mem.ports.len());
        for (port, old_ty) in mem.ports.iter().zip(old_types) {
            let new_ty = MemDecl::port_type_for(mem.depth, &field.ty, port.kind);
            let annotations =
                retarget_port_annotations(&port.annotations, port_bundle(old_ty)?, port_bundle(&new_ty)?, field);
            ports.push(MemPort {
                name: port.name.clone(),
                kind: port.kind,
                annotations,
            });
        }

        let decl = DeclInfo {
            name: mem.decl.name.as_ref().map(|name| format!("{name}{}", field.suffix)),
            name_kind: mem.decl.name_kind,
            annotations: mem.decl.annotations.clone(),
            inner_sym: None,
        };
        let new_mem = self.builder.mem(MemDecl {
            decl,
            data_type: field.ty.clone(),
            ports,
            ..mem.clone()
        });

        if let Some(base) = mem.decl.inner_sym {
            let sym = self.symbols.derive(
                interner,
                base,
                &field.suffix,
                field.ty.is_ground(),
                TargetKind::Operation(new_mem),
            );
            if let Some(decl) = self.builder.body_mut().kind_mut(new_mem).decl_mut() {
                decl.inner_sym = Some(sym);
            }
        }
        Ok(new_mem)
    }
}
