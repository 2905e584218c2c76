//! Lowering one module: its body first, then its ports

use crate::annotations::filter_annotations;
use crate::error::Result;
use crate::peel::peel_type;
use crate::renames::{ModuleRenames, SymbolTracker, TargetKind};
use crate::visitor::{process_users, TypeLoweringVisitor};
use crate::PassContext;
use hw_ir::{Builder, Module, ModuleEntry, PortInfo};
use tracing::debug;

/// Lowers every aggregate in `module`, which sits at `index` in the circuit
pub(crate) fn lower_module(module: &mut Module, index: usize, ctx: &PassContext<'_>) -> Result<ModuleRenames> {
    let mut symbols = SymbolTracker::for_module(module, ctx.interner);

    if let Some(body) = module.body.as_mut() {
        let entry = body.entry();
        let mut visitor = TypeLoweringVisitor::new(Builder::at_end(body, entry), ctx, &mut symbols);
        visitor.lower_block(entry)?;
    }

    let allow_preserve = ctx.options.ports_may_preserve(ModuleEntry {
        kind: module.kind,
        visibility: module.visibility,
    });
    lower_ports(module, allow_preserve, ctx, &mut symbols)?;

    if let Some(body) = module.body.as_mut() {
        body.compact();
    }

    let renames = symbols.finish(index);
    if !renames.is_empty() {
        debug!(
            module = ctx.interner.resolve(&module.name),
            symbols = renames.renames.len(),
            targets = renames.target_count(),
            "recorded inner symbol renames"
        );
    }
    Ok(renames)
}

/// Replaces aggregate ports by their fields, in place
///
/// New ports go right after the port they replace and are visited next, so
/// nested aggregates keep splitting until the policy stops them.
fn lower_ports(
    module: &mut Module,
    allow_preserve: bool,
    ctx: &PassContext<'_>,
    symbols: &mut SymbolTracker,
) -> Result<()> {
    let interner = ctx.interner;
    let mut index = 0;
    while index < module.ports.len() {
        let port = module.ports[index].clone();
        let Some(fields) = peel_type(&port.ty, allow_preserve) else {
            index += 1;
            continue;
        };

        let mut new_ports = Vec::with_capacity(fields.len());
        for field in &fields {
            let filtered = filter_annotations(&port.annotations, field);
            let inner_sym = match port.inner_sym {
                Some(base) => Some(symbols.derive(
                    interner,
                    base,
                    &field.suffix,
                    field.ty.is_ground(),
                    TargetKind::Port,
                )),
                None if filtered.needs_sym => {
                    Some(symbols.detached(interner, Some(&port.name), &field.suffix))
                }
                None => None,
            };
            new_ports.push(PortInfo {
                name: format!("{}{}", port.name, field.suffix),
                ty: field.ty.clone(),
                direction: port.direction.flip_if(field.is_output),
                inner_sym,
                annotations: filtered.annotations,
            });
        }

        if let Some(body) = module.body.as_mut() {
            let lowered: Vec<_> = fields
                .iter()
                .enumerate()
                .map(|(offset, field)| body.insert_argument(index + 1 + offset, field.ty.clone()))
                .collect();
            let old = body.args()[index];
            process_users(body, old, &lowered)?;
            body.remove_argument(index);
        }
        module.ports.splice(index..=index, new_ports);
    }
    Ok(())
}
