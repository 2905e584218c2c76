//! Rewriting hierarchical paths whose final symbol was split

use crate::error::{LowerTypesError, Result};
use crate::renames::{ModuleRenames, RenameTarget, TargetKind};
use hw_intern::{Interner, Symbol};
use hw_ir::{
    AnnotationSet, Circuit, CircuitNamespace, HierPath, HierPathTable, InnerRef, PathSegment,
};
use tracing::debug;

/// Annotations of the entity a rename target names
fn target_annotations<'c>(
    circuit: &'c mut Circuit,
    module_index: usize,
    target: RenameTarget,
) -> Option<&'c mut AnnotationSet> {
    let module = circuit.modules.get_mut(module_index)?;
    match target.kind {
        TargetKind::Operation(op) => {
            let body = module.body.as_mut()?;
            Some(&mut body.kind_mut(op).decl_mut()?.annotations)
        }
        TargetKind::Port => {
            let index = module.port_with_sym(target.sym)?;
            Some(&mut module.ports[index].annotations)
        }
    }
}

/// Splits every path ending at a renamed symbol into one path per new leaf
///
/// The first leaf keeps the path's name, later ones get fresh names. Returns
/// the number of original paths that were rewritten.
pub(crate) fn update_hier_paths(
    circuit: &mut Circuit,
    renames: &[ModuleRenames],
    interner: &Interner,
) -> Result<usize> {
    let mut table = HierPathTable::new(circuit);
    let mut namespace = CircuitNamespace::new(circuit, interner);
    let mut rewritten = 0;

    for module_renames in renames {
        for (old, targets) in &module_renames.renames {
            let candidates: Vec<Symbol> = table.lookup(old.module).to_vec();
            for path_name in candidates {
                let ends_at_old = circuit
                    .hier_paths
                    .get(&path_name)
                    .is_some_and(|path| path.target() == Some(*old));
                if !ends_at_old {
                    continue;
                }
                let Some(path) = table.erase(path_name, circuit) else {
                    continue;
                };

                for (position, target) in targets.iter().enumerate() {
                    let name = if position == 0 {
                        path_name
                    } else {
                        interner.intern(&namespace.new_name(interner.resolve(&path_name)))
                    };
                    let mut namepath = path.namepath.clone();
                    if let Some(last) = namepath.last_mut() {
                        *last = PathSegment::InnerRef(InnerRef::new(old.module, target.sym));
                    }

                    let Some(annotations) =
                        target_annotations(circuit, module_renames.module_index, *target)
                    else {
                        return Err(LowerTypesError::Malformed {
                            what: format!(
                                "rename target @{} has no annotations",
                                interner.resolve(&target.sym)
                            ),
                        });
                    };
                    annotations.redirect_nonlocal(path_name, name);

                    debug!(
                        path = interner.resolve(&name),
                        target = interner.resolve(&target.sym),
                        "rewrote hierarchical path"
                    );
                    table.add(HierPath { name, namepath }, circuit);
                }
                rewritten += 1;
            }
        }
    }
    Ok(rewritten)
}
