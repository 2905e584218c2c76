//! Aggregate type lowering
//!
//! Rewrites every module of a [`Circuit`] so that bundles and vectors are
//! replaced by their ground leaves. Wires, registers, nodes, memories,
//! instances and ports are split field by field; connects are split in
//! lock-step; dynamic vector accesses become multiplexers or guarded writes.
//!
//! Modules are lowered in parallel. Symbols that were split are collected per
//! module and, once every module is done, hierarchical paths ending at them
//! are rewritten to address the new leaves.
//!
//! ```ignore
//! let options = LowerTypesOptions::new().preserve_aggregate(true);
//! let stats = LowerTypes::new(options).run(&mut circuit, &interner)?;
//! ```

mod annotations;
mod bitcast;
mod config;
mod error;
mod hierpath;
mod memory;
mod module;
mod peel;
mod renames;
mod visitor;

pub use annotations::{filter_annotations, retarget_port_annotations, FilteredAnnotations};
pub use config::LowerTypesOptions;
pub use error::{ConfigError, LowerTypesError, Result};
pub use peel::{is_preservable_aggregate, peel_type, FlatField};
pub use renames::{ModuleRenames, RenameTarget, SymbolTracker, TargetKind};

use hw_intern::Interner;
use hw_ir::{Circuit, ModuleTable};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// Counter behind `__GEN_<n>` symbols, shared by every module and every run
static UNIQUE_ID: AtomicU64 = AtomicU64::new(0);

/// Read-only state shared by all module lowerings of one run
pub(crate) struct PassContext<'a> {
    pub(crate) options: LowerTypesOptions,
    pub(crate) modules: &'a ModuleTable,
    pub(crate) interner: &'a Interner,
}

/// Fresh base for a symbol that has no name to derive from
pub(crate) fn unique_name() -> String {
    format!("__GEN_{}", UNIQUE_ID.fetch_add(1, Ordering::Relaxed))
}

/// Summary of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LowerTypesStats {
    /// Modules visited
    pub modules: usize,
    /// Original inner symbols that were split
    pub renamed_symbols: usize,
    /// Leaves now standing in for those symbols
    pub rename_targets: usize,
    /// Hierarchical paths split to follow them
    pub paths_rewritten: usize,
}

/// The aggregate type lowering pass
#[derive(Debug, Clone, Default)]
pub struct LowerTypes {
    options: LowerTypesOptions,
}

impl LowerTypes {
    /// Pass with the given options
    pub fn new(options: LowerTypesOptions) -> Self {
        Self { options }
    }

    /// Options in effect
    pub fn options(&self) -> &LowerTypesOptions {
        &self.options
    }

    /// Lowers every module of `circuit`, then updates its hierarchical paths
    ///
    /// # Errors
    ///
    /// Returns the first invariant violation hit by any module. The circuit
    /// is left partially rewritten in that case.
    pub fn run(&self, circuit: &mut Circuit, interner: &Interner) -> Result<LowerTypesStats> {
        let modules = ModuleTable::new(circuit);
        let ctx = PassContext {
            options: self.options,
            modules: &modules,
            interner,
        };

        let collected = Mutex::new(Vec::with_capacity(circuit.modules.len()));
        circuit
            .modules
            .par_iter_mut()
            .enumerate()
            .try_for_each(|(index, module)| -> Result<()> {
                let renames = module::lower_module(module, index, &ctx)?;
                if !renames.is_empty() {
                    collected
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .push(renames);
                }
                Ok(())
            })?;

        let mut renames = collected.into_inner().unwrap_or_else(PoisonError::into_inner);
        renames.sort_by_key(|renames| renames.module_index);

        let mut stats = LowerTypesStats {
            modules: circuit.modules.len(),
            renamed_symbols: renames.iter().map(|r| r.renames.len()).sum(),
            rename_targets: renames.iter().map(ModuleRenames::target_count).sum(),
            paths_rewritten: 0,
        };
        debug!(
            symbols = stats.renamed_symbols,
            targets = stats.rename_targets,
            "updating hierarchical paths"
        );
        stats.paths_rewritten = hierpath::update_hier_paths(circuit, &renames, interner)?;

        info!(
            circuit = interner.resolve(&circuit.name),
            modules = stats.modules,
            renamed_symbols = stats.renamed_symbols,
            paths_rewritten = stats.paths_rewritten,
            "lowered aggregate types"
        );
        Ok(stats)
    }
}
