//! Shared helpers for building and inspecting circuits

#![allow(dead_code, reason = "not every test file uses every helper")]

use hw_intern::Interner;
use hw_ir::{Body, Circuit, FirType, Module, OpId, OpKind, PortInfo, Visibility};
use hw_lower_types::{LowerTypes, LowerTypesOptions, LowerTypesStats};

/// Circuit named `Top` whose only module is `module`
pub fn single_module_circuit(interner: &Interner, module: Module) -> Circuit {
    let mut circuit = Circuit::new(interner.intern("Top"));
    circuit.add_module(module);
    circuit
}

/// Empty internal module
pub fn module(interner: &Interner, name: &str, ports: Vec<PortInfo>) -> Module {
    Module::new(interner.intern(name), ports)
}

/// Empty private internal module
pub fn private_module(interner: &Interner, name: &str, ports: Vec<PortInfo>) -> Module {
    Module::new(interner.intern(name), ports).with_visibility(Visibility::Private)
}

/// Runs the pass with default options
pub fn lower(circuit: &mut Circuit, interner: &Interner) -> LowerTypesStats {
    lower_with(circuit, interner, LowerTypesOptions::default())
}

/// Runs the pass with `options`
pub fn lower_with(
    circuit: &mut Circuit,
    interner: &Interner,
    options: LowerTypesOptions,
) -> LowerTypesStats {
    LowerTypes::new(options)
        .run(circuit, interner)
        .expect("lowering failed")
}

/// Live operations with mnemonic `mnemonic`, in walk order
pub fn ops_named(body: &Body, mnemonic: &str) -> Vec<OpId> {
    body.all_ops()
        .into_iter()
        .filter(|op| body.kind(*op).mnemonic() == mnemonic)
        .collect()
}

/// Name given to the declaration defined by `op`
pub fn decl_name(body: &Body, op: OpId) -> Option<&str> {
    body.kind(op).decl()?.name.as_deref()
}

/// Asserts that no live value other than memory ports is an aggregate
pub fn assert_all_ground(module: &Module) {
    for port in &module.ports {
        assert!(port.ty.is_ground(), "port {} is {}", port.name, port.ty);
    }
    let Some(body) = &module.body else {
        return;
    };
    for op in body.all_ops() {
        if matches!(body.kind(op), OpKind::Mem(_)) {
            continue;
        }
        for result in body.op(op).results() {
            let ty: &FirType = body.value_type(*result);
            assert!(ty.is_ground(), "{} produces {ty}", body.kind(op).mnemonic());
        }
    }
}
