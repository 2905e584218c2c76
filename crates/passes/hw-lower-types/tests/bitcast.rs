//! Bit casts into and out of aggregates

mod common;

use common::{lower, module, ops_named, single_module_circuit};
use expect_test::expect;
use hw_intern::Interner;
use hw_ir::{BundleElement, Builder, DeclInfo, FirType, ModulePrinter, PortInfo};
use hw_lower_types::{LowerTypes, LowerTypesError, LowerTypesOptions};

#[test_log::test]
fn test_aggregate_source_is_concatenated() {
    let interner = Interner::new();
    let ty = FirType::bundle(vec![
        BundleElement::new("a", FirType::uint(3)),
        BundleElement::new("b", FirType::sint(5)),
    ]);
    let mut m = module(
        &interner,
        "M",
        vec![PortInfo::input("x", ty), PortInfo::output("o", FirType::uint(8))],
    );
    {
        let body = m.body.as_mut().expect("body");
        let args = body.args().to_vec();
        let entry = body.entry();
        let mut b = Builder::at_end(body, entry);
        let cast = b.bitcast(FirType::uint(8), args[0]);
        b.connect(args[1], cast);
    }
    let mut circuit = single_module_circuit(&interner, m);
    lower(&mut circuit, &interner);

    expect![[r#"
        module @M(in x_a: UInt<3>, in x_b: SInt<5>, out o: UInt<8>) {
          %0 = bitcast %x_b : UInt<5>
          %1 = cat %0, %x_a : UInt<8>
          connect %o, %1
        }
    "#]]
    .assert_eq(&ModulePrinter::new(&circuit.modules[0], &interner).to_string());
}

#[test_log::test]
fn test_aggregate_result_is_sliced() {
    let interner = Interner::new();
    let ty = FirType::bundle(vec![
        BundleElement::new("a", FirType::uint(3)),
        BundleElement::new("b", FirType::uint(5)),
    ]);
    let mut m = module(&interner, "M", vec![PortInfo::input("i", FirType::uint(8))]);
    {
        let body = m.body.as_mut().expect("body");
        let i = body.args()[0];
        let entry = body.entry();
        let mut b = Builder::at_end(body, entry);
        let cast = b.bitcast(ty, i);
        b.node(cast, DeclInfo::named("n"));
    }
    let mut circuit = single_module_circuit(&interner, m);
    lower(&mut circuit, &interner);

    expect![[r#"
        module @M(in i: UInt<8>) {
          %0 = bits %i 2 0 : UInt<3>
          %1 = bits %i 7 3 : UInt<5>
          %2 = node %0 "n_a" : UInt<3>
          %3 = node %1 "n_b" : UInt<5>
        }
    "#]]
    .assert_eq(&ModulePrinter::new(&circuit.modules[0], &interner).to_string());
}

#[test_log::test]
fn test_signed_result_uses_as_sint() {
    let interner = Interner::new();
    let ty = FirType::vector(FirType::uint(2), 2);
    let mut m = module(
        &interner,
        "M",
        vec![PortInfo::input("v", ty), PortInfo::output("o", FirType::sint(4))],
    );
    {
        let body = m.body.as_mut().expect("body");
        let args = body.args().to_vec();
        let entry = body.entry();
        let mut b = Builder::at_end(body, entry);
        let cast = b.bitcast(FirType::sint(4), args[0]);
        b.connect(args[1], cast);
    }
    let mut circuit = single_module_circuit(&interner, m);
    lower(&mut circuit, &interner);

    let body = circuit.modules[0].body.as_ref().expect("body");
    assert_eq!(ops_named(body, "cat").len(), 1);
    assert_eq!(ops_named(body, "asSInt").len(), 1);
    assert!(ops_named(body, "bitcast").is_empty());
}

#[test_log::test]
fn test_ground_casts_are_untouched() {
    let interner = Interner::new();
    let mut m = module(&interner, "M", vec![PortInfo::input("i", FirType::sint(8))]);
    {
        let body = m.body.as_mut().expect("body");
        let i = body.args()[0];
        let entry = body.entry();
        let mut b = Builder::at_end(body, entry);
        b.bitcast(FirType::uint(8), i);
    }
    let mut circuit = single_module_circuit(&interner, m);
    lower(&mut circuit, &interner);

    let body = circuit.modules[0].body.as_ref().expect("body");
    assert_eq!(ops_named(body, "bitcast").len(), 1);
}

#[test_log::test]
fn test_unknown_width_is_fatal() {
    let interner = Interner::new();
    let ty = FirType::bundle(vec![BundleElement::new("a", FirType::UInt(None))]);
    let mut m = module(&interner, "M", vec![PortInfo::input("x", ty)]);
    {
        let body = m.body.as_mut().expect("body");
        let x = body.args()[0];
        let entry = body.entry();
        let mut b = Builder::at_end(body, entry);
        b.bitcast(FirType::uint(4), x);
    }
    let mut circuit = single_module_circuit(&interner, m);
    let err = LowerTypes::new(LowerTypesOptions::default())
        .run(&mut circuit, &interner)
        .unwrap_err();
    assert_eq!(
        err,
        LowerTypesError::MissingWidth {
            ty: FirType::UInt(None)
        }
    );
}

fn lowering_error(interner: &Interner, m: hw_ir::Module) -> LowerTypesError {
    let mut circuit = single_module_circuit(interner, m);
    LowerTypes::new(LowerTypesOptions::default())
        .run(&mut circuit, interner)
        .unwrap_err()
}

#[test_log::test]
fn test_slices_past_bit_range_are_malformed() {
    let interner = Interner::new();
    let ty = FirType::bundle(vec![
        BundleElement::new("a", FirType::uint(u32::MAX)),
        BundleElement::new("b", FirType::uint(2)),
    ]);
    let mut m = module(&interner, "M", vec![PortInfo::input("i", FirType::uint(8))]);
    {
        let body = m.body.as_mut().expect("body");
        let i = body.args()[0];
        let entry = body.entry();
        let mut b = Builder::at_end(body, entry);
        let cast = b.bitcast(ty, i);
        b.node(cast, DeclInfo::named("n"));
    }
    let err = lowering_error(&interner, m);
    assert!(matches!(err, LowerTypesError::Malformed { .. }), "{err}");
}

#[test_log::test]
fn test_concatenation_past_32_bits_is_rejected() {
    let interner = Interner::new();
    let ty = FirType::bundle(vec![
        BundleElement::new("a", FirType::uint(u32::MAX)),
        BundleElement::new("b", FirType::uint(1)),
    ]);
    let mut m = module(&interner, "M", vec![PortInfo::input("x", ty)]);
    {
        let body = m.body.as_mut().expect("body");
        let x = body.args()[0];
        let entry = body.entry();
        let mut b = Builder::at_end(body, entry);
        b.bitcast(FirType::uint(8), x);
    }
    assert_eq!(
        lowering_error(&interner, m),
        LowerTypesError::Ir(hw_ir::IrError::WidthOverflow {
            width: u64::from(u32::MAX) + 1
        })
    );
}
