//! Lowering of operations inside module bodies

mod common;

use common::{assert_all_ground, decl_name, lower, module, ops_named, single_module_circuit};
use expect_test::expect;
use hw_intern::Interner;
use hw_ir::{
    BundleElement, Builder, DeclInfo, FirType, ModulePrinter, OpKind, PortInfo, PrimOp,
};
use hw_lower_types::{LowerTypes, LowerTypesError, LowerTypesOptions};

#[test_log::test]
fn test_flipped_bundle_connect_splits_with_polarity() {
    let interner = Interner::new();
    let ty = FirType::bundle(vec![
        BundleElement::flipped("a", FirType::uint(1)),
        BundleElement::new("b", FirType::uint(1)),
    ]);
    let mut m = module(&interner, "M", vec![]);
    {
        let body = m.body.as_mut().expect("body");
        let entry = body.entry();
        let mut b = Builder::at_end(body, entry);
        let src = b.wire(ty.clone(), DeclInfo::named("src"));
        let src = b.body().result(src, 0);
        let dst = b.wire(ty, DeclInfo::named("dst"));
        let dst = b.body().result(dst, 0);
        b.connect(dst, src);
    }
    let mut circuit = single_module_circuit(&interner, m);
    lower(&mut circuit, &interner);

    let m = &circuit.modules[0];
    assert_all_ground(m);
    expect![[r#"
        module @M() {
          %0 = wire "src_a" : UInt<1>
          %1 = wire "src_b" : UInt<1>
          %2 = wire "dst_a" : UInt<1>
          %3 = wire "dst_b" : UInt<1>
          connect %0, %2
          connect %3, %1
        }
    "#]]
    .assert_eq(&ModulePrinter::new(m, &interner).to_string());
}

#[test_log::test]
fn test_dynamic_read_becomes_multibit_mux() {
    let interner = Interner::new();
    let mut m = module(
        &interner,
        "M",
        vec![
            PortInfo::input("i", FirType::uint(2)),
            PortInfo::input("v", FirType::vector(FirType::uint(8), 4)),
            PortInfo::output("o", FirType::uint(8)),
        ],
    );
    {
        let body = m.body.as_mut().expect("body");
        let args = body.args().to_vec();
        let entry = body.entry();
        let mut b = Builder::at_end(body, entry);
        let read = b.subaccess(args[1], args[0]).expect("subaccess");
        b.connect(args[2], read);
    }
    let mut circuit = single_module_circuit(&interner, m);
    lower(&mut circuit, &interner);

    let m = &circuit.modules[0];
    let body = m.body.as_ref().expect("body");
    let muxes = ops_named(body, "multibit_mux");
    assert_eq!(muxes.len(), 1);
    let args = body.args();
    assert_eq!(
        body.op(muxes[0]).operands(),
        &[args[0], args[4], args[3], args[2], args[1]]
    );
    expect![[r#"
        module @M(in i: UInt<2>, in v_0: UInt<8>, in v_1: UInt<8>, in v_2: UInt<8>, in v_3: UInt<8>, out o: UInt<8>) {
          %0 = multibit_mux %i, %v_3, %v_2, %v_1, %v_0 : UInt<8>
          connect %o, %0
        }
    "#]]
    .assert_eq(&ModulePrinter::new(m, &interner).to_string());
}

#[test_log::test]
fn test_constant_index_read_becomes_subindex() {
    let interner = Interner::new();
    let mut m = module(
        &interner,
        "M",
        vec![
            PortInfo::input("v", FirType::vector(FirType::uint(8), 4)),
            PortInfo::output("o", FirType::uint(8)),
        ],
    );
    {
        let body = m.body.as_mut().expect("body");
        let args = body.args().to_vec();
        let entry = body.entry();
        let mut b = Builder::at_end(body, entry);
        let index = b.constant(FirType::uint(2), 2);
        let read = b.subaccess(args[0], index).expect("subaccess");
        b.connect(args[1], read);
    }
    let mut circuit = single_module_circuit(&interner, m);
    lower(&mut circuit, &interner);

    let body = circuit.modules[0].body.as_ref().expect("body");
    assert!(ops_named(body, "multibit_mux").is_empty());
    let connect = ops_named(body, "connect")[0];
    // v_2 is the third lowered port
    assert_eq!(body.operand(connect, 1), body.args()[2]);
}

#[test_log::test]
fn test_dynamic_write_becomes_guarded_writes() {
    let interner = Interner::new();
    let mut m = module(
        &interner,
        "M",
        vec![
            PortInfo::input("i", FirType::uint(2)),
            PortInfo::input("d", FirType::uint(8)),
        ],
    );
    {
        let body = m.body.as_mut().expect("body");
        let args = body.args().to_vec();
        let entry = body.entry();
        let mut b = Builder::at_end(body, entry);
        let w = b.wire(FirType::vector(FirType::uint(8), 4), DeclInfo::named("w"));
        let w = b.body().result(w, 0);
        let target = b.subaccess(w, args[0]).expect("subaccess");
        b.connect(target, args[1]);
    }
    let mut circuit = single_module_circuit(&interner, m);
    lower(&mut circuit, &interner);

    let m = &circuit.modules[0];
    assert_all_ground(m);
    let body = m.body.as_ref().expect("body");
    let (i, d) = (body.args()[0], body.args()[1]);
    let wires = ops_named(body, "wire");
    let names: Vec<_> = wires.iter().map(|w| decl_name(body, *w)).collect();
    assert_eq!(names, [Some("w_0"), Some("w_1"), Some("w_2"), Some("w_3")]);
    assert!(ops_named(body, "subaccess").is_empty());

    let whens = ops_named(body, "when");
    assert_eq!(whens.len(), 4);
    for (k, when) in whens.iter().enumerate() {
        let cond = body.defining_op(body.operand(*when, 0)).expect("condition");
        assert_eq!(body.kind(cond), &OpKind::Prim(PrimOp::Eq));
        assert_eq!(body.operand(cond, 0), i);
        let constant = body.defining_op(body.operand(cond, 1)).expect("constant");
        assert_eq!(body.kind(constant), &OpKind::Constant { value: k as u128 });
        assert_eq!(body.value_type(body.result(constant, 0)), &FirType::uint(2));

        let OpKind::When {
            then_block,
            else_block,
        } = *body.kind(*when)
        else {
            unreachable!()
        };
        assert!(else_block.is_none());
        let inner: Vec<_> = body.live_ops(then_block).collect();
        assert_eq!(inner.len(), 1);
        assert_eq!(body.kind(inner[0]), &OpKind::Connect);
        assert_eq!(body.operand(inner[0], 0), body.result(wires[k], 0));
        assert_eq!(body.operand(inner[0], 1), d);
    }
}

#[test_log::test]
fn test_dynamic_write_through_nested_accessors() {
    let interner = Interner::new();
    let element = FirType::bundle(vec![
        BundleElement::new("x", FirType::uint(4)),
        BundleElement::new("y", FirType::uint(4)),
    ]);
    let mut m = module(
        &interner,
        "M",
        vec![
            PortInfo::input("i", FirType::uint(1)),
            PortInfo::input("d", FirType::uint(4)),
        ],
    );
    {
        let body = m.body.as_mut().expect("body");
        let args = body.args().to_vec();
        let entry = body.entry();
        let mut b = Builder::at_end(body, entry);
        let w = b.wire(FirType::vector(element, 2), DeclInfo::named("w"));
        let w = b.body().result(w, 0);
        let slot = b.subaccess(w, args[0]).expect("subaccess");
        let target = b.subfield(slot, 1).expect("subfield");
        b.strict_connect(target, args[1]);
    }
    let mut circuit = single_module_circuit(&interner, m);
    lower(&mut circuit, &interner);

    let m = &circuit.modules[0];
    assert_all_ground(m);
    let body = m.body.as_ref().expect("body");
    let wires = ops_named(body, "wire");
    let names: Vec<_> = wires.iter().filter_map(|w| decl_name(body, *w)).collect();
    assert_eq!(names, ["w_0_x", "w_0_y", "w_1_x", "w_1_y"]);

    let whens = ops_named(body, "when");
    assert_eq!(whens.len(), 2);
    for (k, when) in whens.iter().enumerate() {
        let OpKind::When { then_block, .. } = *body.kind(*when) else {
            unreachable!()
        };
        let inner: Vec<_> = body.live_ops(then_block).collect();
        assert_eq!(inner.len(), 1);
        assert_eq!(body.kind(inner[0]), &OpKind::StrictConnect);
        // y of element k
        assert_eq!(body.operand(inner[0], 0), body.result(wires[2 * k + 1], 0));
    }
}

#[test_log::test]
fn test_empty_vector_read_is_invalid() {
    let interner = Interner::new();
    let mut m = module(
        &interner,
        "M",
        vec![
            PortInfo::input("i", FirType::uint(1)),
            PortInfo::output("o", FirType::uint(3)),
        ],
    );
    {
        let body = m.body.as_mut().expect("body");
        let args = body.args().to_vec();
        let entry = body.entry();
        let mut b = Builder::at_end(body, entry);
        let w = b.wire(FirType::vector(FirType::uint(3), 0), DeclInfo::named("empty"));
        let w = b.body().result(w, 0);
        let read = b.subaccess(w, args[0]).expect("subaccess");
        b.connect(args[1], read);
    }
    let mut circuit = single_module_circuit(&interner, m);
    lower(&mut circuit, &interner);

    expect![[r#"
        module @M(in i: UInt<1>, out o: UInt<3>) {
          %0 = invalid : UInt<3>
          connect %o, %0
        }
    "#]]
    .assert_eq(&ModulePrinter::new(&circuit.modules[0], &interner).to_string());
}

#[test_log::test]
fn test_register_with_reset_splits_init_value() {
    let interner = Interner::new();
    let ty = FirType::bundle(vec![
        BundleElement::new("a", FirType::uint(1)),
        BundleElement::new("b", FirType::sint(4)),
    ]);
    let mut m = module(
        &interner,
        "M",
        vec![
            PortInfo::input("clk", FirType::Clock),
            PortInfo::input("rst", FirType::AsyncReset),
            PortInfo::input("init", ty.clone()),
        ],
    );
    {
        let body = m.body.as_mut().expect("body");
        let args = body.args().to_vec();
        let entry = body.entry();
        let mut b = Builder::at_end(body, entry);
        b.reg_reset(ty, args[0], args[1], args[2], DeclInfo::named("r"));
    }
    let mut circuit = single_module_circuit(&interner, m);
    lower(&mut circuit, &interner);

    expect![[r#"
        module @M(in clk: Clock, in rst: AsyncReset, in init_a: UInt<1>, in init_b: SInt<4>) {
          %0 = regreset %clk, %rst, %init_a "r_a" : UInt<1>
          %1 = regreset %clk, %rst, %init_b "r_b" : SInt<4>
        }
    "#]]
    .assert_eq(&ModulePrinter::new(&circuit.modules[0], &interner).to_string());
}

#[test_log::test]
fn test_mux_and_node_split_per_field() {
    let interner = Interner::new();
    let ty = FirType::vector(FirType::uint(2), 2);
    let mut m = module(
        &interner,
        "M",
        vec![
            PortInfo::input("sel", FirType::uint(1)),
            PortInfo::input("x", ty.clone()),
            PortInfo::input("y", ty.clone()),
        ],
    );
    {
        let body = m.body.as_mut().expect("body");
        let args = body.args().to_vec();
        let entry = body.entry();
        let mut b = Builder::at_end(body, entry);
        let picked = b.mux(args[0], args[1], args[2]);
        b.node(picked, DeclInfo::named("n"));
    }
    let mut circuit = single_module_circuit(&interner, m);
    lower(&mut circuit, &interner);

    expect![[r#"
        module @M(in sel: UInt<1>, in x_0: UInt<2>, in x_1: UInt<2>, in y_0: UInt<2>, in y_1: UInt<2>) {
          %0 = mux %sel, %x_0, %y_0 : UInt<2>
          %1 = mux %sel, %x_1, %y_1 : UInt<2>
          %2 = node %0 "n_0" : UInt<2>
          %3 = node %1 "n_1" : UInt<2>
        }
    "#]]
    .assert_eq(&ModulePrinter::new(&circuit.modules[0], &interner).to_string());
}

#[test_log::test]
fn test_when_blocks_are_lowered() {
    let interner = Interner::new();
    let ty = FirType::bundle(vec![
        BundleElement::new("a", FirType::uint(1)),
        BundleElement::new("b", FirType::uint(1)),
    ]);
    let mut m = module(&interner, "M", vec![PortInfo::input("c", FirType::uint(1))]);
    {
        let body = m.body.as_mut().expect("body");
        let c = body.args()[0];
        let entry = body.entry();
        let mut b = Builder::at_end(body, entry);
        let (_, then_block, else_block) = b.when(c, true);
        let else_block = else_block.expect("else block");
        b.set_insertion_point(hw_ir::InsertPoint {
            block: then_block,
            index: 0,
        });
        b.wire(ty.clone(), DeclInfo::named("t"));
        b.set_insertion_point(hw_ir::InsertPoint {
            block: else_block,
            index: 0,
        });
        b.wire(ty, DeclInfo::named("e"));
    }
    let mut circuit = single_module_circuit(&interner, m);
    lower(&mut circuit, &interner);

    expect![[r#"
        module @M(in c: UInt<1>) {
          when %c {
            %0 = wire "t_a" : UInt<1>
            %1 = wire "t_b" : UInt<1>
          } else {
            %2 = wire "e_a" : UInt<1>
            %3 = wire "e_b" : UInt<1>
          }
        }
    "#]]
    .assert_eq(&ModulePrinter::new(&circuit.modules[0], &interner).to_string());
}

#[test_log::test]
fn test_zero_length_aggregate_is_deleted() {
    let interner = Interner::new();
    let mut m = module(&interner, "M", vec![]);
    {
        let body = m.body.as_mut().expect("body");
        let entry = body.entry();
        let mut b = Builder::at_end(body, entry);
        b.wire(FirType::bundle(vec![]), DeclInfo::named("nothing"));
        b.wire(FirType::vector(FirType::uint(1), 0), DeclInfo::named("none"));
    }
    let mut circuit = single_module_circuit(&interner, m);
    lower(&mut circuit, &interner);

    let body = circuit.modules[0].body.as_ref().expect("body");
    assert!(body.all_ops().is_empty());
}

#[test_log::test]
fn test_aggregate_read_by_primitive_is_fatal() {
    let interner = Interner::new();
    let ty = FirType::bundle(vec![BundleElement::new("a", FirType::uint(1))]);
    let mut m = module(&interner, "M", vec![]);
    {
        let body = m.body.as_mut().expect("body");
        let entry = body.entry();
        let mut b = Builder::at_end(body, entry);
        let w = b.wire(ty, DeclInfo::named("w"));
        let w = b.body().result(w, 0);
        b.prim(PrimOp::Not, vec![w], FirType::uint(1));
    }
    let mut circuit = single_module_circuit(&interner, m);
    let err = LowerTypes::new(LowerTypesOptions::default())
        .run(&mut circuit, &interner)
        .unwrap_err();
    assert!(
        matches!(err, LowerTypesError::UnknownAggregateUser { user: "not", .. }),
        "{err}"
    );
}
