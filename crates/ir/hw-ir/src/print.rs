//! Deterministic textual dump of modules and circuits

use crate::{
    Annotation, AnnotationSet, Body, BlockId, Circuit, DeclInfo, FirType, Module, OpId, OpKind,
    PathSegment, PrimOp, ValueId, Visibility,
};
use hw_intern::{Interner, Symbol};
use rustc_hash::FxHashMap;
use std::fmt::{self, Display, Formatter};

/// Prints a circuit with its paths and modules
pub struct CircuitPrinter<'a> {
    circuit: &'a Circuit,
    interner: &'a Interner,
}

impl<'a> CircuitPrinter<'a> {
    /// Printer for `circuit`
    pub fn new(circuit: &'a Circuit, interner: &'a Interner) -> Self {
        Self { circuit, interner }
    }
}

impl Display for CircuitPrinter<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let interner = self.interner;
        writeln!(f, "circuit @{} {{", interner.resolve(&self.circuit.name))?;
        for path in self.circuit.hier_paths.values() {
            write!(f, "  hierpath @{} [", interner.resolve(&path.name))?;
            for (index, segment) in path.namepath.iter().enumerate() {
                if index > 0 {
                    f.write_str(", ")?;
                }
                match segment {
                    PathSegment::InnerRef(inner) => write!(
                        f,
                        "@{}::@{}",
                        interner.resolve(&inner.module),
                        interner.resolve(&inner.name)
                    )?,
                    PathSegment::Module(module) => write!(f, "@{}", interner.resolve(module))?,
                }
            }
            writeln!(f, "]")?;
        }
        for module in &self.circuit.modules {
            ModulePrinter::new(module, interner).indented(1).fmt(f)?;
        }
        writeln!(f, "}}")
    }
}

/// Prints one module
pub struct ModulePrinter<'a> {
    module: &'a Module,
    interner: &'a Interner,
    indent: usize,
}

impl<'a> ModulePrinter<'a> {
    /// Printer for `module`
    pub fn new(module: &'a Module, interner: &'a Interner) -> Self {
        Self {
            module,
            interner,
            indent: 0,
        }
    }

    /// Starts every line `level` steps in
    #[must_use]
    pub fn indented(mut self, level: usize) -> Self {
        self.indent = level;
        self
    }
}

impl Display for ModulePrinter<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let module = self.module;
        let interner = self.interner;
        pad(f, self.indent)?;
        f.write_str(if module.is_external() {
            "extmodule "
        } else {
            "module "
        })?;
        if module.visibility == Visibility::Private {
            f.write_str("private ")?;
        }
        write!(f, "@{}(", interner.resolve(&module.name))?;
        for (index, port) in module.ports.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}: {}", port.direction.keyword(), port.name, port.ty)?;
            write_sym(f, interner, port.inner_sym)?;
            write_annotations(f, interner, &port.annotations)?;
        }
        f.write_str(")")?;
        let Some(body) = &module.body else {
            return writeln!(f);
        };
        writeln!(f, " {{")?;
        let mut state = BodyPrinter::new(body, interner);
        for (port, arg) in module.ports.iter().zip(body.args()) {
            state.names.insert(*arg, format!("%{}", port.name));
        }
        state.block(f, body.entry(), self.indent + 1)?;
        pad(f, self.indent)?;
        writeln!(f, "}}")
    }
}

fn pad(f: &mut Formatter<'_>, level: usize) -> fmt::Result {
    for _ in 0..level {
        f.write_str("  ")?;
    }
    Ok(())
}

fn write_sym(f: &mut Formatter<'_>, interner: &Interner, sym: Option<Symbol>) -> fmt::Result {
    match sym {
        Some(sym) => write!(f, " sym @{}", interner.resolve(&sym)),
        None => Ok(()),
    }
}

fn write_annotation(f: &mut Formatter<'_>, interner: &Interner, anno: &Annotation) -> fmt::Result {
    f.write_str(&anno.class)?;
    if let Some(field_id) = anno.field_id {
        write!(f, " fieldID={field_id}")?;
    }
    if let Some(path) = anno.nonlocal {
        write!(f, " nonlocal=@{}", interner.resolve(&path))?;
    }
    Ok(())
}

fn write_annotations(
    f: &mut Formatter<'_>,
    interner: &Interner,
    annotations: &AnnotationSet,
) -> fmt::Result {
    if annotations.is_empty() {
        return Ok(());
    }
    f.write_str(" [")?;
    for (index, anno) in annotations.iter().enumerate() {
        if index > 0 {
            f.write_str(", ")?;
        }
        write_annotation(f, interner, anno)?;
    }
    f.write_str("]")
}

fn write_decl(f: &mut Formatter<'_>, interner: &Interner, decl: &DeclInfo) -> fmt::Result {
    if let Some(name) = &decl.name {
        write!(f, " \"{name}\"")?;
    }
    write_sym(f, interner, decl.inner_sym)?;
    write_annotations(f, interner, &decl.annotations)
}

struct BodyPrinter<'a> {
    body: &'a Body,
    interner: &'a Interner,
    names: FxHashMap<ValueId, String>,
    next: usize,
}

impl<'a> BodyPrinter<'a> {
    fn new(body: &'a Body, interner: &'a Interner) -> Self {
        Self {
            body,
            interner,
            names: FxHashMap::default(),
            next: 0,
        }
    }

    fn name(&self, value: ValueId) -> &str {
        self.names.get(&value).map_or("%?", String::as_str)
    }

    fn operands(&self, op: OpId) -> String {
        self.body
            .op(op)
            .operands()
            .iter()
            .map(|value| self.name(*value))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn block(&mut self, f: &mut Formatter<'_>, block: BlockId, level: usize) -> fmt::Result {
        let ops: Vec<OpId> = self.body.live_ops(block).collect();
        for op in ops {
            self.op(f, op, level)?;
        }
        Ok(())
    }

    fn op(&mut self, f: &mut Formatter<'_>, op: OpId, level: usize) -> fmt::Result {
        let body = self.body;
        let interner = self.interner;
        let data = body.op(op);
        pad(f, level)?;

        if !data.results().is_empty() {
            let mut results = Vec::with_capacity(data.results().len());
            for result in data.results() {
                let name = format!("%{}", self.next);
                self.next += 1;
                self.names.insert(*result, name.clone());
                results.push(name);
            }
            write!(f, "{} = ", results.join(", "))?;
        }

        let operand = |index: usize| self.name(data.operands()[index]);
        let result_ty = || {
            data.results()
                .first()
                .map_or(FirType::uint(0), |value| body.value_type(*value).clone())
        };

        match &data.kind {
            OpKind::Wire(decl) => {
                f.write_str("wire")?;
                write_decl(f, interner, decl)?;
                writeln!(f, " : {}", result_ty())
            }
            OpKind::Reg(decl) => {
                write!(f, "reg {}", self.operands(op))?;
                write_decl(f, interner, decl)?;
                writeln!(f, " : {}", result_ty())
            }
            OpKind::RegReset(decl) => {
                write!(f, "regreset {}", self.operands(op))?;
                write_decl(f, interner, decl)?;
                writeln!(f, " : {}", result_ty())
            }
            OpKind::Node(decl) => {
                write!(f, "node {}", self.operands(op))?;
                write_decl(f, interner, decl)?;
                writeln!(f, " : {}", result_ty())
            }
            OpKind::Mem(mem) => {
                f.write_str("mem")?;
                write_decl(f, interner, &mem.decl)?;
                write!(f, " {} x {} (", mem.data_type, mem.depth)?;
                for (index, port) in mem.ports.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", port.name, port.kind.keyword())?;
                    write_annotations(f, interner, &port.annotations)?;
                }
                writeln!(f, ")")
            }
            OpKind::Instance(inst) => {
                f.write_str("instance")?;
                write_decl(f, interner, &inst.decl)?;
                write!(f, " @{}(", interner.resolve(&inst.module))?;
                for (index, (port, result)) in inst.ports.iter().zip(data.results()).enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(
                        f,
                        "{} {}: {}",
                        port.direction.keyword(),
                        port.name,
                        body.value_type(*result)
                    )?;
                    write_annotations(f, interner, &port.annotations)?;
                }
                writeln!(f, ")")
            }
            OpKind::Constant { value } => writeln!(f, "constant {value} : {}", result_ty()),
            OpKind::Invalid => writeln!(f, "invalid : {}", result_ty()),
            OpKind::Subfield { index } => {
                let input = data.operands()[0];
                match body.value_type(input) {
                    FirType::Bundle(bundle) if *index < bundle.elements.len() => writeln!(
                        f,
                        "subfield {}.{} : {}",
                        operand(0),
                        bundle.elements[*index].name,
                        result_ty()
                    ),
                    _ => writeln!(f, "subfield {}.{index} : {}", operand(0), result_ty()),
                }
            }
            OpKind::Subindex { index } => {
                writeln!(f, "subindex {}[{index}] : {}", operand(0), result_ty())
            }
            OpKind::Subaccess => {
                writeln!(f, "subaccess {}[{}] : {}", operand(0), operand(1), result_ty())
            }
            OpKind::Prim(PrimOp::Bits { hi, lo }) => {
                writeln!(f, "bits {} {hi} {lo} : {}", operand(0), result_ty())
            }
            OpKind::Connect | OpKind::StrictConnect => {
                writeln!(f, "{} {}", data.kind.mnemonic(), self.operands(op))
            }
            OpKind::When {
                then_block,
                else_block,
            } => {
                writeln!(f, "when {} {{", operand(0))?;
                let (then_block, else_block) = (*then_block, *else_block);
                self.block(f, then_block, level + 1)?;
                if let Some(else_block) = else_block {
                    pad(f, level)?;
                    writeln!(f, "}} else {{")?;
                    self.block(f, else_block, level + 1)?;
                }
                pad(f, level)?;
                writeln!(f, "}}")
            }
            kind => writeln!(
                f,
                "{} {} : {}",
                kind.mnemonic(),
                self.operands(op),
                result_ty()
            ),
        }
    }
}
