//! Splitting annotations across the fields of a lowered aggregate

use crate::peel::FlatField;
use hw_ir::{
    Annotation, AnnotationSet, BundleType, DONT_TOUCH_CLASS, FIELD_ID_MEMBER, SIGNAL_DRIVER_CLASS,
};

/// Annotations that apply to one field, and whether that field needs a symbol
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredAnnotations {
    /// Annotations retargeted to the field
    pub annotations: AnnotationSet,
    /// Set when the field must carry an inner symbol
    pub needs_sym: bool,
}

fn is_field_id_sensitive(anno: &Annotation) -> bool {
    anno.is_class(SIGNAL_DRIVER_CLASS)
}

/// Bumps the `fieldID` member of field-ID-sensitive annotations by `field_id`
fn replicate(mut anno: Annotation, field_id: u64) -> Annotation {
    if field_id == 0 || !is_field_id_sensitive(&anno) {
        return anno;
    }
    let existing = anno
        .members
        .get(FIELD_ID_MEMBER)
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0);
    anno.members
        .insert(FIELD_ID_MEMBER.to_owned(), (existing + field_id).into());
    anno
}

/// Selects the annotations of an aggregate that apply to `field`
pub fn filter_annotations(annotations: &AnnotationSet, field: &FlatField) -> FilteredAnnotations {
    let mut out = FilteredAnnotations::default();
    let is_ground = field.ty.is_ground();
    let last = field.field_id + field.ty.max_field_id();

    for anno in annotations {
        let keep = match anno.field_id {
            None => replicate(anno.clone(), field.field_id),
            Some(0) => Annotation {
                field_id: None,
                ..anno.clone()
            },
            Some(id) if id < field.field_id || id > last => continue,
            Some(id) if id > field.field_id => Annotation {
                field_id: Some(id - field.field_id),
                ..anno.clone()
            },
            Some(_) if anno.is_class(DONT_TOUCH_CLASS) => {
                out.needs_sym = true;
                continue;
            }
            Some(_) => Annotation {
                field_id: None,
                ..anno.clone()
            },
        };
        if is_ground && keep.nonlocal.is_some() {
            out.needs_sym = true;
        }
        out.annotations.push(keep);
    }
    out
}

/// Readdresses memory port annotations onto the port of the memory holding `field`
///
/// `old_port` and `new_port` are the port bundle types before and after the
/// data type was narrowed to `field.ty`.
pub fn retarget_port_annotations(
    annotations: &AnnotationSet,
    old_port: &BundleType,
    new_port: &BundleType,
    field: &FlatField,
) -> AnnotationSet {
    let mut out = AnnotationSet::new();
    for anno in annotations {
        let id = match anno.field_id {
            None | Some(0) => {
                out.push(anno.clone());
                continue;
            }
            Some(id) => id,
        };
        let target = old_port.index_for_field_id(id);
        let old_base = old_port.field_id(target);
        let new_base = new_port.field_id(target);
        if id == old_base {
            out.push(Annotation {
                field_id: Some(new_base),
                ..anno.clone()
            });
            continue;
        }
        let aggregate = old_port
            .elements
            .get(target)
            .is_some_and(|elt| elt.ty.is_aggregate());
        if !aggregate {
            continue;
        }
        let first = old_base + field.field_id;
        if id >= first && id <= first + field.ty.max_field_id() {
            out.push(Annotation {
                field_id: Some(id - first + new_base),
                ..anno.clone()
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peel::peel_type;
    use hw_intern::Interner;
    use hw_ir::{BundleElement, FirType, MemDecl, PortKind};

    fn two_field_bundle() -> FirType {
        // {a: UInt<1>, b: {c: UInt<1>, d: UInt<1>}}: a=1, b=2, b.c=3, b.d=4
        FirType::bundle(vec![
            BundleElement::new("a", FirType::uint(1)),
            BundleElement::new(
                "b",
                FirType::bundle(vec![
                    BundleElement::new("c", FirType::uint(1)),
                    BundleElement::new("d", FirType::uint(1)),
                ]),
            ),
        ])
    }

    #[test]
    fn test_range_and_rebase() {
        let fields = peel_type(&two_field_bundle(), false).unwrap();
        let annos: AnnotationSet = [
            Annotation::new("x.A").with_field_id(1),
            Annotation::new("x.B").with_field_id(4),
            Annotation::new("x.Whole").with_field_id(0),
            Annotation::new("x.Plain"),
        ]
        .into_iter()
        .collect();

        let a = filter_annotations(&annos, &fields[0]);
        let classes: Vec<_> = a.annotations.iter().map(|x| (x.class.as_str(), x.field_id)).collect();
        assert_eq!(
            classes,
            vec![("x.A", None), ("x.Whole", None), ("x.Plain", None)]
        );
        assert!(!a.needs_sym);

        let b = filter_annotations(&annos, &fields[1]);
        let classes: Vec<_> = b.annotations.iter().map(|x| (x.class.as_str(), x.field_id)).collect();
        assert_eq!(
            classes,
            vec![("x.B", Some(2)), ("x.Whole", None), ("x.Plain", None)]
        );
    }

    #[test]
    fn test_dont_touch_on_field_becomes_symbol() {
        let interner = Interner::new();
        let nla = interner.intern("nla");
        let ty = FirType::bundle(vec![
            BundleElement::new("a", FirType::uint(1)),
            BundleElement::new("b", FirType::uint(1)),
        ]);
        let fields = peel_type(&ty, false).unwrap();
        let annos: AnnotationSet = [Annotation::new(DONT_TOUCH_CLASS)
            .with_field_id(2)
            .with_nonlocal(nla)]
        .into_iter()
        .collect();

        let a = filter_annotations(&annos, &fields[0]);
        assert!(a.annotations.is_empty());
        assert!(!a.needs_sym);

        let b = filter_annotations(&annos, &fields[1]);
        assert!(b.annotations.is_empty());
        assert!(b.needs_sym);
    }

    #[test]
    fn test_nonlocal_on_ground_field_needs_symbol() {
        let interner = Interner::new();
        let nla = interner.intern("nla");
        let fields = peel_type(&two_field_bundle(), false).unwrap();
        let annos: AnnotationSet = [Annotation::new("x.Tap").with_nonlocal(nla)]
            .into_iter()
            .collect();

        assert!(filter_annotations(&annos, &fields[0]).needs_sym);
        // `b` is still an aggregate; its leaves will decide later
        assert!(!filter_annotations(&annos, &fields[1]).needs_sym);
    }

    #[test]
    fn test_signal_driver_field_id_is_bumped() {
        let fields = peel_type(&two_field_bundle(), false).unwrap();
        let annos: AnnotationSet = [
            Annotation::new(SIGNAL_DRIVER_CLASS).with_member(FIELD_ID_MEMBER, 1.into()),
            Annotation::new("x.Other"),
        ]
        .into_iter()
        .collect();

        let b = filter_annotations(&annos, &fields[1]);
        assert_eq!(b.annotations.0[0].members[FIELD_ID_MEMBER], serde_json::json!(3));
        assert!(!b.annotations.0[1].members.contains_key(FIELD_ID_MEMBER));
    }

    #[test]
    fn test_port_annotation_retargeting() {
        let data = two_field_bundle();
        let FirType::Bundle(old_port) = MemDecl::port_type_for(4, &data, PortKind::Read) else {
            unreachable!()
        };
        let fields = peel_type(&data, false).unwrap();
        // addr=1 en=2 clk=3 data=4, data.a=5, data.b=6, data.b.c=7, data.b.d=8
        let annos: AnnotationSet = [
            Annotation::new("x.Clk").with_field_id(3),
            Annotation::new("x.Data").with_field_id(4),
            Annotation::new("x.DataA").with_field_id(5),
            Annotation::new("x.DataBD").with_field_id(8),
        ]
        .into_iter()
        .collect();

        let FirType::Bundle(port_a) = MemDecl::port_type_for(4, &fields[0].ty, PortKind::Read)
        else {
            unreachable!()
        };
        let on_a = retarget_port_annotations(&annos, &old_port, &port_a, &fields[0]);
        let summary: Vec<_> = on_a.iter().map(|x| (x.class.as_str(), x.field_id)).collect();
        assert_eq!(
            summary,
            vec![("x.Clk", Some(3)), ("x.Data", Some(4)), ("x.DataA", Some(4))]
        );

        let FirType::Bundle(port_b) = MemDecl::port_type_for(4, &fields[1].ty, PortKind::Read)
        else {
            unreachable!()
        };
        let on_b = retarget_port_annotations(&annos, &old_port, &port_b, &fields[1]);
        let summary: Vec<_> = on_b.iter().map(|x| (x.class.as_str(), x.field_id)).collect();
        assert_eq!(
            summary,
            vec![("x.Clk", Some(3)), ("x.Data", Some(4)), ("x.DataBD", Some(6))]
        );
    }
}
