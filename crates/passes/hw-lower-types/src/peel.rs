//! One-layer decomposition of aggregate types

use hw_ir::FirType;

/// One field produced by peeling an aggregate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatField {
    /// Field type
    pub ty: FirType,
    /// Position in the parent
    pub index: usize,
    /// Field ID relative to the peeled type
    pub field_id: u64,
    /// Name suffix, `_<name>` or `_<index>`
    pub suffix: String,
    /// Set when the field flows against its parent
    pub is_output: bool,
}

/// Returns true if `ty` may be kept as an aggregate
pub fn is_preservable_aggregate(ty: &FirType) -> bool {
    ty.is_passive() && !ty.contains_analog() && !ty.has_zero_bit_width()
}

/// Peels one layer off `ty`
///
/// `None` means the type stays as is: it is ground, or `allow_preserve` is
/// set and the type is preservable. An empty aggregate yields `Some(vec![])`
/// so that its producer is still removed.
pub fn peel_type(ty: &FirType, allow_preserve: bool) -> Option<Vec<FlatField>> {
    if allow_preserve && is_preservable_aggregate(ty) {
        return None;
    }
    match ty {
        FirType::Bundle(bundle) => Some(
            bundle
                .elements
                .iter()
                .enumerate()
                .map(|(index, elt)| FlatField {
                    ty: elt.ty.clone(),
                    index,
                    field_id: bundle.field_id(index),
                    suffix: format!("_{}", elt.name),
                    is_output: elt.flip,
                })
                .collect(),
        ),
        FirType::Vector(vector) => Some(
            (0..vector.len)
                .map(|index| FlatField {
                    ty: (*vector.element).clone(),
                    index,
                    field_id: vector.field_id(index),
                    suffix: format!("_{index}"),
                    is_output: false,
                })
                .collect(),
        ),
        _ => None,
    }
}
