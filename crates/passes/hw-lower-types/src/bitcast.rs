//! Bit casts to and from aggregates

use crate::error::{LowerTypesError, Result};
use crate::peel::peel_type;
use crate::visitor::TypeLoweringVisitor;
use hw_ir::{FirType, OpId, ValueId};

fn width_of(ty: &FirType) -> Result<u32> {
    let width = ty
        .bit_width()
        .ok_or_else(|| LowerTypesError::MissingWidth { ty: ty.clone() })?;
    u32::try_from(width).map_err(|_| LowerTypesError::Malformed {
        what: format!("bit width {width} of `{ty}` does not fit in 32 bits"),
    })
}

impl TypeLoweringVisitor<'_> {
    /// Lowers a bit cast with an aggregate on either side
    ///
    /// An aggregate source is flattened into one unsigned value, leaves
    /// concatenated with the first leaf in the low bits. An aggregate result
    /// is sliced back out of that value in the same leaf order.
    pub(crate) fn lower_bitcast(&mut self, op: OpId) -> Result<bool> {
        let input = self.body().operand(op, 0);
        let result = self.body().result(op, 0);
        let input_ty = self.body().value_type(input).clone();
        let result_ty = self.body().value_type(result).clone();
        if input_ty.is_ground() && result_ty.is_ground() {
            return Ok(false);
        }

        let flat = match peel_type(&input_ty, false) {
            Some(fields) => {
                let mut flat: Option<ValueId> = None;
                for field in &fields {
                    let width = width_of(&field.ty)?;
                    if width == 0 {
                        continue;
                    }
                    let leaf = self.builder.sub_whatever(input, field.index)?;
                    let leaf = self.leaf_as_uint(leaf, width);
                    flat = Some(match flat {
                        None => leaf,
                        Some(low) => self.builder.cat(leaf, low)?,
                    });
                }
                match flat {
                    Some(flat) => flat,
                    None => self.builder.constant(FirType::uint(0), 0),
                }
            }
            None if matches!(input_ty, FirType::UInt(_)) => input,
            None => self.builder.as_uint(input)?,
        };

        if result_ty.is_aggregate() {
            let mut low_bit = 0u64;
            return self.lower_producer(op, false, |b, field| {
                let width = width_of(&field.ty)?;
                if width == 0 {
                    return Ok(b.invalid(field.ty.clone()));
                }
                let hi = low_bit + u64::from(width) - 1;
                let (Ok(hi), Ok(lo)) = (u32::try_from(hi), u32::try_from(low_bit)) else {
                    return Err(LowerTypesError::Malformed {
                        what: format!("bit cast slice of `{}` ends at bit {hi}", field.ty),
                    });
                };
                let bits = b.bits(flat, hi, lo);
                low_bit += u64::from(width);
                if field.ty == FirType::uint(width) {
                    Ok(bits)
                } else {
                    Ok(b.bitcast(field.ty.clone(), bits))
                }
            });
        }

        let replacement = match &result_ty {
            FirType::SInt(_) => self.builder.as_sint(flat)?,
            ty if ty == self.body().value_type(flat) => flat,
            ty => self.builder.bitcast(ty.clone(), flat),
        };
        self.builder.body_mut().replace_all_uses_with(result, replacement);
        Ok(true)
    }

    /// Casts `value` to `UInt<width>` unless it already is one
    fn leaf_as_uint(&mut self, value: ValueId, width: u32) -> ValueId {
        let target = FirType::uint(width);
        if *self.body().value_type(value) == target {
            value
        } else {
            self.builder.bitcast(target, value)
        }
    }
}
