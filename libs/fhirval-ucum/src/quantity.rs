use crate::dimension::Dimension;
use crate::error::{Error, Result};
use crate::table::{self, AtomicUnit};

pub const UCUM_SYSTEM: &str = "http://unitsofmeasure.org";

/// A unit symbol resolved against the curated table: its dimension plus the linear
/// (and, for `Cel`, affine) transform to its dimension's base representation.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedUnit {
    pub dimension: Dimension,
    factor: f64,
    affine_offset: f64,
}

/// Resolve a unit code, which is either a single atom (`"mg"`) or a simple ratio of
/// two atoms (`"mg/dL"`). Compound expressions beyond one `/` (exponents, `.`
/// multiplication, nested groups) are outside this curated table's scope.
pub fn resolve(unit: &str) -> Result<ResolvedUnit> {
    match unit.split_once('/') {
        Some((num, den)) => {
            let n = atomic(num)?;
            let d = atomic(den)?;
            Ok(ResolvedUnit {
                dimension: Dimension::ratio(n.dimension, d.dimension),
                factor: n.factor / d.factor,
                affine_offset: 0.0,
            })
        }
        None => {
            let u = atomic(unit)?;
            Ok(ResolvedUnit {
                dimension: Dimension::atomic(u.dimension),
                factor: u.factor,
                affine_offset: u.affine_offset,
            })
        }
    }
}

fn atomic(symbol: &str) -> Result<AtomicUnit> {
    table::lookup(symbol)
        .copied()
        .ok_or_else(|| Error::UnknownUnit(symbol.to_string()))
}

/// Whether two unit codes measure the same kind of quantity and could be converted
/// between (per this crate's linear/affine model — see [`resolve`]'s scope note).
pub fn convertible(from: &str, to: &str) -> Result<bool> {
    let f = resolve(from)?;
    let t = resolve(to)?;
    Ok(f.dimension == t.dimension)
}

/// Convert a value expressed in `from` into the equivalent value in `to`.
pub fn convert(value: f64, from: &str, to: &str) -> Result<f64> {
    let f = resolve(from)?;
    let t = resolve(to)?;
    if f.dimension != t.dimension {
        return Err(Error::Incompatible {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    let base = value * f.factor + f.affine_offset;
    Ok((base - t.affine_offset) / t.factor)
}

/// Compare two UCUM-coded quantities for ordering, converting the right-hand side
/// into the left-hand side's unit first.
pub fn compare(lhs_value: f64, lhs_unit: &str, rhs_value: f64, rhs_unit: &str) -> Result<std::cmp::Ordering> {
    let rhs_converted = convert(rhs_value, rhs_unit, lhs_unit)?;
    Ok(lhs_value
        .partial_cmp(&rhs_converted)
        .unwrap_or(std::cmp::Ordering::Equal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_milligrams_to_grams() {
        assert!((convert(500.0, "mg", "g").unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn converts_ratio_units() {
        // 100 mg/dL ~ 1 g/L
        let converted = convert(100.0, "mg/dL", "g/L").unwrap();
        assert!((converted - 1.0).abs() < 1e-9);
    }

    #[test]
    fn celsius_to_kelvin_is_affine() {
        assert!((convert(0.0, "Cel", "K").unwrap() - 273.15).abs() < 1e-9);
    }

    #[test]
    fn mass_and_volume_are_not_convertible() {
        assert!(!convertible("mg", "mL").unwrap());
    }

    #[test]
    fn arbitrary_units_reject_cross_dimension_conversion() {
        assert!(convert(5.0, "U", "mg").is_err());
    }

    #[test]
    fn unknown_unit_errors() {
        assert!(resolve("zz[bogus]").is_err());
    }
}
