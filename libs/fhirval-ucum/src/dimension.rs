/// The physical quantity a UCUM atom measures. The curated table only needs enough
/// granularity to tell whether two units are comparable, not a full exponent vector
/// over SI base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseDimension {
    Mass,
    Volume,
    Length,
    Time,
    AmountOfSubstance,
    Equivalents,
    Temperature,
    Pressure,
    Dimensionless,
    /// Arbitrary (non-physical) units such as `[IU]` — comparable only to other
    /// arbitrary units, never convertible via a molar mass or other substance
    /// property this crate doesn't have.
    Arbitrary,
}

/// A resolved unit's dimension, either atomic (e.g. `g`) or a simple ratio (e.g.
/// `mg/dL`). Two ratio expressions are convertible only if their numerator and
/// denominator dimensions match pairwise — no molar-mass-based cross-dimension
/// conversion is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimension {
    pub numerator: BaseDimension,
    pub denominator: Option<BaseDimension>,
}

impl Dimension {
    pub fn atomic(dim: BaseDimension) -> Self {
        Self {
            numerator: dim,
            denominator: None,
        }
    }

    pub fn ratio(numerator: BaseDimension, denominator: BaseDimension) -> Self {
        Self {
            numerator,
            denominator: Some(denominator),
        }
    }
}
