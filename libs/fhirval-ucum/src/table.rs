use crate::dimension::BaseDimension;
use phf::phf_map;

/// One entry in the curated clinical unit table: its physical dimension, the
/// multiplicative factor that converts a value in this unit to the dimension's base
/// unit (gram, liter, second, mole, equivalent, kelvin, pascal, or plain count), and
/// — for `Cel`, the one affine unit the table carries — the additive offset applied
/// after scaling.
#[derive(Debug, Clone, Copy)]
pub struct AtomicUnit {
    pub dimension: BaseDimension,
    pub factor: f64,
    pub affine_offset: f64,
}

const fn linear(dimension: BaseDimension, factor: f64) -> AtomicUnit {
    AtomicUnit {
        dimension,
        factor,
        affine_offset: 0.0,
    }
}

/// Static table of UCUM atoms a clinical validation engine actually encounters on
/// `Quantity.code`/`Observation.value[x]` elements. This stands in for the full UCUM
/// essence table (`§4.1` describes Core Code Tables as static in-memory tables);
/// expanding coverage is a matter of adding rows, not changing the model.
pub static UNITS: phf::Map<&'static str, AtomicUnit> = phf_map! {
    // mass
    "g" => linear(BaseDimension::Mass, 1.0),
    "mg" => linear(BaseDimension::Mass, 1e-3),
    "ug" => linear(BaseDimension::Mass, 1e-6),
    "ng" => linear(BaseDimension::Mass, 1e-9),
    "kg" => linear(BaseDimension::Mass, 1e3),
    // volume
    "L" => linear(BaseDimension::Volume, 1.0),
    "dL" => linear(BaseDimension::Volume, 1e-1),
    "mL" => linear(BaseDimension::Volume, 1e-3),
    "uL" => linear(BaseDimension::Volume, 1e-6),
    // length
    "m" => linear(BaseDimension::Length, 1.0),
    "cm" => linear(BaseDimension::Length, 1e-2),
    "mm" => linear(BaseDimension::Length, 1e-3),
    "km" => linear(BaseDimension::Length, 1e3),
    // time
    "s" => linear(BaseDimension::Time, 1.0),
    "min" => linear(BaseDimension::Time, 60.0),
    "h" => linear(BaseDimension::Time, 3600.0),
    "d" => linear(BaseDimension::Time, 86400.0),
    "wk" => linear(BaseDimension::Time, 604_800.0),
    // amount of substance
    "mol" => linear(BaseDimension::AmountOfSubstance, 1.0),
    "mmol" => linear(BaseDimension::AmountOfSubstance, 1e-3),
    "umol" => linear(BaseDimension::AmountOfSubstance, 1e-6),
    // equivalents (ionic concentration)
    "eq" => linear(BaseDimension::Equivalents, 1.0),
    "meq" => linear(BaseDimension::Equivalents, 1e-3),
    // temperature
    "K" => linear(BaseDimension::Temperature, 1.0),
    "Cel" => AtomicUnit { dimension: BaseDimension::Temperature, factor: 1.0, affine_offset: 273.15 },
    // pressure
    "Pa" => linear(BaseDimension::Pressure, 1.0),
    "kPa" => linear(BaseDimension::Pressure, 1e3),
    "mm[Hg]" => linear(BaseDimension::Pressure, 133.322_387_415),
    // dimensionless
    "1" => linear(BaseDimension::Dimensionless, 1.0),
    "%" => linear(BaseDimension::Dimensionless, 1e-2),
    "10*3/L" => linear(BaseDimension::Dimensionless, 1e3),
    "10*6/L" => linear(BaseDimension::Dimensionless, 1e6),
    "10*9/L" => linear(BaseDimension::Dimensionless, 1e9),
    "10*12/L" => linear(BaseDimension::Dimensionless, 1e12),
    // arbitrary (enzyme/biologic activity units — not molar-mass convertible)
    "U" => linear(BaseDimension::Arbitrary, 1.0),
    "mU" => linear(BaseDimension::Arbitrary, 1e-3),
    "[IU]" => linear(BaseDimension::Arbitrary, 1.0),
    "m[IU]" => linear(BaseDimension::Arbitrary, 1e-3),
};

pub fn lookup(symbol: &str) -> Option<&'static AtomicUnit> {
    UNITS.get(symbol)
}
