use crate::quantity::{self, UCUM_SYSTEM};
use crate::Result;

/// A FHIR `Quantity`-shaped element, borrowed from the resource being validated.
#[derive(Debug, Clone, Copy)]
pub struct FhirQuantity<'a> {
    pub value: f64,
    pub system: Option<&'a str>,
    pub code: Option<&'a str>,
}

impl<'a> FhirQuantity<'a> {
    /// The UCUM unit code, if this quantity actually declares the UCUM system —
    /// `Quantity.unit` (the display text) is not a coded value and is ignored here.
    pub fn ucum_code(&self) -> Option<&'a str> {
        match self.system {
            Some(UCUM_SYSTEM) => self.code,
            _ => None,
        }
    }
}

/// Whether two FHIR quantities, both coded against the UCUM system, are comparable.
pub fn comparable(lhs: FhirQuantity<'_>, rhs: FhirQuantity<'_>) -> Result<bool> {
    let (Some(l), Some(r)) = (lhs.ucum_code(), rhs.ucum_code()) else {
        return Ok(false);
    };
    quantity::convertible(l, r)
}

/// Compare two UCUM-coded FHIR quantities, converting `rhs` into `lhs`'s unit.
pub fn compare(lhs: FhirQuantity<'_>, rhs: FhirQuantity<'_>) -> Result<std::cmp::Ordering> {
    let l = lhs.ucum_code().ok_or_else(|| {
        crate::Error::UnknownUnit("left-hand quantity is not UCUM-coded".to_string())
    })?;
    let r = rhs.ucum_code().ok_or_else(|| {
        crate::Error::UnknownUnit("right-hand quantity is not UCUM-coded".to_string())
    })?;
    quantity::compare(lhs.value, l, rhs.value, r)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_non_ucum_system() {
        let q = FhirQuantity {
            value: 1.0,
            system: Some("http://example.org/other"),
            code: Some("mg"),
        };
        assert!(q.ucum_code().is_none());
    }

    #[test]
    fn comparable_quantities_in_different_scales() {
        let lhs = FhirQuantity { value: 1.0, system: Some(UCUM_SYSTEM), code: Some("g") };
        let rhs = FhirQuantity { value: 1000.0, system: Some(UCUM_SYSTEM), code: Some("mg") };
        assert!(comparable(lhs, rhs).unwrap());
        assert_eq!(compare(lhs, rhs).unwrap(), std::cmp::Ordering::Equal);
    }
}
