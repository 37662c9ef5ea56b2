#![forbid(unsafe_code)]

//! UCUM (Unified Code for Units of Measure) support scoped to what a FHIR
//! validation engine needs: is this unit code known, are two quantities'
//! units comparable, and converting between them. Full UCUM expression algebra
//! (arbitrary exponents, `.` multiplication, bracketed groups) is out of scope —
//! see [`quantity::resolve`] for the exact subset this crate understands.

mod dimension;
mod error;
pub mod fhir;
mod quantity;
mod table;

pub use dimension::{BaseDimension, Dimension};
pub use error::{Error, Result};
pub use quantity::{compare, convert, convertible, resolve, ResolvedUnit, UCUM_SYSTEM};
