//! Calculators for ORCA measurement records.
//!
//! - [`MeasurementManager`]: derived columns (`length`, `copy`, `ratio`,
//!   `parametric_point`) kept up to date as a store observer
//! - [`ReferenceCalculator`]: drawing cues projected from landmark points
//! - [`MeasurementSession`]: configuration, store and calculators wired together
//!
//! Rules are read from `MeasurementConf.json` and `ReferenceConf.json` and
//! checked against the column schema when a calculator is built, so a bad
//! configuration fails early and evaluation never fails on missing data.

mod calculator;
mod config;
mod error;
mod formula;
pub mod geometry;
mod markers;
mod measurement;
mod reference;
mod rule;
mod session;

pub use calculator::Calculator;
pub use config::{Argument, CalculatorItem, Parameter, parse_items};
pub use error::{CalcError, Result};
pub use formula::{MeasurementFunction, ReferenceFunction};
pub use markers::ReferenceMarkers;
pub use measurement::MeasurementManager;
pub use reference::ReferenceCalculator;
pub use session::MeasurementSession;
