//! # adcalc_core - Anaerobic Digestion and RNG Estimating Engine
//!
//! `adcalc_core` turns a confirmed project intake (feedstocks, project type,
//! output gas spec) into a mass balance, an equipment list, a capital cost
//! estimate and an annual operating cost estimate. All inputs and outputs
//! are JSON-serializable.
//!
//! ## Design Philosophy
//!
//! - **Stateless**: Pure functions that take input and return results
//! - **JSON-First**: All types implement Serialize/Deserialize
//! - **Rich Errors**: Structured error types, not just strings
//! - **Explicit Config**: Design criteria and cost rates are passed in, never global
//!
//! ## Quick Start
//!
//! ```rust
//! use adcalc_core::calculations::{capex, mass_balance, opex};
//! use adcalc_core::config::EngineConfig;
//! use adcalc_core::library::ReferenceLibrary;
//! use adcalc_core::project::{FeedstockEntry, ProjectInputs, ProjectType};
//!
//! let config = EngineConfig::default();
//! let inputs = ProjectInputs::new(ProjectType::Greenfield)
//!     .with_feedstock(FeedstockEntry::new("Food Waste", "150", "tons/day"))
//!     .with_feedstock(FeedstockEntry::new("Dairy Manure", "200", "tons/day"));
//!
//! let mb = mass_balance::calculate(&inputs, ReferenceLibrary::builtin(), &config.design).unwrap();
//! let cx = capex::calculate(&mb, inputs.interconnect_distance_miles, &config.capex).unwrap();
//! let ox = opex::calculate(&mb, &cx, &config.opex).unwrap();
//!
//! assert!(cx.summary.total_project_cost > 0.0);
//! assert!(ox.summary.total_annual_opex > 0.0);
//! ```
//!
//! ## Modules
//!
//! - [`units`] - Quantity parsing, unit conversion and rounding policy
//! - [`library`] - Feedstock, biogas source and output spec profiles
//! - [`project`] - Project intake, scenarios and stored results
//! - [`config`] - Design criteria and cost tables
//! - [`calculations`] - Mass balance, capital cost and operating cost
//! - [`overrides`] - User overrides and locks across recomputation
//! - [`errors`] - Structured error types

pub mod calculations;
pub mod config;
pub mod errors;
pub mod library;
pub mod overrides;
pub mod project;
pub mod units;

// Re-export commonly used types at crate root for convenience
pub use config::EngineConfig;
pub use errors::{CalcError, CalcResult, CalcWarning, Severity};
pub use library::ReferenceLibrary;
pub use overrides::{OverrideSet, RecomputableResult};
pub use project::{Project, ProjectInputs, ProjectType, Scenario};
