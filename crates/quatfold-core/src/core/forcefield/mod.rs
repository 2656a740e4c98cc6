//! # Force Field Module
//!
//! The molecular-mechanics energy model used to score and relax backbones.
//!
//! - [`params`] - Force-field constants: built-in literature defaults or a TOML table
//! - [`potentials`] - Pure potential functions and their radial/angular derivatives
//! - [`topology`] - Per-structure term lists (bonds, angles, torsions, non-bonded pairs,
//!   restraints) with 1-2/1-3 exclusions and 1-4 scaling
//! - [`energy`] - [`energy::EnergyModel`], capped evaluation and analytic gradients
//! - [`term`] - Raw components and the capped [`term::EnergyBreakdown`]
//!
//! Every total leaving this module is finite and bounded by
//! [`ENERGY_CAP_KCAL_MOL`](crate::core::limits::ENERGY_CAP_KCAL_MOL); the uncapped value
//! stays available in `raw_total` for audit output.

pub mod energy;
pub mod params;
pub mod potentials;
pub mod term;
pub mod topology;
