//! # Core Module
//!
//! Fundamental building blocks for backbone modeling.
//!
//! - **Geometry** ([`geometry`]) - Quaternions, the Ramachandran↔quaternion mapping and
//!   Cartesian helpers (atom placement, dihedrals, superposition)
//! - **Molecular Representation** ([`models`]) - Atoms, residues, structures and the
//!   backbone coordinate builder
//! - **Validation** ([`validation`]) - Bond-length sanity checks, clash detection and a
//!   force-field independent quality score
//! - **Energy Calculations** ([`forcefield`]) - Force-field parameters, potentials,
//!   bonded topology and the capped energy model
//! - **Heuristics** ([`heuristics`]) - Optional, unvalidated scoring plug-ins
//! - **Limits** ([`limits`]) - Numeric safeguards shared by every component

pub mod forcefield;
pub mod geometry;
pub mod heuristics;
pub mod limits;
pub mod models;
pub mod validation;
