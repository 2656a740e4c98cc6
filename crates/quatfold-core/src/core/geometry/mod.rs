//! # Geometry Module
//!
//! Geometric primitives used throughout the library.
//!
//! - [`quaternion`] - Unit-quaternion helpers: renormalization, shortest-arc slerp and
//!   well-distributed point sets on the unit hypersphere
//! - [`ramachandran`] - The bijective (phi, psi) ↔ quaternion encoding and angle utilities
//! - [`spatial`] - Cartesian helpers: internal-coordinate atom placement, bond and dihedral
//!   angles, idealized hydrogen placement and RMSD / superposition

pub mod quaternion;
pub mod ramachandran;
pub mod spatial;
