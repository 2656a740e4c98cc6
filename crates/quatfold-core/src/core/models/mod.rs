//! # Core Models Module
//!
//! Data structures for one backbone conformation and its construction.
//!
//! - [`atom`] - Atoms with element, serial number and position
//! - [`residue`] - Residues, named backbone slots and the amino-acid alphabet
//! - [`structure`] - A full conformation: an atom arena plus ordered residues
//! - [`topology`] - Covalent connectivity derived from atom names
//! - [`parsed`] - The format-neutral input/output view of a structure
//! - [`builder`] - Forward-kinematics backbone construction from dihedral angles
//! - [`ids`] - Stable atom identifiers

pub mod atom;
pub mod builder;
pub mod ids;
pub mod parsed;
pub mod residue;
pub mod structure;
pub mod topology;
