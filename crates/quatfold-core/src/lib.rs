//! # QuatFold Core Library
//!
//! Backbone structure prediction for single protein chains, treated as a
//! search-and-optimize problem over dihedral-angle space.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Structure`), quaternion and
//!   Ramachandran geometry, the backbone coordinate builder, the structural validator and
//!   the molecular-mechanics energy model.
//!
//! - **[`engine`]: The Logic Core.** Conformational samplers, energy minimizers,
//!   candidate state, configuration, priors and the parallel tasks that drive them.
//!
//! - **[`workflows`]: The Public API.** The four-phase prediction pipeline
//!   (Predict → Sample → Optimize → Select) that ties `engine` and `core` together.

pub mod core;
pub mod engine;
pub mod workflows;
