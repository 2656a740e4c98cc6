//! # Engine Module
//!
//! Stateful search and optimization over backbone dihedral space.
//!
//! ## Overview
//!
//! The engine turns a sequence into a scored pool of candidate structures. It owns the
//! run configuration, the priors that bias sampling, the four conformational samplers, the
//! energy minimizers and the parallel tasks that apply them to every candidate. All
//! randomness flows through explicit generators derived from one base seed.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Sampler toggles, minimizer strategy, scoring weights and limits
//! - **Priors** ([`priors`]) - Secondary-structure and contact priors, including Chou–Fasman
//! - **Samplers** ([`samplers`]) - Quaternion, Monte Carlo, fragment and basin samplers
//! - **Minimizers** ([`minimizer`]) - Gentle relaxation, L-BFGS, simulated annealing and hybrid
//! - **Run Context** ([`context`]) - Borrowed inputs shared by every task of a run
//! - **State Tracking** ([`state`]) - Ensembles of sampled angle sets and scored candidates
//! - **Progress Monitoring** ([`progress`]) - Callback-based progress reporting
//! - **Cancellation** ([`cancel`]) - Cooperative stop of further dispatch
//! - **Randomness** ([`rng`]) - Per-sampler and per-candidate RNG stream derivation
//! - **Error Handling** ([`error`]) - Engine-level error type

pub mod cancel;
pub mod config;
pub mod context;
pub mod error;
pub mod minimizer;
pub mod priors;
pub mod progress;
pub mod rng;
pub mod samplers;
pub mod state;
pub(crate) mod tasks;
pub(crate) mod utils;
