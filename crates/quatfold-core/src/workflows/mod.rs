//! # Workflows Module
//!
//! High-level entry points that run a complete prediction.
//!
//! ## Overview
//!
//! A workflow owns one run from raw inputs to a ranked result. It validates the
//! configuration, resolves priors, drives the samplers and minimizers through the engine's
//! tasks and assembles the result and its summary.
//!
//! ## Architecture
//!
//! - **Prediction Workflow** ([`predict`]) - The four-phase pipeline
//!   Predict → Sample → Optimize → Select as an explicit state machine.

pub mod predict;
