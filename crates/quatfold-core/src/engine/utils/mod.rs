//! Helpers shared by the samplers and minimizers.

pub mod sampling;
