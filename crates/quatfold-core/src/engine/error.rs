use super::config::ConfigError;
use super::priors::PriorError;
use super::samplers::fragments::FragmentLoadError;
use crate::core::forcefield::energy::EnergyError;
use crate::core::models::builder::BuildError;
use crate::core::models::parsed::ParsedStructureError;
use crate::core::models::residue::SequenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid sequence: {0}")]
    Sequence(#[from] SequenceError),

    #[error("Invalid prior: {0}")]
    Prior(#[from] PriorError),

    #[error("Fragment library error: {0}")]
    FragmentLibrary(#[from] FragmentLoadError),

    #[error("Backbone construction failed: {0}")]
    Build(#[from] BuildError),

    #[error("Energy evaluation failed: {0}")]
    Energy(#[from] EnergyError),

    #[error("Reference structure error: {0}")]
    Reference(#[from] ParsedStructureError),

    #[error("Sampler '{sampler}' failed: {reason}")]
    Sampler { sampler: &'static str, reason: String },

    #[error("No valid candidates after the {phase} phase ({rejected} rejected)")]
    NoCandidates { phase: &'static str, rejected: usize },

    #[error("Prediction was cancelled")]
    Cancelled,

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),
}
