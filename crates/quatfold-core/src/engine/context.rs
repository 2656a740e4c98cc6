use super::cancel::CancellationToken;
use super::config::PredictionConfig;
use super::priors::Priors;
use super::progress::ProgressReporter;
use super::samplers::SamplingContext;
use crate::core::forcefield::energy::EnergyModel;
use crate::core::geometry::ramachandran::RamachandranAngles;
use crate::core::heuristics::ConformationHeuristic;
use crate::core::models::builder::BackboneBuilder;
use crate::core::models::residue::AminoAcid;

/// Read-only inputs shared by every task of one prediction run.
#[derive(Clone, Copy)]
pub struct PredictionContext<'a> {
    pub sequence: &'a [AminoAcid],
    pub config: &'a PredictionConfig,
    pub priors: &'a Priors,
    pub builder: &'a BackboneBuilder,
    pub energy: &'a EnergyModel,
    pub heuristic: Option<&'a dyn ConformationHeuristic>,
    pub reporter: &'a ProgressReporter<'a>,
    pub cancel: &'a CancellationToken,
}

impl<'a> PredictionContext<'a> {
    pub fn sampling(&self) -> SamplingContext<'a> {
        SamplingContext {
            sequence: self.sequence,
            priors: self.priors,
            builder: self.builder,
            energy: self.energy,
            heuristic: self.heuristic,
            heuristic_weight: self.config.scoring.effective_heuristic_weight(),
            cancel: self.cancel,
        }
    }

    /// Heuristic penalty of `angles`, unweighted; `None` when no plug-in is configured.
    pub fn heuristic_penalty(&self, angles: &[RamachandranAngles]) -> Option<f64> {
        self.heuristic.map(|h| h.penalty(angles))
    }
}
