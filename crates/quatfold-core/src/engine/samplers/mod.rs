//! Conformational samplers.
//!
//! Each sampler proposes whole-chain angle sets for one sequence. Samplers read only the
//! shared [`SamplingContext`] and draw from the generator they are handed, so equal seeds
//! reproduce equal output regardless of scheduling.

pub mod basins;
pub mod fragments;
pub mod monte_carlo;
pub mod quaternion;

use super::cancel::CancellationToken;
use super::config::SamplingConfig;
use super::error::EngineError;
use super::priors::Priors;
use super::state::SamplerKind;
use crate::core::forcefield::energy::{EnergyModel, PreparedEnergy};
use crate::core::geometry::ramachandran::RamachandranAngles;
use crate::core::heuristics::ConformationHeuristic;
use crate::core::models::builder::BackboneBuilder;
use crate::core::models::residue::AminoAcid;
use crate::core::models::structure::Structure;
use basins::BasinSampler;
use fragments::{FragmentLibrary, FragmentSampler};
use monte_carlo::MonteCarloSampler;
use quaternion::QuaternionSampler;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

/// Shared, read-only inputs of every sampler.
pub struct SamplingContext<'a> {
    pub sequence: &'a [AminoAcid],
    pub priors: &'a Priors,
    pub builder: &'a BackboneBuilder,
    pub energy: &'a EnergyModel,
    pub heuristic: Option<&'a dyn ConformationHeuristic>,
    pub heuristic_weight: f64,
    pub cancel: &'a CancellationToken,
}

impl<'a> SamplingContext<'a> {
    pub fn heuristic_penalty(&self, angles: &[RamachandranAngles]) -> f64 {
        self.heuristic
            .map(|h| self.heuristic_weight * h.penalty(angles))
            .unwrap_or(0.0)
    }

    /// Builds `angles` and prepares the energy terms of the result.
    pub fn prepare(
        &self,
        angles: &[RamachandranAngles],
    ) -> Result<(Structure, PreparedEnergy), EngineError> {
        let built = self.builder.build(self.sequence, angles)?;
        let prepared = self.energy.prepare(&built.structure)?;
        Ok((built.structure, prepared))
    }

    /// Capped energy of the ideal-geometry build of `angles` plus the heuristic term.
    ///
    /// Every build of one sequence has the same atom layout, so `prepared` may come from
    /// any earlier build.
    pub fn score(
        &self,
        prepared: &PreparedEnergy,
        angles: &[RamachandranAngles],
    ) -> Result<(Structure, f64), EngineError> {
        let built = self.builder.build(self.sequence, angles)?;
        let energy = prepared.breakdown(&built.structure.positions()).total;
        Ok((built.structure, energy + self.heuristic_penalty(angles)))
    }
}

pub trait ConformationSampler: Send + Sync {
    fn kind(&self) -> SamplerKind;

    /// Proposes up to `count` angle sets, one entry per residue each.
    ///
    /// Returns early with fewer sets when the run is cancelled.
    fn sample(
        &self,
        context: &SamplingContext<'_>,
        count: usize,
        rng: &mut ChaCha8Rng,
    ) -> Result<Vec<Vec<RamachandranAngles>>, EngineError>;
}

/// Instantiates the enabled samplers in tie-break order.
pub fn create_samplers(
    config: &SamplingConfig,
    fragment_library: Arc<FragmentLibrary>,
) -> Vec<Box<dyn ConformationSampler>> {
    config
        .active()
        .into_iter()
        .map(|kind| -> Box<dyn ConformationSampler> {
            match kind {
                SamplerKind::Quaternion => Box::new(QuaternionSampler::new(&config.quaternion)),
                SamplerKind::MonteCarlo => Box::new(MonteCarloSampler::new(&config.monte_carlo)),
                SamplerKind::Fragment => Box::new(FragmentSampler::new(
                    fragment_library.clone(),
                    &config.fragments,
                )),
                SamplerKind::Basin => Box::new(BasinSampler::new(&config.basins)),
            }
        })
        .collect()
}
