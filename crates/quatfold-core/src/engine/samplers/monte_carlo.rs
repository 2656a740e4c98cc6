use super::{ConformationSampler, SamplingContext};
use crate::core::geometry::ramachandran::RamachandranAngles;
use crate::engine::config::MonteCarloConfig;
use crate::engine::error::EngineError;
use crate::engine::state::SamplerKind;
use crate::engine::utils::sampling::metropolis_accept;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use tracing::{debug, instrument};

/// Metropolis sampling in coordinate space with a cooling temperature.
///
/// Each move adds Gaussian noise to every backbone atom, measures the dihedrals of the
/// distorted chain and rebuilds it with ideal geometry. The move is scored by energy plus
/// the optional heuristic, and accepted or rejected by the Metropolis criterion. Each chain
/// contributes its best-scoring angle set.
#[derive(Debug, Clone)]
pub struct MonteCarloSampler {
    steps: usize,
    perturbation: f64,
    initial_temperature: f64,
    cooling_rate: f64,
}

impl MonteCarloSampler {
    pub fn new(config: &MonteCarloConfig) -> Self {
        Self {
            steps: config.steps,
            perturbation: config.perturbation,
            initial_temperature: config.initial_temperature,
            cooling_rate: config.cooling_rate,
        }
    }

    fn run_chain(
        &self,
        context: &SamplingContext<'_>,
        start: &[RamachandranAngles],
        rng: &mut ChaCha8Rng,
    ) -> Result<Vec<RamachandranAngles>, EngineError> {
        let (structure, prepared) = context.prepare(start)?;
        let mut current_structure = structure;
        let mut current_angles = start.to_vec();
        let mut current_score = prepared.breakdown(&current_structure.positions()).total
            + context.heuristic_penalty(&current_angles);
        let mut best_angles = current_angles.clone();
        let mut best_score = current_score;
        let mut temperature = self.initial_temperature;
        let mut accepted = 0usize;

        for _ in 0..self.steps {
            if context.cancel.is_cancelled() {
                break;
            }

            let mut positions = current_structure.positions();
            for p in positions.iter_mut() {
                for k in 0..3 {
                    let noise: f64 = rng.sample(StandardNormal);
                    p[k] += self.perturbation * noise;
                }
            }
            let mut distorted = current_structure.clone();
            distorted
                .set_positions(&positions)
                .map_err(|e| EngineError::Sampler {
                    sampler: SamplerKind::MonteCarlo.name(),
                    reason: e.to_string(),
                })?;

            let mut proposal = distorted.backbone_angles();
            for (angles, current) in proposal.iter_mut().zip(&current_angles) {
                angles.omega = current.omega;
            }

            let (rebuilt, score) = context.score(&prepared, &proposal)?;
            if metropolis_accept(score - current_score, temperature, rng) {
                current_structure = rebuilt;
                current_angles = proposal;
                current_score = score;
                accepted += 1;
                if current_score < best_score {
                    best_score = current_score;
                    best_angles = current_angles.clone();
                }
            }
            temperature *= self.cooling_rate;
        }

        debug!(accepted, steps = self.steps, best_score, "Monte Carlo chain finished.");
        Ok(best_angles)
    }
}

impl ConformationSampler for MonteCarloSampler {
    fn kind(&self) -> SamplerKind {
        SamplerKind::MonteCarlo
    }

    #[instrument(level = "debug", skip_all, fields(count))]
    fn sample(
        &self,
        context: &SamplingContext<'_>,
        count: usize,
        rng: &mut ChaCha8Rng,
    ) -> Result<Vec<Vec<RamachandranAngles>>, EngineError> {
        if context.sequence.is_empty() {
            return Ok(Vec::new());
        }
        let start = context.priors.reference_angles(context.sequence.len());
        let mut sets = Vec::with_capacity(count);
        for _ in 0..count {
            if context.cancel.is_cancelled() {
                break;
            }
            sets.push(self.run_chain(context, &start, rng)?);
        }
        Ok(sets)
    }
}
