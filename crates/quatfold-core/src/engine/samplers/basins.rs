use super::{ConformationSampler, SamplingContext};
use crate::core::geometry::ramachandran::{RamachandranAngles, mark_termini, wrap_angle};
use crate::core::models::residue::AminoAcid;
use crate::engine::config::BasinConfig;
use crate::engine::error::EngineError;
use crate::engine::priors::SecondaryStructure;
use crate::engine::state::SamplerKind;
use crate::engine::utils::sampling::weighted_choice;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use tracing::instrument;

/// A populated region of the Ramachandran plot. Angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RamachandranBasin {
    pub name: &'static str,
    pub phi: f64,
    pub psi: f64,
    pub phi_sigma: f64,
    pub psi_sigma: f64,
    /// Relative population frequency.
    pub population: f64,
}

pub const ALPHA_HELIX: usize = 0;
pub const BETA_SHEET: usize = 1;
pub const LEFT_HANDED_HELIX: usize = 2;
pub const POLYPROLINE_II: usize = 3;
pub const BRIDGE: usize = 4;
pub const TURN_I: usize = 5;
pub const TURN_II: usize = 6;

pub const BASINS: [RamachandranBasin; 7] = [
    RamachandranBasin { name: "alpha-helix", phi: -63.0, psi: -43.0, phi_sigma: 10.0, psi_sigma: 10.0, population: 0.35 },
    RamachandranBasin { name: "beta-sheet", phi: -120.0, psi: 130.0, phi_sigma: 15.0, psi_sigma: 15.0, population: 0.25 },
    RamachandranBasin { name: "left-handed-helix", phi: 57.0, psi: 47.0, phi_sigma: 10.0, psi_sigma: 10.0, population: 0.05 },
    RamachandranBasin { name: "polyproline-ii", phi: -75.0, psi: 145.0, phi_sigma: 10.0, psi_sigma: 12.0, population: 0.15 },
    RamachandranBasin { name: "bridge", phi: -90.0, psi: 0.0, phi_sigma: 15.0, psi_sigma: 15.0, population: 0.08 },
    RamachandranBasin { name: "turn-i", phi: -60.0, psi: -30.0, phi_sigma: 12.0, psi_sigma: 12.0, population: 0.06 },
    RamachandranBasin { name: "turn-ii", phi: 80.0, psi: 0.0, phi_sigma: 15.0, psi_sigma: 15.0, population: 0.06 },
];

const GLYCINE_LEFT_HANDED_BOOST: f64 = 4.0;
const GLYCINE_TURN_II_BOOST: f64 = 3.0;
const GLYCINE_SPREAD: f64 = 1.5;
const PROLINE_PHI: f64 = -65.0;
const PROLINE_PHI_SIGMA: f64 = 5.0;

/// Population weights of every basin for one residue.
fn residue_weights(amino_acid: AminoAcid, state: Option<SecondaryStructure>, constrain: bool) -> [f64; 7] {
    let mut weights = BASINS.map(|b| b.population);

    if amino_acid.is_glycine() {
        weights[LEFT_HANDED_HELIX] *= GLYCINE_LEFT_HANDED_BOOST;
        weights[TURN_II] *= GLYCINE_TURN_II_BOOST;
    } else if amino_acid.is_proline() {
        for (i, w) in weights.iter_mut().enumerate() {
            if !matches!(i, ALPHA_HELIX | POLYPROLINE_II | TURN_I) {
                *w = 0.0;
            }
        }
    }

    if constrain {
        let allowed: &[usize] = match state {
            Some(SecondaryStructure::Helix) => &[ALPHA_HELIX],
            Some(SecondaryStructure::Strand) => &[BETA_SHEET, POLYPROLINE_II],
            _ => &[],
        };
        if !allowed.is_empty() && allowed.iter().any(|&i| weights[i] > 0.0) {
            for (i, w) in weights.iter_mut().enumerate() {
                if !allowed.contains(&i) {
                    *w = 0.0;
                }
            }
        }
    }
    weights
}

/// Draws each residue from a named Ramachandran basin.
///
/// A residue stays in the previous residue's basin with probability `persistence` when
/// that basin is allowed for it, which yields contiguous secondary-structure segments.
/// Otherwise it draws a basin by population weight. Glycine favours the left-handed
/// regions and spreads wider; proline is restricted to basins near phi = -65° and its phi
/// is pinned there.
#[derive(Debug, Clone)]
pub struct BasinSampler {
    persistence: f64,
    noise_scale: f64,
}

impl BasinSampler {
    pub fn new(config: &BasinConfig) -> Self {
        Self {
            persistence: config.persistence,
            noise_scale: config.noise_scale,
        }
    }

    fn gaussian(rng: &mut ChaCha8Rng, mean: f64, sigma: f64) -> f64 {
        let noise: f64 = rng.sample(StandardNormal);
        wrap_angle((mean + sigma * noise).to_radians())
    }

    fn sample_chain(
        &self,
        context: &SamplingContext<'_>,
        rng: &mut ChaCha8Rng,
    ) -> Result<Vec<RamachandranAngles>, EngineError> {
        let constrain = context.priors.constrain_basins();
        let mut previous: Option<usize> = None;
        let mut angles = Vec::with_capacity(context.sequence.len());

        for (i, &amino_acid) in context.sequence.iter().enumerate() {
            let weights = residue_weights(amino_acid, context.priors.state_at(i), constrain);
            let stay = previous.filter(|&b| weights[b] > 0.0 && rng.r#gen::<f64>() < self.persistence);
            let basin_index = match stay {
                Some(b) => b,
                None => weighted_choice(&weights, rng).map_err(|e| EngineError::Sampler {
                    sampler: SamplerKind::Basin.name(),
                    reason: e.to_string(),
                })?,
            };
            let basin = &BASINS[basin_index];

            let spread = if amino_acid.is_glycine() {
                self.noise_scale * GLYCINE_SPREAD
            } else {
                self.noise_scale
            };
            let phi = if amino_acid.is_proline() {
                Self::gaussian(rng, PROLINE_PHI, PROLINE_PHI_SIGMA * self.noise_scale)
            } else {
                Self::gaussian(rng, basin.phi, basin.phi_sigma * spread)
            };
            let psi = Self::gaussian(rng, basin.psi, basin.psi_sigma * spread);

            angles.push(RamachandranAngles::new(phi, psi));
            previous = Some(basin_index);
        }

        mark_termini(&mut angles);
        Ok(angles)
    }
}

impl ConformationSampler for BasinSampler {
    fn kind(&self) -> SamplerKind {
        SamplerKind::Basin
    }

    #[instrument(level = "debug", skip_all, fields(count))]
    fn sample(
        &self,
        context: &SamplingContext<'_>,
        count: usize,
        rng: &mut ChaCha8Rng,
    ) -> Result<Vec<Vec<RamachandranAngles>>, EngineError> {
        let mut sets = Vec::with_capacity(count);
        for _ in 0..count {
            if context.cancel.is_cancelled() {
                break;
            }
            sets.push(self.sample_chain(context, rng)?);
        }
        Ok(sets)
    }
}
