use super::{ConformationSampler, SamplingContext};
use crate::core::geometry::quaternion::{slerp, super_fibonacci_points};
use crate::core::geometry::ramachandran::{RamachandranAngles, decode_angles, encode_angles};
use crate::engine::config::QuaternionSamplerConfig;
use crate::engine::error::EngineError;
use crate::engine::state::SamplerKind;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::instrument;

const EXTENDED_PHI: f64 = -120.0;
const EXTENDED_PSI: f64 = 120.0;

/// Interpolates each residue's reference quaternion toward well-spread points on S³.
///
/// The target points come from one super-Fibonacci spiral of `count × length` points,
/// walked from a random offset, so no two residues of a run share a target and the set
/// covers the hypersphere without clustering.
#[derive(Debug, Clone)]
pub struct QuaternionSampler {
    max_interpolation: f64,
}

impl QuaternionSampler {
    pub fn new(config: &QuaternionSamplerConfig) -> Self {
        Self {
            max_interpolation: config.max_interpolation,
        }
    }
}

/// The prior's reference angles with the undefined terminal angles filled in, so every
/// residue encodes to a point on the torus rather than the identity sentinel.
fn defined_reference(context: &SamplingContext<'_>) -> Vec<RamachandranAngles> {
    context
        .priors
        .reference_angles(context.sequence.len())
        .into_iter()
        .map(|mut a| {
            if a.phi.is_nan() {
                a.phi = EXTENDED_PHI.to_radians();
            }
            if a.psi.is_nan() {
                a.psi = EXTENDED_PSI.to_radians();
            }
            a
        })
        .collect()
}

impl ConformationSampler for QuaternionSampler {
    fn kind(&self) -> SamplerKind {
        SamplerKind::Quaternion
    }

    #[instrument(level = "debug", skip_all, fields(count))]
    fn sample(
        &self,
        context: &SamplingContext<'_>,
        count: usize,
        rng: &mut ChaCha8Rng,
    ) -> Result<Vec<Vec<RamachandranAngles>>, EngineError> {
        let length = context.sequence.len();
        if length == 0 || count == 0 {
            return Ok(Vec::new());
        }

        let references = encode_angles(&defined_reference(context));
        let targets = super_fibonacci_points(count * length);
        let offset = rng.gen_range(0..targets.len());

        let mut sets = Vec::with_capacity(count);
        for s in 0..count {
            if context.cancel.is_cancelled() {
                break;
            }
            let quaternions: Vec<_> = references
                .iter()
                .enumerate()
                .map(|(i, reference)| {
                    let target = &targets[(offset + s * length + i) % targets.len()];
                    let t = rng.r#gen::<f64>() * self.max_interpolation;
                    slerp(reference, target, t)
                })
                .collect();
            sets.push(decode_angles(&quaternions));
        }
        Ok(sets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::ramachandran::angular_difference;
    use crate::engine::rng::stream_rng;
    use crate::engine::samplers::tests::{Fixture, bits};

    fn sampler(max_interpolation: f64) -> QuaternionSampler {
        QuaternionSampler::new(&QuaternionSamplerConfig {
            max_interpolation,
            ..QuaternionSamplerConfig::default()
        })
    }

    #[test]
    fn equal_seeds_give_identical_sets() {
        let fixture = Fixture::new("ACDEFGHIK");
        let context = fixture.context();
        let a = sampler(0.35).sample(&context, 4, &mut stream_rng(3, 0, 0)).unwrap();
        let b = sampler(0.35).sample(&context, 4, &mut stream_rng(3, 0, 0)).unwrap();
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn small_interpolation_stays_near_the_reference() {
        let fixture = Fixture::new("AAAAAA");
        let context = fixture.context();
        let sets = sampler(1e-3).sample(&context, 3, &mut stream_rng(0, 0, 0)).unwrap();
        for set in &sets {
            for angles in &set[1..5] {
                assert!(angular_difference(angles.phi, EXTENDED_PHI.to_radians()) < 0.05);
                assert!(angular_difference(angles.psi, EXTENDED_PSI.to_radians()) < 0.05);
            }
        }
    }

    #[test]
    fn samples_are_diverse() {
        let fixture = Fixture::new("AAAAAAAA");
        let context = fixture.context();
        let sets = sampler(0.5).sample(&context, 6, &mut stream_rng(8, 0, 0)).unwrap();
        for pair in sets.windows(2) {
            assert_ne!(bits(&[pair[0].clone()]), bits(&[pair[1].clone()]));
        }
    }
}
