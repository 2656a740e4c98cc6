use rand::{distributions::WeightedIndex, prelude::*};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SamplingError {
    #[error("Failed to create weighted distribution: {source}")]
    DistributionError {
        #[from]
        source: rand::distributions::WeightedError,
    },
}

/// Metropolis criterion: accepts with probability `min(1, exp(-ΔE / kT))`.
///
/// Downhill moves are always accepted; at non-positive kT only they are.
#[inline]
pub fn metropolis_accept(delta_energy: f64, kt: f64, rng: &mut impl Rng) -> bool {
    if delta_energy <= 0.0 {
        return true;
    }
    if kt <= 0.0 || !delta_energy.is_finite() {
        return false;
    }
    rng.r#gen::<f64>() < (-delta_energy / kt).exp()
}

/// Picks an index with probability proportional to `weights`.
#[inline]
pub fn weighted_choice(weights: &[f64], rng: &mut impl Rng) -> Result<usize, SamplingError> {
    let dist = WeightedIndex::new(weights)?;
    Ok(dist.sample(rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn downhill_moves_are_always_accepted() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!((0..100).all(|_| metropolis_accept(-1.0, 0.5, &mut rng)));
        assert!(metropolis_accept(0.0, 0.0, &mut rng));
    }

    #[test]
    fn uphill_moves_are_rejected_at_zero_temperature() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(!metropolis_accept(1e-9, 0.0, &mut rng));
        assert!(!metropolis_accept(f64::INFINITY, 5.0, &mut rng));
        assert!(!metropolis_accept(f64::NAN, 5.0, &mut rng));
    }

    #[test]
    fn acceptance_rate_follows_the_boltzmann_factor() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let trials = 20_000;
        let accepted = (0..trials)
            .filter(|_| metropolis_accept(1.0, 1.0, &mut rng))
            .count();
        let rate = accepted as f64 / trials as f64;
        assert!((rate - (-1.0f64).exp()).abs() < 0.02, "rate = {rate}");
    }

    #[test]
    fn weighted_choice_skips_zero_weights() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!((0..200).all(|_| weighted_choice(&[0.0, 1.0, 0.0], &mut rng).unwrap() == 1));
        assert!(weighted_choice(&[0.0, 0.0], &mut rng).is_err());
    }
}
