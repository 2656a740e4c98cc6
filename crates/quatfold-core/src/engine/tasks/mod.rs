//! Parallel units of work behind the Sample, Optimize and Select phases.
//!
//! Each task reads the shared [`PredictionContext`](super::context::PredictionContext) and
//! writes only its own output slot, so results do not depend on scheduling.

pub mod optimization;
pub mod sampling;
pub mod selection;

#[cfg(test)]
pub(crate) mod tests {
    use crate::core::forcefield::energy::EnergyModel;
    use crate::core::models::builder::BackboneBuilder;
    use crate::core::models::residue::{AminoAcid, parse_sequence};
    use crate::engine::cancel::CancellationToken;
    use crate::engine::config::PredictionConfig;
    use crate::engine::context::PredictionContext;
    use crate::engine::priors::Priors;
    use crate::engine::progress::ProgressReporter;

    /// Owned inputs from which a [`PredictionContext`] can be borrowed.
    pub(crate) struct Harness {
        pub sequence: Vec<AminoAcid>,
        pub config: PredictionConfig,
        pub priors: Priors,
        pub builder: BackboneBuilder,
        pub energy: EnergyModel,
        pub reporter: ProgressReporter<'static>,
        pub cancel: CancellationToken,
    }

    /// Small sample counts and budgets that keep a full run fast.
    pub(crate) fn quick_config() -> PredictionConfig {
        let mut config = PredictionConfig::default();
        config.sampling.quaternion.samples = 2;
        config.sampling.monte_carlo.samples = 1;
        config.sampling.monte_carlo.steps = 10;
        config.sampling.fragments.samples = 2;
        config.sampling.basins.samples = 2;
        config.minimization.max_iterations = Some(20);
        config
    }

    impl Harness {
        pub fn new(sequence: &str, config: PredictionConfig) -> Self {
            let sequence = parse_sequence(sequence).unwrap();
            let priors = Priors::resolve(&sequence, &config.priors).unwrap();
            let builder = BackboneBuilder::new(config.geometry)
                .with_hydrogens(config.include_hydrogens);
            let energy = EnergyModel::new(
                config.forcefield.clone(),
                config.scoring.cutoffs,
                config.limits,
            )
            .with_restraints(priors.contacts().to_vec());
            Self {
                sequence,
                config,
                priors,
                builder,
                energy,
                reporter: ProgressReporter::new(),
                cancel: CancellationToken::new(),
            }
        }

        pub fn context(&self) -> PredictionContext<'_> {
            PredictionContext {
                sequence: &self.sequence,
                config: &self.config,
                priors: &self.priors,
                builder: &self.builder,
                energy: &self.energy,
                heuristic: None,
                reporter: &self.reporter,
                cancel: &self.cancel,
            }
        }
    }
}
