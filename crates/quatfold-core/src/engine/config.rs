use super::minimizer::MinimizerStrategy;
use super::priors::PriorConfig;
use super::state::SamplerKind;
use crate::core::forcefield::energy::Cutoffs;
use crate::core::forcefield::params::ForceField;
use crate::core::forcefield::topology::ContactRestraint;
use crate::core::heuristics::HeuristicKind;
use crate::core::limits::NumericLimits;
use crate::core::models::builder::BackboneGeometry;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub use super::minimizer::MinimizationConfig;

pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
    #[error("No sampler is enabled with a positive sample count")]
    NoSamplersEnabled,
}

fn invalid(parameter: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        parameter,
        reason: reason.into(),
    }
}

fn require_positive(parameter: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(parameter, format!("expected a positive finite number, got {value}")))
    }
}

fn require_fraction(parameter: &'static str, value: f64, allow_zero: bool) -> Result<(), ConfigError> {
    let lower_ok = if allow_zero { value >= 0.0 } else { value > 0.0 };
    if lower_ok && value <= 1.0 {
        Ok(())
    } else {
        Err(invalid(parameter, format!("expected a value in the unit interval, got {value}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuaternionSamplerConfig {
    pub enabled: bool,
    pub samples: usize,
    /// Largest slerp fraction from the reference toward a target point.
    pub max_interpolation: f64,
}

impl Default for QuaternionSamplerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            samples: 8,
            max_interpolation: 0.35,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonteCarloConfig {
    pub enabled: bool,
    /// Number of independent chains; each yields one sample.
    pub samples: usize,
    pub steps: usize,
    /// Standard deviation of the backbone coordinate noise, in Å.
    pub perturbation: f64,
    /// Starting kT, in kcal/mol.
    pub initial_temperature: f64,
    pub cooling_rate: f64,
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            samples: 4,
            steps: 150,
            perturbation: 0.25,
            initial_temperature: 5.0,
            cooling_rate: 0.97,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FragmentConfig {
    pub enabled: bool,
    pub samples: usize,
    /// Standard deviation of the per-angle noise applied to templates, in degrees.
    pub perturbation_degrees: f64,
    /// CSV fragment library replacing the built-in templates.
    pub library_path: Option<PathBuf>,
}

impl Default for FragmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            samples: 4,
            perturbation_degrees: 5.0,
            library_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasinConfig {
    pub enabled: bool,
    pub samples: usize,
    /// Probability of staying in the previous residue's basin.
    pub persistence: f64,
    /// Multiplier on every basin's angular spread.
    pub noise_scale: f64,
}

impl Default for BasinConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            samples: 8,
            persistence: 0.7,
            noise_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplingConfig {
    pub quaternion: QuaternionSamplerConfig,
    pub monte_carlo: MonteCarloConfig,
    pub fragments: FragmentConfig,
    pub basins: BasinConfig,
}

impl SamplingConfig {
    pub fn is_enabled(&self, kind: SamplerKind) -> bool {
        match kind {
            SamplerKind::Quaternion => self.quaternion.enabled,
            SamplerKind::MonteCarlo => self.monte_carlo.enabled,
            SamplerKind::Fragment => self.fragments.enabled,
            SamplerKind::Basin => self.basins.enabled,
        }
    }

    pub fn set_enabled(&mut self, kind: SamplerKind, enabled: bool) {
        match kind {
            SamplerKind::Quaternion => self.quaternion.enabled = enabled,
            SamplerKind::MonteCarlo => self.monte_carlo.enabled = enabled,
            SamplerKind::Fragment => self.fragments.enabled = enabled,
            SamplerKind::Basin => self.basins.enabled = enabled,
        }
    }

    pub fn samples(&self, kind: SamplerKind) -> usize {
        match kind {
            SamplerKind::Quaternion => self.quaternion.samples,
            SamplerKind::MonteCarlo => self.monte_carlo.samples,
            SamplerKind::Fragment => self.fragments.samples,
            SamplerKind::Basin => self.basins.samples,
        }
    }

    pub fn set_samples(&mut self, kind: SamplerKind, samples: usize) {
        match kind {
            SamplerKind::Quaternion => self.quaternion.samples = samples,
            SamplerKind::MonteCarlo => self.monte_carlo.samples = samples,
            SamplerKind::Fragment => self.fragments.samples = samples,
            SamplerKind::Basin => self.basins.samples = samples,
        }
    }

    /// Enabled samplers with a positive sample count, in tie-break order.
    pub fn active(&self) -> Vec<SamplerKind> {
        SamplerKind::ALL
            .into_iter()
            .filter(|&kind| self.is_enabled(kind) && self.samples(kind) > 0)
            .collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.active().is_empty() {
            return Err(ConfigError::NoSamplersEnabled);
        }
        let q = &self.quaternion;
        require_fraction("sampling.quaternion.max-interpolation", q.max_interpolation, false)?;

        let mc = &self.monte_carlo;
        if mc.steps == 0 {
            return Err(invalid("sampling.monte-carlo.steps", "must be at least 1"));
        }
        require_positive("sampling.monte-carlo.perturbation", mc.perturbation)?;
        require_positive("sampling.monte-carlo.initial-temperature", mc.initial_temperature)?;
        require_fraction("sampling.monte-carlo.cooling-rate", mc.cooling_rate, false)?;

        let fragments = &self.fragments;
        if !(fragments.perturbation_degrees.is_finite() && fragments.perturbation_degrees >= 0.0) {
            return Err(invalid(
                "sampling.fragments.perturbation-degrees",
                format!("expected a non-negative number, got {}", fragments.perturbation_degrees),
            ));
        }

        let basins = &self.basins;
        require_fraction("sampling.basins.persistence", basins.persistence, true)?;
        require_positive("sampling.basins.noise-scale", basins.noise_scale)?;
        Ok(())
    }
}

impl MinimizationConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == Some(0) {
            return Err(invalid("minimization.max-iterations", "must be at least 1"));
        }
        require_positive("minimization.tolerance", self.tolerance)?;
        if self.patience == 0 {
            return Err(invalid("minimization.patience", "must be at least 1"));
        }
        require_positive("minimization.gentle.max-step", self.gentle.max_step)?;
        if self.gentle.max_steps == 0 {
            return Err(invalid("minimization.gentle.max-steps", "must be at least 1"));
        }
        if self.lbfgs.memory == 0 {
            return Err(invalid("minimization.lbfgs.memory", "must be at least 1"));
        }
        require_positive("minimization.lbfgs.max-displacement", self.lbfgs.max_displacement)?;
        require_positive(
            "minimization.lbfgs.divergence-threshold",
            self.lbfgs.divergence_threshold,
        )?;
        let annealing = &self.annealing;
        require_positive("minimization.annealing.initial-temperature", annealing.initial_temperature)?;
        require_positive("minimization.annealing.final-temperature", annealing.final_temperature)?;
        require_positive("minimization.annealing.switch-temperature", annealing.switch_temperature)?;
        require_positive("minimization.annealing.perturbation", annealing.perturbation)?;
        if !(annealing.cooling_rate > 0.0 && annealing.cooling_rate < 1.0) {
            return Err(invalid(
                "minimization.annealing.cooling-rate",
                format!("expected a value in (0, 1), got {}", annealing.cooling_rate),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub cutoffs: Cutoffs,
    /// Weight on `1 - quality` in the selection score, in kcal/mol.
    pub quality_penalty: f64,
    /// Optional, non-physical heuristic added to Monte Carlo and selection scores.
    pub heuristic: Option<HeuristicKind>,
    pub heuristic_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            cutoffs: Cutoffs::default(),
            quality_penalty: 100.0,
            heuristic: None,
            heuristic_weight: 10.0,
        }
    }
}

impl ScoringConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        require_positive("scoring.vdw-cutoff", self.cutoffs.vdw)?;
        require_positive("scoring.electrostatic-cutoff", self.cutoffs.electrostatic)?;
        if !(self.quality_penalty.is_finite() && self.quality_penalty >= 0.0) {
            return Err(invalid("scoring.quality-penalty", "must be a non-negative number"));
        }
        if !(self.heuristic_weight.is_finite() && self.heuristic_weight >= 0.0) {
            return Err(invalid("scoring.heuristic-weight", "must be a non-negative number"));
        }
        Ok(())
    }

    /// The heuristic weight in effect; zero when no heuristic is selected.
    pub fn effective_heuristic_weight(&self) -> f64 {
        if self.heuristic.is_some() {
            self.heuristic_weight
        } else {
            0.0
        }
    }
}

/// Everything a prediction run needs besides the sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionConfig {
    pub sampling: SamplingConfig,
    pub minimization: MinimizationConfig,
    pub scoring: ScoringConfig,
    pub priors: PriorConfig,
    pub limits: NumericLimits,
    pub forcefield: Arc<ForceField>,
    pub geometry: BackboneGeometry,
    pub include_hydrogens: bool,
    pub seed: u64,
    /// Worker threads; `None` uses the global rayon pool.
    pub threads: Option<usize>,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig::default(),
            minimization: MinimizationConfig::default(),
            scoring: ScoringConfig::default(),
            priors: PriorConfig {
                chou_fasman: true,
                ..PriorConfig::default()
            },
            limits: NumericLimits::default(),
            forcefield: Arc::new(ForceField::default()),
            geometry: BackboneGeometry::default(),
            include_hydrogens: false,
            seed: DEFAULT_SEED,
            threads: None,
        }
    }
}

impl PredictionConfig {
    pub fn builder() -> PredictionConfigBuilder {
        PredictionConfigBuilder::new()
    }

    /// Continues building from this configuration.
    pub fn into_builder(self) -> PredictionConfigBuilder {
        PredictionConfigBuilder { config: self }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sampling.validate()?;
        self.minimization.validate()?;
        self.scoring.validate()?;
        require_positive("limits.energy-cap", self.limits.energy_cap)?;
        require_positive("limits.severe-clash-distance", self.limits.severe_clash_distance)?;
        if self.threads == Some(0) {
            return Err(invalid("threads", "must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct PredictionConfigBuilder {
    config: PredictionConfig,
}

impl PredictionConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }
    pub fn threads(mut self, threads: usize) -> Self {
        self.config.threads = Some(threads);
        self
    }
    pub fn sampling(mut self, sampling: SamplingConfig) -> Self {
        self.config.sampling = sampling;
        self
    }
    pub fn enable_sampler(mut self, kind: SamplerKind, enabled: bool) -> Self {
        self.config.sampling.set_enabled(kind, enabled);
        self
    }
    pub fn samples(mut self, kind: SamplerKind, samples: usize) -> Self {
        self.config.sampling.set_samples(kind, samples);
        self
    }
    pub fn fragment_library(mut self, path: PathBuf) -> Self {
        self.config.sampling.fragments.library_path = Some(path);
        self
    }
    pub fn minimization(mut self, minimization: MinimizationConfig) -> Self {
        self.config.minimization = minimization;
        self
    }
    pub fn strategy(mut self, strategy: MinimizerStrategy) -> Self {
        self.config.minimization.strategy = Some(strategy);
        self
    }
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.config.minimization.max_iterations = Some(iterations);
        self
    }
    pub fn scoring(mut self, scoring: ScoringConfig) -> Self {
        self.config.scoring = scoring;
        self
    }
    pub fn cutoffs(mut self, cutoffs: Cutoffs) -> Self {
        self.config.scoring.cutoffs = cutoffs;
        self
    }
    pub fn heuristic(mut self, kind: HeuristicKind, weight: f64) -> Self {
        self.config.scoring.heuristic = Some(kind);
        self.config.scoring.heuristic_weight = weight;
        self
    }
    pub fn priors(mut self, priors: PriorConfig) -> Self {
        self.config.priors = priors;
        self
    }
    pub fn chou_fasman(mut self, enabled: bool) -> Self {
        self.config.priors.chou_fasman = enabled;
        self
    }
    pub fn secondary_structure(mut self, states: impl Into<String>) -> Self {
        self.config.priors.secondary_structure = Some(states.into());
        self
    }
    pub fn contacts(mut self, contacts: Vec<ContactRestraint>) -> Self {
        self.config.priors.contacts = contacts;
        self
    }
    pub fn limits(mut self, limits: NumericLimits) -> Self {
        self.config.limits = limits;
        self
    }
    pub fn forcefield(mut self, forcefield: Arc<ForceField>) -> Self {
        self.config.forcefield = forcefield;
        self
    }
    pub fn geometry(mut self, geometry: BackboneGeometry) -> Self {
        self.config.geometry = geometry;
        self
    }
    pub fn include_hydrogens(mut self, include: bool) -> Self {
        self.config.include_hydrogens = include;
        self
    }

    pub fn build(self) -> Result<PredictionConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(PredictionConfig::default().validate(), Ok(()));
        assert_eq!(PredictionConfig::default().sampling.active(), SamplerKind::ALL.to_vec());
    }

    #[test]
    fn builder_applies_overrides() {
        let config = PredictionConfig::builder()
            .seed(7)
            .threads(2)
            .strategy(MinimizerStrategy::Gentle)
            .samples(SamplerKind::Basin, 3)
            .enable_sampler(SamplerKind::MonteCarlo, false)
            .heuristic(HeuristicKind::GoldenRatio, 2.5)
            .build()
            .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.threads, Some(2));
        assert_eq!(config.minimization.strategy, Some(MinimizerStrategy::Gentle));
        assert_eq!(config.sampling.basins.samples, 3);
        assert!(!config.sampling.is_enabled(SamplerKind::MonteCarlo));
        assert_eq!(config.scoring.effective_heuristic_weight(), 2.5);
    }

    #[test]
    fn disabling_every_sampler_is_rejected() {
        let mut builder = PredictionConfig::builder();
        for kind in SamplerKind::ALL {
            builder = builder.enable_sampler(kind, false);
        }
        assert_eq!(builder.build(), Err(ConfigError::NoSamplersEnabled));

        let zero_counts = SamplerKind::ALL
            .into_iter()
            .fold(PredictionConfig::builder(), |b, kind| b.samples(kind, 0));
        assert_eq!(zero_counts.build(), Err(ConfigError::NoSamplersEnabled));
    }

    #[test]
    fn out_of_range_values_name_the_parameter() {
        let err = PredictionConfig::builder().threads(0).build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { parameter: "threads", .. }));

        let err = PredictionConfig::builder().max_iterations(0).build().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { parameter: "minimization.max-iterations", .. }
        ));

        let mut sampling = SamplingConfig::default();
        sampling.basins.persistence = 1.5;
        let err = PredictionConfig::builder().sampling(sampling).build().unwrap_err();
        assert!(err.to_string().contains("sampling.basins.persistence"));
    }

    #[test]
    fn heuristic_weight_is_inert_without_a_heuristic() {
        assert_eq!(ScoringConfig::default().effective_heuristic_weight(), 0.0);
    }
}
