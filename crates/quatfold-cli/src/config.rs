use crate::cli::PredictArgs;
use crate::error::{CliError, Result};
use quatfold::core::forcefield::params::ForceField;
use quatfold::core::forcefield::topology::ContactRestraint;
use quatfold::core::heuristics::HeuristicKind;
use quatfold::core::limits::NumericLimits;
use quatfold::core::models::builder::BackboneGeometry;
use quatfold::engine::config as core_config;
use quatfold::engine::minimizer::MinimizerStrategy;
use quatfold::engine::state::SamplerKind;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialQuaternionConfig {
    enabled: Option<bool>,
    samples: Option<usize>,
    max_interpolation: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialMonteCarloConfig {
    enabled: Option<bool>,
    samples: Option<usize>,
    steps: Option<usize>,
    perturbation: Option<f64>,
    initial_temperature: Option<f64>,
    cooling_rate: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialFragmentConfig {
    enabled: Option<bool>,
    samples: Option<usize>,
    perturbation_degrees: Option<f64>,
    library: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialBasinConfig {
    enabled: Option<bool>,
    samples: Option<usize>,
    persistence: Option<f64>,
    noise_scale: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialSamplingConfig {
    quaternion: Option<PartialQuaternionConfig>,
    monte_carlo: Option<PartialMonteCarloConfig>,
    fragments: Option<PartialFragmentConfig>,
    basins: Option<PartialBasinConfig>,
}

impl PartialSamplingConfig {
    fn toggles(&mut self, kind: SamplerKind) -> (&mut Option<bool>, &mut Option<usize>) {
        match kind {
            SamplerKind::Quaternion => {
                let c = self.quaternion.get_or_insert_with(Default::default);
                (&mut c.enabled, &mut c.samples)
            }
            SamplerKind::MonteCarlo => {
                let c = self.monte_carlo.get_or_insert_with(Default::default);
                (&mut c.enabled, &mut c.samples)
            }
            SamplerKind::Fragment => {
                let c = self.fragments.get_or_insert_with(Default::default);
                (&mut c.enabled, &mut c.samples)
            }
            SamplerKind::Basin => {
                let c = self.basins.get_or_insert_with(Default::default);
                (&mut c.enabled, &mut c.samples)
            }
        }
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialMinimizationConfig {
    strategy: Option<MinimizerStrategy>,
    max_iterations: Option<usize>,
    tolerance: Option<f64>,
    patience: Option<usize>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialScoringConfig {
    vdw_cutoff: Option<f64>,
    electrostatic_cutoff: Option<f64>,
    quality_penalty: Option<f64>,
    heuristic: Option<HeuristicKind>,
    heuristic_weight: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialPriorConfig {
    chou_fasman: Option<bool>,
    constrain_basins: Option<bool>,
    secondary_structure: Option<String>,
    contacts: Option<Vec<ContactRestraint>>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialPredictionConfig {
    seed: Option<u64>,
    threads: Option<usize>,
    include_hydrogens: Option<bool>,
    forcefield: Option<PathBuf>,
    sampling: Option<PartialSamplingConfig>,
    minimization: Option<PartialMinimizationConfig>,
    scoring: Option<PartialScoringConfig>,
    priors: Option<PartialPriorConfig>,
    limits: Option<NumericLimits>,
    geometry: Option<BackboneGeometry>,
}

fn apply<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        CliError::Config(format!("Invalid value for {}: {}", key, value))
    })
}

/// Parses a kebab-case enum name the same way the config file does.
fn parse_named<T: DeserializeOwned>(key: &str, value: &str) -> Result<T> {
    toml::Value::String(value.to_string())
        .try_into()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

impl PartialPredictionConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Reads `path` when given; otherwise starts from built-in defaults.
    pub fn from_optional_file(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Applies `--set` values and converts to a validated core configuration.
    pub fn resolve(mut self, set_values: &[String]) -> Result<core_config::PredictionConfig> {
        self.apply_set_values(set_values)?;
        let config = self.into_core()?;
        config
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))?;
        Ok(config)
    }

    pub fn merge_with_cli(self, args: &PredictArgs) -> Result<core_config::PredictionConfig> {
        let file_config = self.resolve(&args.set_values)?;
        let mut builder = file_config.into_builder();

        if let Some(seed) = args.seed {
            builder = builder.seed(seed);
        }
        if let Some(strategy) = args.strategy {
            builder = builder.strategy(strategy);
        }
        if let Some(iterations) = args.max_iterations {
            builder = builder.max_iterations(iterations);
        }
        if let Some(samples) = args.samples {
            for kind in SamplerKind::ALL {
                builder = builder.samples(kind, samples);
            }
        }
        for &kind in &args.disable {
            builder = builder.enable_sampler(kind, false);
        }
        if let Some(states) = &args.secondary_structure {
            builder = builder.secondary_structure(states.clone());
        }
        if args.no_chou_fasman {
            builder = builder.chou_fasman(false);
        }

        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn into_core(self) -> Result<core_config::PredictionConfig> {
        let mut config = core_config::PredictionConfig::default();
        apply(&mut config.seed, self.seed);
        config.threads = self.threads.or(config.threads);
        apply(&mut config.include_hydrogens, self.include_hydrogens);
        apply(&mut config.limits, self.limits);
        apply(&mut config.geometry, self.geometry);

        if let Some(path) = self.forcefield {
            let forcefield = ForceField::load(&path).map_err(|e| CliError::FileParsing {
                path: path.clone(),
                source: e.into(),
            })?;
            config.forcefield = Arc::new(forcefield);
        }

        let sampling = self.sampling.unwrap_or_default();
        if let Some(p) = sampling.quaternion {
            let c = &mut config.sampling.quaternion;
            apply(&mut c.enabled, p.enabled);
            apply(&mut c.samples, p.samples);
            apply(&mut c.max_interpolation, p.max_interpolation);
        }
        if let Some(p) = sampling.monte_carlo {
            let c = &mut config.sampling.monte_carlo;
            apply(&mut c.enabled, p.enabled);
            apply(&mut c.samples, p.samples);
            apply(&mut c.steps, p.steps);
            apply(&mut c.perturbation, p.perturbation);
            apply(&mut c.initial_temperature, p.initial_temperature);
            apply(&mut c.cooling_rate, p.cooling_rate);
        }
        if let Some(p) = sampling.fragments {
            let c = &mut config.sampling.fragments;
            apply(&mut c.enabled, p.enabled);
            apply(&mut c.samples, p.samples);
            apply(&mut c.perturbation_degrees, p.perturbation_degrees);
            c.library_path = p.library.or(c.library_path.take());
        }
        if let Some(p) = sampling.basins {
            let c = &mut config.sampling.basins;
            apply(&mut c.enabled, p.enabled);
            apply(&mut c.samples, p.samples);
            apply(&mut c.persistence, p.persistence);
            apply(&mut c.noise_scale, p.noise_scale);
        }

        if let Some(p) = self.minimization {
            let c = &mut config.minimization;
            c.strategy = p.strategy.or(c.strategy);
            c.max_iterations = p.max_iterations.or(c.max_iterations);
            apply(&mut c.tolerance, p.tolerance);
            apply(&mut c.patience, p.patience);
        }

        if let Some(p) = self.scoring {
            let c = &mut config.scoring;
            apply(&mut c.cutoffs.vdw, p.vdw_cutoff);
            apply(&mut c.cutoffs.electrostatic, p.electrostatic_cutoff);
            apply(&mut c.quality_penalty, p.quality_penalty);
            c.heuristic = p.heuristic.or(c.heuristic);
            apply(&mut c.heuristic_weight, p.heuristic_weight);
        }

        if let Some(p) = self.priors {
            let c = &mut config.priors;
            apply(&mut c.chou_fasman, p.chou_fasman);
            apply(&mut c.constrain_basins, p.constrain_basins);
            c.secondary_structure = p.secondary_structure.or(c.secondary_structure.take());
            apply(&mut c.contacts, p.contacts);
        }

        Ok(config)
    }

    fn sampling(&mut self) -> &mut PartialSamplingConfig {
        self.sampling.get_or_insert_with(Default::default)
    }

    fn minimization(&mut self) -> &mut PartialMinimizationConfig {
        self.minimization.get_or_insert_with(Default::default)
    }

    fn scoring(&mut self) -> &mut PartialScoringConfig {
        self.scoring.get_or_insert_with(Default::default)
    }

    fn priors(&mut self) -> &mut PartialPriorConfig {
        self.priors.get_or_insert_with(Default::default)
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let (key, value) = kv_pair.split_once('=').ok_or_else(|| {
                CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                ))
            })?;
            let (key, value) = (key.trim(), value.trim());

            match key {
                "seed" => self.seed = Some(parse_value(key, value)?),
                "threads" => self.threads = Some(parse_value(key, value)?),
                "include-hydrogens" => self.include_hydrogens = Some(parse_value(key, value)?),
                "forcefield" => self.forcefield = Some(PathBuf::from(value)),
                "minimization.strategy" => {
                    self.minimization().strategy = Some(parse_value(key, value)?)
                }
                "minimization.max-iterations" => {
                    self.minimization().max_iterations = Some(parse_value(key, value)?)
                }
                "minimization.tolerance" => {
                    self.minimization().tolerance = Some(parse_value(key, value)?)
                }
                "minimization.patience" => {
                    self.minimization().patience = Some(parse_value(key, value)?)
                }
                "scoring.quality-penalty" => {
                    self.scoring().quality_penalty = Some(parse_value(key, value)?)
                }
                "scoring.heuristic" => self.scoring().heuristic = Some(parse_named(key, value)?),
                "scoring.heuristic-weight" => {
                    self.scoring().heuristic_weight = Some(parse_value(key, value)?)
                }
                "priors.chou-fasman" => self.priors().chou_fasman = Some(parse_value(key, value)?),
                "priors.constrain-basins" => {
                    self.priors().constrain_basins = Some(parse_value(key, value)?)
                }
                "priors.secondary-structure" => {
                    self.priors().secondary_structure = Some(value.to_string())
                }
                "sampling.monte-carlo.steps" => {
                    self.sampling()
                        .monte_carlo
                        .get_or_insert_with(Default::default)
                        .steps = Some(parse_value(key, value)?)
                }
                "sampling.basins.persistence" => {
                    self.sampling()
                        .basins
                        .get_or_insert_with(Default::default)
                        .persistence = Some(parse_value(key, value)?)
                }
                "sampling.fragments.library" => {
                    self.sampling()
                        .fragments
                        .get_or_insert_with(Default::default)
                        .library = Some(PathBuf::from(value))
                }
                _ => self.apply_sampler_toggle(key, value)?,
            }
        }
        Ok(())
    }

    /// Handles `sampling.<sampler>.enabled` and `sampling.<sampler>.samples`.
    fn apply_sampler_toggle(&mut self, key: &str, value: &str) -> Result<()> {
        let unsupported = || {
            CliError::Config(format!(
                "Unsupported configuration key for --set: '{}'",
                key
            ))
        };
        let (sampler, field) = key
            .strip_prefix("sampling.")
            .and_then(|rest| rest.split_once('.'))
            .ok_or_else(unsupported)?;
        let kind: SamplerKind = sampler.parse().map_err(|_| unsupported())?;
        let (enabled, samples) = self.sampling().toggles(kind);
        match field {
            "enabled" => *enabled = Some(parse_value(key, value)?),
            "samples" => *samples = Some(parse_value(key, value)?),
            _ => return Err(unsupported()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn write_config_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let file_path = dir.path().join(name);
        fs::write(&file_path, content).unwrap();
        file_path
    }

    fn predict_args(extra: &[&str]) -> PredictArgs {
        let mut args = vec!["quatfold", "predict", "GACDE"];
        args.extend_from_slice(extra);
        match Cli::parse_from(args).command {
            Commands::Predict(args) => args,
            _ => panic!("Expected 'predict' subcommand"),
        }
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempdir().unwrap();
        let path = write_config_file(
            &dir,
            "config.toml",
            r#"
            seed = 7
            threads = 2

            [sampling.basins]
            samples = 12
            persistence = 0.9

            [sampling.monte-carlo]
            enabled = false

            [minimization]
            strategy = "lbfgs"
            max-iterations = 300

            [scoring]
            vdw-cutoff = 9.5
            heuristic = "golden-ratio"

            [priors]
            secondary-structure = "CHHHC"
            contacts = [{ residue-a = 0, residue-b = 4, upper-bound = 6.0 }]
            "#,
        );

        let config = PartialPredictionConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&predict_args(&[]))
            .unwrap();

        assert_eq!(config.seed, 7);
        assert_eq!(config.threads, Some(2));
        assert_eq!(config.sampling.basins.samples, 12);
        assert_eq!(config.sampling.basins.persistence, 0.9);
        assert!(!config.sampling.monte_carlo.enabled);
        assert!(config.sampling.quaternion.enabled);
        assert_eq!(config.minimization.strategy, Some(MinimizerStrategy::Lbfgs));
        assert_eq!(config.minimization.max_iterations, Some(300));
        assert_eq!(config.scoring.cutoffs.vdw, 9.5);
        assert_eq!(config.scoring.heuristic, Some(HeuristicKind::GoldenRatio));
        assert_eq!(config.priors.secondary_structure.as_deref(), Some("CHHHC"));
        assert_eq!(config.priors.contacts.len(), 1);
        assert_eq!(config.priors.contacts[0].force_constant, 10.0);
    }

    #[test]
    fn cli_arguments_override_file_values() {
        let dir = tempdir().unwrap();
        let path = write_config_file(
            &dir,
            "override.toml",
            r#"
            seed = 7 # Will be overridden
            [minimization]
            strategy = "gentle"
            "#,
        );
        let args = predict_args(&[
            "--seed",
            "11",
            "--strategy",
            "annealing",
            "--samples",
            "3",
            "--disable",
            "quaternion",
            "--no-chou-fasman",
        ]);

        let config = PartialPredictionConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&args)
            .unwrap();

        assert_eq!(config.seed, 11);
        assert_eq!(config.minimization.strategy, Some(MinimizerStrategy::Annealing));
        assert!(SamplerKind::ALL.iter().all(|&k| config.sampling.samples(k) == 3));
        assert!(!config.sampling.quaternion.enabled);
        assert!(!config.priors.chou_fasman);
    }

    #[test]
    fn set_values_override_file_values() {
        let dir = tempdir().unwrap();
        let path = write_config_file(
            &dir,
            "set.toml",
            r#"
            [sampling.fragments]
            samples = 5 # Will be overridden by --set
            "#,
        );
        let args = predict_args(&[
            "-S",
            "sampling.fragments.samples=9",
            "-S",
            "sampling.mc.enabled=false",
            "-S",
            "scoring.heuristic=digital-root",
            "-S",
            "minimization.strategy=steepest-descent",
        ]);

        let config = PartialPredictionConfig::from_file(&path)
            .unwrap()
            .merge_with_cli(&args)
            .unwrap();

        assert_eq!(config.sampling.fragments.samples, 9);
        assert!(!config.sampling.monte_carlo.enabled);
        assert_eq!(config.scoring.heuristic, Some(HeuristicKind::DigitalRoot));
        assert_eq!(config.minimization.strategy, Some(MinimizerStrategy::Gentle));
    }

    #[test]
    fn malformed_and_unknown_set_values_are_rejected() {
        for bad in ["seed", "seed=abc", "sampling.rotamers.samples=3", "unknown.key=1"] {
            let result = PartialPredictionConfig::default().resolve(&[bad.to_string()]);
            assert!(matches!(result, Err(CliError::Config(_))), "accepted '{}'", bad);
        }
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = write_config_file(&dir, "typo.toml", "[sampling.basin]\nsamples = 3\n");
        let result = PartialPredictionConfig::from_file(&path);
        assert!(matches!(result, Err(CliError::FileParsing { .. })));
    }

    #[test]
    fn invalid_values_fail_core_validation() {
        let result = PartialPredictionConfig::default()
            .resolve(&["sampling.basins.persistence=1.5".to_string()]);
        match result {
            Err(CliError::Config(msg)) => assert!(msg.contains("sampling.basins.persistence")),
            other => panic!("expected a configuration error, got {:?}", other.map(|c| c.seed)),
        }
    }

    #[test]
    fn disabling_every_sampler_is_an_error() {
        let args = predict_args(&[
            "--disable",
            "quaternion",
            "--disable",
            "monte-carlo",
            "--disable",
            "fragment",
            "--disable",
            "basin",
        ]);
        let result = PartialPredictionConfig::default().merge_with_cli(&args);
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn missing_forcefield_file_is_reported_with_its_path() {
        let result = PartialPredictionConfig::default()
            .resolve(&["forcefield=/nonexistent/forcefield.toml".to_string()]);
        match result {
            Err(CliError::FileParsing { path, .. }) => {
                assert_eq!(path, PathBuf::from("/nonexistent/forcefield.toml"))
            }
            other => panic!("expected a file error, got {:?}", other.map(|c| c.seed)),
        }
    }
}
