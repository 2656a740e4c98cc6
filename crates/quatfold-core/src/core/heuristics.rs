//! Optional conformation heuristics.
//!
//! **These scorers are not physically validated.** They encode numerological patterns
//! (golden-ratio relations between dihedrals, digital roots of angle sums) and exist only
//! as opt-in bias terms for sampling and ranking. They never influence structural
//! validation, and with the default configuration they are not used at all.

use crate::core::geometry::ramachandran::RamachandranAngles;
use serde::{Deserialize, Serialize};
use std::fmt;

const GOLDEN_RATIO: f64 = 1.618_033_988_749_895;

/// A penalty over an angle set. Lower is better; values lie in `[0, 1]`.
pub trait ConformationHeuristic: Send + Sync {
    fn name(&self) -> &'static str;

    fn penalty(&self, angles: &[RamachandranAngles]) -> f64;
}

/// Penalizes residues whose `|psi| / |phi|` ratio is far from the golden ratio or its
/// inverse.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoldenRatioHeuristic;

impl ConformationHeuristic for GoldenRatioHeuristic {
    fn name(&self) -> &'static str {
        "golden-ratio"
    }

    fn penalty(&self, angles: &[RamachandranAngles]) -> f64 {
        let deviations: Vec<f64> = angles
            .iter()
            .filter(|a| a.is_defined() && a.phi.abs() > 1e-6)
            .map(|a| {
                let ratio = a.psi.abs() / a.phi.abs();
                let deviation = (ratio - GOLDEN_RATIO)
                    .abs()
                    .min((ratio - 1.0 / GOLDEN_RATIO).abs());
                deviation / (1.0 + deviation)
            })
            .collect();
        if deviations.is_empty() {
            return 0.0;
        }
        deviations.iter().sum::<f64>() / deviations.len() as f64
    }
}

/// Penalizes angle sets whose rounded total of |phi| + |psi| in degrees has a digital root
/// other than 9.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigitalRootHeuristic;

impl ConformationHeuristic for DigitalRootHeuristic {
    fn name(&self) -> &'static str {
        "digital-root"
    }

    fn penalty(&self, angles: &[RamachandranAngles]) -> f64 {
        let sum: f64 = angles
            .iter()
            .filter(|a| a.is_defined())
            .map(|a| a.phi_degrees().abs() + a.psi_degrees().abs())
            .sum();
        let root = digital_root(sum.round() as u64);
        if root == 9 || root == 0 { 0.0 } else { f64::from(9 - root as u32) / 9.0 }
    }
}

fn digital_root(value: u64) -> u64 {
    if value == 0 { 0 } else { 1 + (value - 1) % 9 }
}

/// Configuration-level selection of a heuristic plug-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeuristicKind {
    GoldenRatio,
    DigitalRoot,
}

impl HeuristicKind {
    pub fn create(&self) -> Box<dyn ConformationHeuristic> {
        match self {
            HeuristicKind::GoldenRatio => Box::new(GoldenRatioHeuristic),
            HeuristicKind::DigitalRoot => Box::new(DigitalRootHeuristic),
        }
    }
}

impl fmt::Display for HeuristicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.create().name())
    }
}
