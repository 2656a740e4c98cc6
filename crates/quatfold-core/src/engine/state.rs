use super::minimizer::{AbortReason, MinimizerStrategy, RunState};
use crate::core::forcefield::term::EnergyBreakdown;
use crate::core::geometry::ramachandran::RamachandranAngles;
use crate::core::models::structure::Structure;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// The sampler that produced an angle set.
///
/// The declaration order is the deterministic tie-break order used during selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SamplerKind {
    Quaternion,
    MonteCarlo,
    Fragment,
    Basin,
}

impl SamplerKind {
    pub const ALL: [SamplerKind; 4] = [
        SamplerKind::Quaternion,
        SamplerKind::MonteCarlo,
        SamplerKind::Fragment,
        SamplerKind::Basin,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SamplerKind::Quaternion => "quaternion",
            SamplerKind::MonteCarlo => "monte-carlo",
            SamplerKind::Fragment => "fragment",
            SamplerKind::Basin => "basin",
        }
    }

    /// Index of this sampler's RNG stream.
    pub(crate) fn stream_index(&self) -> u64 {
        *self as u64
    }
}

impl fmt::Display for SamplerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown sampler '{0}' (expected quaternion, monte-carlo, fragment or basin)")]
pub struct ParseSamplerKindError(pub String);

impl FromStr for SamplerKind {
    type Err = ParseSamplerKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "quaternion" | "quat" => Ok(SamplerKind::Quaternion),
            "monte-carlo" | "montecarlo" | "mc" => Ok(SamplerKind::MonteCarlo),
            "fragment" | "fragments" => Ok(SamplerKind::Fragment),
            "basin" | "basins" => Ok(SamplerKind::Basin),
            _ => Err(ParseSamplerKindError(s.to_string())),
        }
    }
}

/// One sampled angle set, tagged with its origin.
#[derive(Debug, Clone, PartialEq)]
pub struct AngleSet {
    pub method: SamplerKind,
    /// Position within the sampler's own output.
    pub sample_index: usize,
    pub angles: Vec<RamachandranAngles>,
}

/// The pool of angle sets collected during the Sample phase, in sampler order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ensemble {
    members: Vec<AngleSet>,
}

impl Ensemble {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, member: AngleSet) {
        self.members.push(member);
    }

    pub fn extend_from(&mut self, method: SamplerKind, angle_sets: Vec<Vec<RamachandranAngles>>) {
        self.members.extend(
            angle_sets
                .into_iter()
                .enumerate()
                .map(|(sample_index, angles)| AngleSet {
                    method,
                    sample_index,
                    angles,
                }),
        );
    }

    pub fn members(&self) -> &[AngleSet] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn count_by(&self, method: SamplerKind) -> usize {
        self.members.iter().filter(|m| m.method == method).count()
    }
}

/// What the minimizer did to a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct MinimizationSummary {
    pub strategy: MinimizerStrategy,
    pub state: RunState,
    pub iterations: usize,
    pub initial_energy: f64,
    pub final_energy: f64,
    /// The quasi-Newton run aborted and gentle relaxation produced the result.
    pub fell_back: bool,
    pub abort_reason: Option<AbortReason>,
}

/// A built, minimized and scored conformation.
///
/// Candidates are immutable once scored; all fields are read through accessors.
#[derive(Debug, Clone)]
pub struct Candidate {
    method: SamplerKind,
    ensemble_index: usize,
    angles: Vec<RamachandranAngles>,
    structure: Structure,
    energy: EnergyBreakdown,
    quality: f64,
    heuristic: Option<f64>,
    minimization: MinimizationSummary,
    score: f64,
}

impl Candidate {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        method: SamplerKind,
        ensemble_index: usize,
        structure: Structure,
        energy: EnergyBreakdown,
        quality: f64,
        heuristic: Option<f64>,
        minimization: MinimizationSummary,
        score: f64,
    ) -> Self {
        let angles = structure.backbone_angles();
        Self {
            method,
            ensemble_index,
            angles,
            structure,
            energy,
            quality,
            heuristic,
            minimization,
            score,
        }
    }

    pub fn method(&self) -> SamplerKind {
        self.method
    }

    /// Index of the originating angle set in the ensemble.
    pub fn ensemble_index(&self) -> usize {
        self.ensemble_index
    }

    /// Backbone dihedrals measured on the minimized structure.
    pub fn angles(&self) -> &[RamachandranAngles] {
        &self.angles
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    pub fn energy(&self) -> &EnergyBreakdown {
        &self.energy
    }

    pub fn quality(&self) -> f64 {
        self.quality
    }

    pub fn heuristic(&self) -> Option<f64> {
        self.heuristic
    }

    pub fn minimization(&self) -> &MinimizationSummary {
        &self.minimization
    }

    /// Selection score; lower ranks first.
    pub fn score(&self) -> f64 {
        self.score
    }
}
