//! Geometric sanity checks that are independent of the energy model.

use crate::core::limits::{INTRA_RESIDUE_BOND_RANGE, PEPTIDE_BOND_RANGE, SEVERE_CLASH_DISTANCE};
use crate::core::models::structure::Structure;
use crate::core::models::topology::BondGraph;
use itertools::Itertools;
use nalgebra::Point3;
use thiserror::Error;

/// Atoms separated by at most this many covalent bonds are never counted as clashing.
const CLASH_EXCLUSION_BONDS: usize = 2;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationFailure {
    #[error("Structure contains no atoms")]
    EmptyStructure,
    #[error("Atom {atom_name} of residue {residue_index} has a non-finite coordinate")]
    NonFiniteCoordinate {
        residue_index: usize,
        atom_name: String,
    },
    #[error("Residue {residue_index} is missing backbone atom {atom_name}")]
    MissingBackboneAtom {
        residue_index: usize,
        atom_name: &'static str,
    },
    #[error("Residue {residue_index} has {bond} bond length {length:.3} Å outside [{min}, {max}]")]
    BondLengthOutOfRange {
        residue_index: usize,
        bond: &'static str,
        length: f64,
        min: f64,
        max: f64,
    },
    #[error(
        "Peptide bond after residue {residue_index} has length {length:.3} Å outside [{min}, {max}]"
    )]
    PeptideBondOutOfRange {
        residue_index: usize,
        length: f64,
        min: f64,
        max: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub valid: bool,
    pub reason: Option<ValidationFailure>,
}

impl ValidationReport {
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn failed(reason: ValidationFailure) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
        }
    }
}

/// A non-bonded atom pair closer than the clash threshold. Atom indices follow the
/// structure's atom order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clash {
    pub atom1: usize,
    pub atom2: usize,
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClashReport {
    pub has_clashes: bool,
    pub clash_count: usize,
    /// Shortest clashing distance, if any pair clashes.
    pub worst_distance: Option<f64>,
    pub pairs: Vec<Clash>,
}

/// Checks backbone completeness and bond lengths.
///
/// Checks run in order and the first failure is reported: emptiness, finite coordinates,
/// presence of N/CA/C in every residue, N-CA and CA-C lengths, then C(i)-N(i+1) lengths.
pub fn validate(structure: &Structure) -> ValidationReport {
    match check(structure) {
        Ok(()) => ValidationReport::ok(),
        Err(reason) => ValidationReport::failed(reason),
    }
}

fn check(structure: &Structure) -> Result<(), ValidationFailure> {
    if structure.is_empty() {
        return Err(ValidationFailure::EmptyStructure);
    }

    if let Some((_, atom)) = structure
        .atoms_iter()
        .find(|(_, atom)| !atom.position.coords.iter().all(|v| v.is_finite()))
    {
        return Err(ValidationFailure::NonFiniteCoordinate {
            residue_index: atom.residue_index,
            atom_name: atom.name.clone(),
        });
    }

    let mut frames: Vec<(Point3<f64>, Point3<f64>, Point3<f64>)> = Vec::new();
    for residue in structure.residues() {
        let fetch = |name: &'static str| {
            structure
                .atom_position(residue.index, name)
                .ok_or(ValidationFailure::MissingBackboneAtom {
                    residue_index: residue.index,
                    atom_name: name,
                })
        };
        let n = fetch("N")?;
        let ca = fetch("CA")?;
        let c = fetch("C")?;
        frames.push((n, ca, c));
    }

    let (min, max) = INTRA_RESIDUE_BOND_RANGE;
    for (residue_index, (n, ca, c)) in frames.iter().enumerate() {
        for (bond, a, b) in [("N-CA", n, ca), ("CA-C", ca, c)] {
            let length = (b - a).norm();
            if !(min..=max).contains(&length) {
                return Err(ValidationFailure::BondLengthOutOfRange {
                    residue_index,
                    bond,
                    length,
                    min,
                    max,
                });
            }
        }
    }

    let (min, max) = PEPTIDE_BOND_RANGE;
    for (residue_index, pair) in frames.windows(2).enumerate() {
        let length = (pair[1].0 - pair[0].2).norm();
        if !(min..=max).contains(&length) {
            return Err(ValidationFailure::PeptideBondOutOfRange {
                residue_index,
                length,
                min,
                max,
            });
        }
    }
    Ok(())
}

/// Finds atom pairs more than two covalent bonds apart that are closer than `threshold`.
pub fn detect_clashes(structure: &Structure, threshold: f64) -> ClashReport {
    let positions = structure.positions();
    let graph = BondGraph::from_structure(structure);
    let threshold_sq = threshold * threshold;

    let pairs: Vec<Clash> = (0..positions.len())
        .tuple_combinations()
        .filter_map(|(i, j)| {
            let dist_sq = (positions[i] - positions[j]).norm_squared();
            if dist_sq >= threshold_sq || dist_sq.is_nan() {
                return None;
            }
            if graph.separation(i, j, CLASH_EXCLUSION_BONDS).is_some() {
                return None;
            }
            Some(Clash {
                atom1: i,
                atom2: j,
                distance: dist_sq.sqrt(),
            })
        })
        .collect();

    let worst_distance = pairs.iter().map(|c| c.distance).reduce(f64::min);
    ClashReport {
        has_clashes: !pairs.is_empty(),
        clash_count: pairs.len(),
        worst_distance,
        pairs,
    }
}

/// Ranking scalar in `[0, 1]`: 0 for an invalid structure, otherwise
/// `1 / (1 + Σ overlap)` where each clash contributes its overlap as a fraction of
/// `threshold`.
pub fn score_quality(structure: &Structure, threshold: f64) -> f64 {
    if !validate(structure).valid {
        return 0.0;
    }
    let report = detect_clashes(structure, threshold);
    let overlap: f64 = report
        .pairs
        .iter()
        .map(|clash| ((threshold - clash.distance) / threshold).clamp(0.0, 1.0))
        .sum();
    1.0 / (1.0 + overlap)
}

/// [`score_quality`] at the default severe-clash threshold.
pub fn default_quality(structure: &Structure) -> f64 {
    score_quality(structure, SEVERE_CLASH_DISTANCE)
}
