//! Secondary-structure and contact priors.
//!
//! Priors bias sampling and add restraints to the energy model. Secondary structure comes
//! either from an external DSSP-like string or from a Chou–Fasman propensity prediction;
//! contacts become flat-bottom CA–CA restraints.

use crate::core::forcefield::topology::ContactRestraint;
use crate::core::geometry::ramachandran::{RamachandranAngles, mark_termini};
use crate::core::models::builder::extended_conformation;
use crate::core::models::residue::AminoAcid;
use phf::{Map, phf_map};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Chou–Fasman (Pα, Pβ) conformational propensities by one-letter code.
static PROPENSITIES: Map<char, (f64, f64)> = phf_map! {
    'A' => (1.42, 0.83),
    'R' => (0.98, 0.93),
    'N' => (0.67, 0.89),
    'D' => (1.01, 0.54),
    'C' => (0.70, 1.19),
    'Q' => (1.11, 1.10),
    'E' => (1.51, 0.37),
    'G' => (0.57, 0.75),
    'H' => (1.00, 0.87),
    'I' => (1.08, 1.60),
    'L' => (1.21, 1.30),
    'K' => (1.16, 0.74),
    'M' => (1.45, 1.05),
    'F' => (1.13, 1.38),
    'P' => (0.57, 0.55),
    'S' => (0.77, 0.75),
    'T' => (0.83, 1.19),
    'W' => (1.08, 1.37),
    'Y' => (0.69, 1.47),
    'V' => (1.06, 1.70),
};

const HELIX_WINDOW: usize = 6;
const STRAND_WINDOW: usize = 5;
const HELIX_THRESHOLD: f64 = 1.03;
const STRAND_THRESHOLD: f64 = 1.05;

/// Canonical (phi, psi) of each state, in degrees.
const HELIX_ANGLES: (f64, f64) = (-63.0, -43.0);
const STRAND_ANGLES: (f64, f64) = (-120.0, 130.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecondaryStructure {
    Helix,
    Strand,
    Coil,
}

impl SecondaryStructure {
    /// Maps DSSP letters: H, G and I to helix, E and B to strand, anything else to coil.
    pub fn from_dssp(code: char) -> Self {
        match code.to_ascii_uppercase() {
            'H' | 'G' | 'I' => SecondaryStructure::Helix,
            'E' | 'B' => SecondaryStructure::Strand,
            _ => SecondaryStructure::Coil,
        }
    }

    pub fn code(&self) -> char {
        match self {
            SecondaryStructure::Helix => 'H',
            SecondaryStructure::Strand => 'E',
            SecondaryStructure::Coil => 'C',
        }
    }
}

impl fmt::Display for SecondaryStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PriorError {
    #[error("Secondary structure has {actual} states but the sequence has {expected} residues")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("Contact ({residue_a}, {residue_b}) refers to a residue outside a chain of {length}")]
    ContactOutOfRange {
        residue_a: usize,
        residue_b: usize,
        length: usize,
    },
    #[error("Contact ({residue_a}, {residue_b}) has an invalid upper bound {upper_bound}")]
    InvalidContactBound {
        residue_a: usize,
        residue_b: usize,
        upper_bound: f64,
    },
}

/// Parses a DSSP-like string, ignoring whitespace.
pub fn parse_secondary_structure(text: &str) -> Vec<SecondaryStructure> {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .map(SecondaryStructure::from_dssp)
        .collect()
}

pub fn secondary_structure_string(states: &[SecondaryStructure]) -> String {
    states.iter().map(SecondaryStructure::code).collect()
}

fn propensity(amino_acid: AminoAcid) -> (f64, f64) {
    PROPENSITIES
        .get(&amino_acid.one_letter())
        .copied()
        .unwrap_or((1.0, 1.0))
}

fn window_mean(values: &[f64], center: usize, width: usize) -> f64 {
    let half = width / 2;
    let start = center.saturating_sub(half);
    let end = (start + width).min(values.len());
    let start = end.saturating_sub(width);
    let window = &values[start..end];
    window.iter().sum::<f64>() / window.len() as f64
}

/// Chou–Fasman prediction from windowed mean propensities.
///
/// A residue is helical when the mean Pα of its helix window reaches 1.03 and exceeds the
/// mean Pβ, a strand when the mean Pβ reaches 1.05 and exceeds the mean Pα, and coil
/// otherwise.
pub fn chou_fasman(sequence: &[AminoAcid]) -> Vec<SecondaryStructure> {
    let (alpha, beta): (Vec<f64>, Vec<f64>) = sequence.iter().map(|&aa| propensity(aa)).unzip();
    (0..sequence.len())
        .map(|i| {
            let helix = window_mean(&alpha, i, HELIX_WINDOW);
            let strand = window_mean(&beta, i, STRAND_WINDOW);
            let helix_beta = window_mean(&beta, i, HELIX_WINDOW);
            let strand_alpha = window_mean(&alpha, i, STRAND_WINDOW);
            if helix >= HELIX_THRESHOLD && helix > helix_beta {
                SecondaryStructure::Helix
            } else if strand >= STRAND_THRESHOLD && strand > strand_alpha {
                SecondaryStructure::Strand
            } else {
                SecondaryStructure::Coil
            }
        })
        .collect()
}

/// Where the secondary-structure prior came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorSource {
    External,
    ChouFasman,
    None,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriorConfig {
    /// Predict secondary structure with Chou–Fasman when no external string is given.
    pub chou_fasman: bool,
    /// Constrain the basin explorer to basins compatible with the secondary structure.
    pub constrain_basins: bool,
    pub secondary_structure: Option<String>,
    pub contacts: Vec<ContactRestraint>,
}

/// Priors resolved against one sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Priors {
    secondary_structure: Option<Vec<SecondaryStructure>>,
    contacts: Vec<ContactRestraint>,
    source: PriorSource,
    constrain_basins: bool,
}

impl Default for Priors {
    fn default() -> Self {
        Self::none()
    }
}

impl Priors {
    pub fn none() -> Self {
        Self {
            secondary_structure: None,
            contacts: Vec::new(),
            source: PriorSource::None,
            constrain_basins: false,
        }
    }

    pub fn resolve(sequence: &[AminoAcid], config: &PriorConfig) -> Result<Self, PriorError> {
        let (secondary_structure, source) = match &config.secondary_structure {
            Some(text) => {
                let states = parse_secondary_structure(text);
                if states.len() != sequence.len() {
                    return Err(PriorError::LengthMismatch {
                        expected: sequence.len(),
                        actual: states.len(),
                    });
                }
                (Some(states), PriorSource::External)
            }
            None if config.chou_fasman => (Some(chou_fasman(sequence)), PriorSource::ChouFasman),
            None => (None, PriorSource::None),
        };

        for contact in &config.contacts {
            if contact.residue_a >= sequence.len() || contact.residue_b >= sequence.len() {
                return Err(PriorError::ContactOutOfRange {
                    residue_a: contact.residue_a,
                    residue_b: contact.residue_b,
                    length: sequence.len(),
                });
            }
            if !(contact.upper_bound.is_finite() && contact.upper_bound > 0.0) {
                return Err(PriorError::InvalidContactBound {
                    residue_a: contact.residue_a,
                    residue_b: contact.residue_b,
                    upper_bound: contact.upper_bound,
                });
            }
        }

        if let Some(states) = &secondary_structure {
            debug!(
                source = ?source,
                states = %secondary_structure_string(states),
                "Resolved secondary-structure prior."
            );
        }

        Ok(Self {
            secondary_structure,
            contacts: config.contacts.clone(),
            source,
            constrain_basins: config.constrain_basins,
        })
    }

    pub fn secondary_structure(&self) -> Option<&[SecondaryStructure]> {
        self.secondary_structure.as_deref()
    }

    pub fn state_at(&self, index: usize) -> Option<SecondaryStructure> {
        self.secondary_structure
            .as_ref()
            .and_then(|states| states.get(index).copied())
    }

    pub fn contacts(&self) -> &[ContactRestraint] {
        &self.contacts
    }

    pub fn source(&self) -> PriorSource {
        self.source
    }

    pub fn constrain_basins(&self) -> bool {
        self.constrain_basins && self.secondary_structure.is_some()
    }

    /// Starting angles for a chain of `length` residues: canonical helix or strand angles
    /// where a prior exists, the extended conformation elsewhere. Termini are undefined.
    pub fn reference_angles(&self, length: usize) -> Vec<RamachandranAngles> {
        let mut angles = extended_conformation(length);
        for (i, angle) in angles.iter_mut().enumerate() {
            let canonical = match self.state_at(i) {
                Some(SecondaryStructure::Helix) => HELIX_ANGLES,
                Some(SecondaryStructure::Strand) => STRAND_ANGLES,
                _ => continue,
            };
            *angle = RamachandranAngles::from_degrees(canonical.0, canonical.1);
        }
        mark_termini(&mut angles);
        angles
    }
}
