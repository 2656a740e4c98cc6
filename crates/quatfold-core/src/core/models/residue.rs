use super::ids::AtomId;
use phf::{Map, phf_map};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AminoAcid {
    // --- Aliphatic, Nonpolar ---
    Alanine,
    Glycine,
    Isoleucine,
    Leucine,
    Proline,
    Valine,

    // --- Aromatic ---
    Phenylalanine,
    Tryptophan,
    Tyrosine,

    // --- Polar, Uncharged ---
    Asparagine,
    Cysteine,
    Glutamine,
    Serine,
    Threonine,
    Methionine,

    // --- Charged ---
    Arginine,
    Histidine,
    Lysine,
    AsparticAcid,
    GlutamicAcid,
}

static ONE_LETTER_CODES: Map<char, AminoAcid> = phf_map! {
    'A' => AminoAcid::Alanine,
    'G' => AminoAcid::Glycine,
    'I' => AminoAcid::Isoleucine,
    'L' => AminoAcid::Leucine,
    'P' => AminoAcid::Proline,
    'V' => AminoAcid::Valine,
    'F' => AminoAcid::Phenylalanine,
    'W' => AminoAcid::Tryptophan,
    'Y' => AminoAcid::Tyrosine,
    'N' => AminoAcid::Asparagine,
    'C' => AminoAcid::Cysteine,
    'Q' => AminoAcid::Glutamine,
    'S' => AminoAcid::Serine,
    'T' => AminoAcid::Threonine,
    'M' => AminoAcid::Methionine,
    'R' => AminoAcid::Arginine,
    'H' => AminoAcid::Histidine,
    'K' => AminoAcid::Lysine,
    'D' => AminoAcid::AsparticAcid,
    'E' => AminoAcid::GlutamicAcid,
};

static THREE_LETTER_CODES: Map<&'static str, AminoAcid> = phf_map! {
    "ALA" => AminoAcid::Alanine,
    "GLY" => AminoAcid::Glycine,
    "ILE" => AminoAcid::Isoleucine,
    "LEU" => AminoAcid::Leucine,
    "PRO" => AminoAcid::Proline,
    "VAL" => AminoAcid::Valine,
    "PHE" => AminoAcid::Phenylalanine,
    "TRP" => AminoAcid::Tryptophan,
    "TYR" => AminoAcid::Tyrosine,
    "ASN" => AminoAcid::Asparagine,
    "CYS" => AminoAcid::Cysteine,
    "CYX" => AminoAcid::Cysteine,
    "GLN" => AminoAcid::Glutamine,
    "SER" => AminoAcid::Serine,
    "THR" => AminoAcid::Threonine,
    "MET" => AminoAcid::Methionine,
    "ARG" => AminoAcid::Arginine,
    "HIS" => AminoAcid::Histidine,
    "HSE" => AminoAcid::Histidine,
    "HSD" => AminoAcid::Histidine,
    "HSP" => AminoAcid::Histidine,
    "LYS" => AminoAcid::Lysine,
    "ASP" => AminoAcid::AsparticAcid,
    "GLU" => AminoAcid::GlutamicAcid,
};

impl AminoAcid {
    pub fn from_one_letter(code: char) -> Option<Self> {
        ONE_LETTER_CODES.get(&code.to_ascii_uppercase()).copied()
    }

    pub fn from_three_letter(code: &str) -> Option<Self> {
        THREE_LETTER_CODES
            .get(code.trim().to_ascii_uppercase().as_str())
            .copied()
    }

    pub fn one_letter(&self) -> char {
        match self {
            AminoAcid::Alanine => 'A',
            AminoAcid::Glycine => 'G',
            AminoAcid::Isoleucine => 'I',
            AminoAcid::Leucine => 'L',
            AminoAcid::Proline => 'P',
            AminoAcid::Valine => 'V',
            AminoAcid::Phenylalanine => 'F',
            AminoAcid::Tryptophan => 'W',
            AminoAcid::Tyrosine => 'Y',
            AminoAcid::Asparagine => 'N',
            AminoAcid::Cysteine => 'C',
            AminoAcid::Glutamine => 'Q',
            AminoAcid::Serine => 'S',
            AminoAcid::Threonine => 'T',
            AminoAcid::Methionine => 'M',
            AminoAcid::Arginine => 'R',
            AminoAcid::Histidine => 'H',
            AminoAcid::Lysine => 'K',
            AminoAcid::AsparticAcid => 'D',
            AminoAcid::GlutamicAcid => 'E',
        }
    }

    pub fn three_letter(&self) -> &'static str {
        match self {
            AminoAcid::Alanine => "ALA",
            AminoAcid::Glycine => "GLY",
            AminoAcid::Isoleucine => "ILE",
            AminoAcid::Leucine => "LEU",
            AminoAcid::Proline => "PRO",
            AminoAcid::Valine => "VAL",
            AminoAcid::Phenylalanine => "PHE",
            AminoAcid::Tryptophan => "TRP",
            AminoAcid::Tyrosine => "TYR",
            AminoAcid::Asparagine => "ASN",
            AminoAcid::Cysteine => "CYS",
            AminoAcid::Glutamine => "GLN",
            AminoAcid::Serine => "SER",
            AminoAcid::Threonine => "THR",
            AminoAcid::Methionine => "MET",
            AminoAcid::Arginine => "ARG",
            AminoAcid::Histidine => "HIS",
            AminoAcid::Lysine => "LYS",
            AminoAcid::AsparticAcid => "ASP",
            AminoAcid::GlutamicAcid => "GLU",
        }
    }

    pub fn is_glycine(&self) -> bool {
        matches!(self, AminoAcid::Glycine)
    }

    pub fn is_proline(&self) -> bool {
        matches!(self, AminoAcid::Proline)
    }
}

impl fmt::Display for AminoAcid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.three_letter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid amino acid code: '{0}'")]
pub struct ParseAminoAcidError(pub String);

impl FromStr for AminoAcid {
    type Err = ParseAminoAcidError;

    /// Parses either a one-letter or a three-letter code.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let parsed = match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_one_letter(c),
            _ => Self::from_three_letter(trimmed),
        };
        parsed.ok_or_else(|| ParseAminoAcidError(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequenceError {
    #[error("Sequence is empty")]
    Empty,
    #[error("Invalid residue '{code}' at position {position}")]
    InvalidResidue { code: char, position: usize },
}

/// Parses a one-letter amino-acid sequence. Whitespace is ignored.
pub fn parse_sequence(sequence: &str) -> Result<Vec<AminoAcid>, SequenceError> {
    let residues = sequence
        .chars()
        .filter(|c| !c.is_whitespace())
        .enumerate()
        .map(|(position, code)| {
            AminoAcid::from_one_letter(code)
                .ok_or(SequenceError::InvalidResidue { code, position })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if residues.is_empty() {
        return Err(SequenceError::Empty);
    }
    Ok(residues)
}

pub fn sequence_string(residues: &[AminoAcid]) -> String {
    residues.iter().map(AminoAcid::one_letter).collect()
}

/// Named backbone atom slots of a residue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackboneAtoms {
    pub n: Option<AtomId>,
    pub ca: Option<AtomId>,
    pub c: Option<AtomId>,
    pub o: Option<AtomId>,
    pub h: Option<AtomId>,
    pub ha: Option<AtomId>,
}

impl BackboneAtoms {
    fn slot_mut(&mut self, atom_name: &str) -> Option<&mut Option<AtomId>> {
        match atom_name {
            "N" => Some(&mut self.n),
            "CA" => Some(&mut self.ca),
            "C" => Some(&mut self.c),
            "O" => Some(&mut self.o),
            "H" | "HN" => Some(&mut self.h),
            "HA" => Some(&mut self.ha),
            _ => None,
        }
    }

    /// The N, CA and C atoms when all three are present.
    pub fn frame(&self) -> Option<(AtomId, AtomId, AtomId)> {
        Some((self.n?, self.ca?, self.c?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Residue {
    pub name: String,
    pub amino_acid: Option<AminoAcid>,
    /// Zero-based position in the sequence.
    pub index: usize,
    pub chain_id: char,
    pub(crate) atoms: Vec<AtomId>,
    atom_name_map: HashMap<String, AtomId>,
    backbone: BackboneAtoms,
}

impl Residue {
    pub(crate) fn new(index: usize, name: &str, chain_id: char) -> Self {
        Self {
            name: name.to_string(),
            amino_acid: AminoAcid::from_three_letter(name),
            index,
            chain_id,
            atoms: Vec::new(),
            atom_name_map: HashMap::new(),
            backbone: BackboneAtoms::default(),
        }
    }

    pub(crate) fn add_atom(&mut self, atom_name: &str, atom_id: AtomId) {
        let key = atom_name.trim();
        self.atoms.push(atom_id);
        self.atom_name_map.insert(key.to_string(), atom_id);
        if let Some(slot) = self.backbone.slot_mut(key) {
            *slot = Some(atom_id);
        }
    }

    pub fn atoms(&self) -> &[AtomId] {
        &self.atoms
    }

    pub fn backbone(&self) -> &BackboneAtoms {
        &self.backbone
    }

    pub fn get_atom_id_by_name(&self, name: &str) -> Option<AtomId> {
        self.atom_name_map.get(name).copied()
    }

    pub fn is_glycine(&self) -> bool {
        self.amino_acid.is_some_and(|aa| aa.is_glycine())
    }

    pub fn is_proline(&self) -> bool {
        self.amino_acid.is_some_and(|aa| aa.is_proline())
    }
}
