use super::atom::{Atom, Element};
use super::structure::{Structure, StructureError};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParsedResidue {
    pub name: String,
    /// Zero-based position in the sequence.
    pub index: usize,
    #[serde(default = "default_chain_id")]
    pub chain_id: char,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParsedAtom {
    pub serial: usize,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    pub residue_index: usize,
    pub position: [f64; 3],
}

/// Format-neutral `{sequence, residues[], atoms[]}` view of one structure.
///
/// File formats such as PDB are converted into this view outside the library; the
/// library consumes it for reference structures and emits it for predicted ones.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParsedStructure {
    pub sequence: String,
    #[serde(default)]
    pub residues: Vec<ParsedResidue>,
    #[serde(default)]
    pub atoms: Vec<ParsedAtom>,
}

#[derive(Debug, Error)]
pub enum ParsedStructureError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Atom {serial} refers to unknown residue index {residue_index}")]
    UnknownResidue { serial: usize, residue_index: usize },
    #[error("Residues must be listed in sequence order: expected index {expected}, found {found}")]
    ResidueOrder { expected: usize, found: usize },
    #[error("Atom {serial} has a non-finite coordinate")]
    NonFiniteCoordinate { serial: usize },
    #[error(transparent)]
    Structure(#[from] StructureError),
}

fn default_chain_id() -> char {
    'A'
}

impl ParsedStructure {
    pub fn load(path: &Path) -> Result<Self, ParsedStructureError> {
        let content = std::fs::read_to_string(path).map_err(|e| ParsedStructureError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ParsedStructureError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }

    /// Materializes the view as a [`Structure`].
    ///
    /// Atoms keep their serial numbers; their element is taken from the record or inferred
    /// from the atom name.
    pub fn to_structure(&self) -> Result<Structure, ParsedStructureError> {
        let mut structure = Structure::new();
        for (expected, residue) in self.residues.iter().enumerate() {
            if residue.index != expected {
                return Err(ParsedStructureError::ResidueOrder {
                    expected,
                    found: residue.index,
                });
            }
            structure.add_residue(&residue.name, residue.chain_id);
        }

        for record in &self.atoms {
            if record.residue_index >= self.residues.len() {
                return Err(ParsedStructureError::UnknownResidue {
                    serial: record.serial,
                    residue_index: record.residue_index,
                });
            }
            if record.position.iter().any(|v| !v.is_finite()) {
                return Err(ParsedStructureError::NonFiniteCoordinate {
                    serial: record.serial,
                });
            }
            let [x, y, z] = record.position;
            let mut atom = Atom::new(&record.name, record.residue_index, Point3::new(x, y, z));
            atom.serial = record.serial;
            if let Some(element) = record
                .element
                .as_deref()
                .and_then(|e| Element::from_str(e).ok())
            {
                atom.element = element;
            }
            structure.add_atom(record.residue_index, atom)?;
        }
        Ok(structure)
    }
}

impl From<&Structure> for ParsedStructure {
    fn from(structure: &Structure) -> Self {
        let residues = structure
            .residues()
            .iter()
            .map(|r| ParsedResidue {
                name: r.name.clone(),
                index: r.index,
                chain_id: r.chain_id,
            })
            .collect();
        let atoms = structure
            .atoms_iter()
            .map(|(_, atom)| ParsedAtom {
                serial: atom.serial,
                name: atom.name.clone(),
                element: Some(atom.element.symbol().to_string()),
                residue_index: atom.residue_index,
                position: [atom.position.x, atom.position.y, atom.position.z],
            })
            .collect();
        Self {
            sequence: structure.sequence(),
            residues,
            atoms,
        }
    }
}
