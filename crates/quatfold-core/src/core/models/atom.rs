use nalgebra::Point3;
use std::fmt;
use std::str::FromStr;

/// Chemical element of a backbone atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum Element {
    Carbon,
    Nitrogen,
    Oxygen,
    Hydrogen,
    Sulfur,
    #[default]
    Other,
}

impl Element {
    /// Infers the element from a PDB-style atom name (`"CA"` → carbon, `"HA"` → hydrogen).
    pub fn from_atom_name(name: &str) -> Self {
        match name.trim().chars().find(|c| c.is_ascii_alphabetic()) {
            Some('C') | Some('c') => Element::Carbon,
            Some('N') | Some('n') => Element::Nitrogen,
            Some('O') | Some('o') => Element::Oxygen,
            Some('H') | Some('h') | Some('D') | Some('d') => Element::Hydrogen,
            Some('S') | Some('s') => Element::Sulfur,
            _ => Element::Other,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Element::Carbon => "C",
            Element::Nitrogen => "N",
            Element::Oxygen => "O",
            Element::Hydrogen => "H",
            Element::Sulfur => "S",
            Element::Other => "X",
        }
    }

    pub fn is_hydrogen(&self) -> bool {
        matches!(self, Element::Hydrogen)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Element {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "C" => Ok(Element::Carbon),
            "N" => Ok(Element::Nitrogen),
            "O" => Ok(Element::Oxygen),
            "H" | "D" => Ok(Element::Hydrogen),
            "S" => Ok(Element::Sulfur),
            "X" => Ok(Element::Other),
            _ => Err(()),
        }
    }
}

/// An atom of a [`Structure`](super::structure::Structure).
///
/// Atoms are owned by exactly one structure. `residue_index` is the position of the owning
/// residue in that structure's residue list.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The name of the atom (e.g., "CA", "N", "O").
    pub name: String,
    pub element: Element,
    /// Serial number, unique within the structure.
    pub serial: usize,
    pub residue_index: usize,
    /// The 3D coordinates of the atom in Angstroms.
    pub position: Point3<f64>,
}

impl Atom {
    /// Creates a new `Atom`, inferring the element from its name.
    ///
    /// The serial number is assigned when the atom is added to a structure.
    pub fn new(name: &str, residue_index: usize, position: Point3<f64>) -> Self {
        Self {
            name: name.to_string(),
            element: Element::from_atom_name(name),
            serial: 0,
            residue_index,
            position,
        }
    }

    pub fn with_element(mut self, element: Element) -> Self {
        self.element = element;
        self
    }

    pub fn is_heavy(&self) -> bool {
        !self.element.is_hydrogen()
    }
}
