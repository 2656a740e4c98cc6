use super::atom::Atom;
use super::ids::AtomId;
use super::residue::Residue;
use crate::core::geometry::ramachandran::RamachandranAngles;
use crate::core::geometry::spatial::dihedral_angle;
use nalgebra::Point3;
use slotmap::SlotMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    #[error("Residue index {0} is out of bounds")]
    ResidueOutOfBounds(usize),
    #[error("Coordinate count mismatch: expected {expected}, got {actual}")]
    CoordinateCountMismatch { expected: usize, actual: usize },
}

/// One full backbone conformation of a single chain.
///
/// Atoms live in a flat arena keyed by [`AtomId`]; residues refer to their atoms by id.
/// `atom_order` fixes the iteration order used by every flat coordinate view, so the
/// energy model, minimizers and samplers agree on atom indices.
///
/// Cloning is a deep copy. Because slot keys are plain indices into the arena, residue
/// atom ids stay valid in the clone and refer to the clone's own atoms.
#[derive(Debug, Clone, Default)]
pub struct Structure {
    atoms: SlotMap<AtomId, Atom>,
    residues: Vec<Residue>,
    atom_order: Vec<AtomId>,
    next_serial: usize,
}

impl Structure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a residue and returns its index.
    pub fn add_residue(&mut self, name: &str, chain_id: char) -> usize {
        let index = self.residues.len();
        self.residues.push(Residue::new(index, name, chain_id));
        index
    }

    /// Adds an atom to the residue at `residue_index`, assigning the next serial number
    /// when the atom carries none.
    pub fn add_atom(&mut self, residue_index: usize, mut atom: Atom) -> Result<AtomId, StructureError> {
        let residue = self
            .residues
            .get_mut(residue_index)
            .ok_or(StructureError::ResidueOutOfBounds(residue_index))?;

        atom.residue_index = residue_index;
        if atom.serial == 0 {
            self.next_serial += 1;
            atom.serial = self.next_serial;
        } else {
            self.next_serial = self.next_serial.max(atom.serial);
        }
        let name = atom.name.clone();
        let id = self.atoms.insert(atom);
        residue.add_atom(&name, id);
        self.atom_order.push(id);
        Ok(id)
    }

    pub fn atom(&self, id: AtomId) -> Option<&Atom> {
        self.atoms.get(id)
    }

    pub fn atom_mut(&mut self, id: AtomId) -> Option<&mut Atom> {
        self.atoms.get_mut(id)
    }

    /// Atoms in structure order.
    pub fn atoms_iter(&self) -> impl Iterator<Item = (AtomId, &Atom)> {
        self.atom_order
            .iter()
            .filter_map(move |&id| self.atoms.get(id).map(|atom| (id, atom)))
    }

    pub fn atom_ids(&self) -> &[AtomId] {
        &self.atom_order
    }

    pub fn residues(&self) -> &[Residue] {
        &self.residues
    }

    pub fn residue(&self, index: usize) -> Option<&Residue> {
        self.residues.get(index)
    }

    pub fn atom_count(&self) -> usize {
        self.atom_order.len()
    }

    pub fn residue_count(&self) -> usize {
        self.residues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atom_order.is_empty()
    }

    /// One-letter sequence; residues of unknown type appear as `X`.
    pub fn sequence(&self) -> String {
        self.residues
            .iter()
            .map(|r| r.amino_acid.map_or('X', |aa| aa.one_letter()))
            .collect()
    }

    /// Position of a named atom in the residue at `residue_index`.
    pub fn atom_position(&self, residue_index: usize, atom_name: &str) -> Option<Point3<f64>> {
        let id = self.residues.get(residue_index)?.get_atom_id_by_name(atom_name)?;
        self.atoms.get(id).map(|atom| atom.position)
    }

    /// All positions in structure order.
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.atoms_iter().map(|(_, atom)| atom.position).collect()
    }

    /// Overwrites all positions in structure order.
    pub fn set_positions(&mut self, positions: &[Point3<f64>]) -> Result<(), StructureError> {
        if positions.len() != self.atom_order.len() {
            return Err(StructureError::CoordinateCountMismatch {
                expected: self.atom_order.len(),
                actual: positions.len(),
            });
        }
        for (&id, &position) in self.atom_order.iter().zip(positions) {
            if let Some(atom) = self.atoms.get_mut(id) {
                atom.position = position;
            }
        }
        Ok(())
    }

    /// CA positions of the residues that have one, in residue order.
    pub fn ca_positions(&self) -> Vec<Point3<f64>> {
        self.residues
            .iter()
            .filter_map(|r| r.backbone().ca)
            .filter_map(|id| self.atoms.get(id).map(|atom| atom.position))
            .collect()
    }

    /// Measures phi, psi and omega of every residue from the current coordinates.
    ///
    /// Angles that need a missing atom or a missing neighbour are NaN, which makes the chain
    /// termini undefined.
    pub fn backbone_angles(&self) -> Vec<RamachandranAngles> {
        let frame = |i: usize| -> Option<(Point3<f64>, Point3<f64>, Point3<f64>)> {
            let (n, ca, c) = self.residues.get(i)?.backbone().frame()?;
            Some((
                self.atoms.get(n)?.position,
                self.atoms.get(ca)?.position,
                self.atoms.get(c)?.position,
            ))
        };

        (0..self.residues.len())
            .map(|i| {
                let current = frame(i);
                let previous = i.checked_sub(1).and_then(frame);
                let next = frame(i + 1);

                let phi = match (previous, current) {
                    (Some((_, _, c_prev)), Some((n, ca, c))) => dihedral_angle(&c_prev, &n, &ca, &c),
                    _ => f64::NAN,
                };
                let (psi, omega) = match (current, next) {
                    (Some((n, ca, c)), Some((n_next, ca_next, _))) => (
                        dihedral_angle(&n, &ca, &c, &n_next),
                        dihedral_angle(&ca, &c, &n_next, &ca_next),
                    ),
                    _ => (f64::NAN, std::f64::consts::PI),
                };
                RamachandranAngles::with_omega(phi, psi, omega)
            })
            .collect()
    }
}
