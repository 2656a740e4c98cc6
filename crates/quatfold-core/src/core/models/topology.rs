use super::structure::Structure;
use std::collections::{HashMap, VecDeque};

/// Covalent bonds inside one backbone residue, by atom name.
const INTRA_RESIDUE_BONDS: [(&str, &str); 6] = [
    ("N", "CA"),
    ("CA", "C"),
    ("C", "O"),
    ("C", "OXT"),
    ("N", "H"),
    ("CA", "HA"),
];

/// A covalent bond between two atoms, as indices into the structure's atom order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bond {
    pub atom1: usize,
    pub atom2: usize,
}

impl Bond {
    pub fn new(atom1: usize, atom2: usize) -> Self {
        Self {
            atom1: atom1.min(atom2),
            atom2: atom1.max(atom2),
        }
    }

    pub fn contains(&self, atom: usize) -> bool {
        self.atom1 == atom || self.atom2 == atom
    }
}

/// Covalent connectivity of a backbone, derived from atom names.
///
/// Only atoms that are present contribute bonds, so a CA-only trace has no bonds at all
/// and every pair of its atoms is non-bonded.
#[derive(Debug, Clone, Default)]
pub struct BondGraph {
    bonds: Vec<Bond>,
    adjacency: Vec<Vec<usize>>,
}

impl BondGraph {
    pub fn from_structure(structure: &Structure) -> Self {
        let index_of: HashMap<_, _> = structure
            .atom_ids()
            .iter()
            .enumerate()
            .map(|(index, &id)| (id, index))
            .collect();
        let lookup = |residue_index: usize, name: &str| {
            structure
                .residue(residue_index)
                .and_then(|r| r.get_atom_id_by_name(name))
                .and_then(|id| index_of.get(&id).copied())
        };

        let mut bonds = Vec::new();
        for residue in structure.residues() {
            for (a, b) in INTRA_RESIDUE_BONDS {
                if let (Some(i), Some(j)) = (lookup(residue.index, a), lookup(residue.index, b)) {
                    bonds.push(Bond::new(i, j));
                }
            }
            if let (Some(i), Some(j)) = (lookup(residue.index, "C"), lookup(residue.index + 1, "N")) {
                bonds.push(Bond::new(i, j));
            }
        }
        Self::from_bonds(structure.atom_count(), bonds)
    }

    pub fn from_bonds(atom_count: usize, mut bonds: Vec<Bond>) -> Self {
        bonds.sort_unstable();
        bonds.dedup();
        let mut adjacency = vec![Vec::new(); atom_count];
        for bond in &bonds {
            adjacency[bond.atom1].push(bond.atom2);
            adjacency[bond.atom2].push(bond.atom1);
        }
        Self { bonds, adjacency }
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn neighbors(&self, atom: usize) -> &[usize] {
        self.adjacency.get(atom).map_or(&[], Vec::as_slice)
    }

    pub fn atom_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of bonds on the shortest path between two atoms, if it is at most `max_bonds`.
    pub fn separation(&self, from: usize, to: usize, max_bonds: usize) -> Option<usize> {
        if from == to {
            return Some(0);
        }
        let mut visited = vec![false; self.adjacency.len()];
        let mut queue = VecDeque::from([(from, 0usize)]);
        visited[from] = true;
        while let Some((atom, depth)) = queue.pop_front() {
            if depth == max_bonds {
                continue;
            }
            for &next in self.neighbors(atom) {
                if next == to {
                    return Some(depth + 1);
                }
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back((next, depth + 1));
                }
            }
        }
        None
    }

    /// Every bond-angle triple `(i, j, k)` with `j` the central atom and `i < k`.
    pub fn angles(&self) -> Vec<(usize, usize, usize)> {
        let mut angles = Vec::new();
        for (center, neighbors) in self.adjacency.iter().enumerate() {
            for (a, &i) in neighbors.iter().enumerate() {
                for &k in &neighbors[a + 1..] {
                    angles.push((i.min(k), center, i.max(k)));
                }
            }
        }
        angles
    }

    /// Every proper dihedral quadruple `(i, j, k, l)` along bonded paths, each listed once.
    pub fn dihedrals(&self) -> Vec<(usize, usize, usize, usize)> {
        let mut dihedrals = Vec::new();
        for bond in &self.bonds {
            let (j, k) = (bond.atom1, bond.atom2);
            for &i in self.neighbors(j) {
                if i == k {
                    continue;
                }
                for &l in self.neighbors(k) {
                    if l == j || l == i {
                        continue;
                    }
                    dihedrals.push((i, j, k, l));
                }
            }
        }
        dihedrals
    }
}
