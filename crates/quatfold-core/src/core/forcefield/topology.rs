use super::params::ForceField;
use crate::core::models::structure::Structure;
use crate::core::models::topology::BondGraph;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BondTerm {
    pub atoms: [usize; 2],
    pub k: f64,
    pub r0: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleTerm {
    /// `atoms[1]` is the central atom.
    pub atoms: [usize; 3],
    pub k: f64,
    /// Equilibrium angle in radians.
    pub theta0: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FourierTerm {
    pub barrier: f64,
    pub periodicity: f64,
    /// Phase in radians.
    pub phase: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DihedralTerm {
    pub atoms: [usize; 4],
    pub terms: Vec<FourierTerm>,
}

/// A non-bonded pair with combined Lennard-Jones parameters and scales for 1-4 pairs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NonBondedPair {
    pub atoms: [usize; 2],
    pub r_min: f64,
    pub well_depth: f64,
    pub charge1: f64,
    pub charge2: f64,
    pub vdw_scale: f64,
    pub elec_scale: f64,
}

/// Upper-bound restraint on the CA–CA distance of two residues.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ContactRestraint {
    pub residue_a: usize,
    pub residue_b: usize,
    /// Distance in Å below which the restraint is inactive.
    pub upper_bound: f64,
    /// Force constant in kcal/(mol·Å²).
    #[serde(default = "default_restraint_force_constant")]
    pub force_constant: f64,
}

fn default_restraint_force_constant() -> f64 {
    10.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestraintTerm {
    pub atoms: [usize; 2],
    pub upper_bound: f64,
    pub k: f64,
}

/// Every energy term of one structure, with atom indices in the structure's atom order.
///
/// Terms whose parameters are missing from the force field are skipped.
#[derive(Debug, Clone, Default)]
pub struct EnergyTopology {
    pub atom_count: usize,
    pub bonds: Vec<BondTerm>,
    pub angles: Vec<AngleTerm>,
    pub dihedrals: Vec<DihedralTerm>,
    pub pairs: Vec<NonBondedPair>,
    pub restraints: Vec<RestraintTerm>,
}

impl EnergyTopology {
    pub fn build(
        structure: &Structure,
        forcefield: &ForceField,
        restraints: &[ContactRestraint],
    ) -> Self {
        let graph = BondGraph::from_structure(structure);
        let atoms: Vec<_> = structure.atoms_iter().map(|(_, atom)| atom).collect();
        let name = |i: usize| atoms[i].name.as_str();

        let mut skipped = 0usize;

        let bonds = graph
            .bonds()
            .iter()
            .filter_map(|bond| {
                let param = forcefield.bond(name(bond.atom1), name(bond.atom2));
                if param.is_none() {
                    skipped += 1;
                }
                param.map(|p| BondTerm {
                    atoms: [bond.atom1, bond.atom2],
                    k: p.k,
                    r0: p.r0,
                })
            })
            .collect();

        let angles = graph
            .angles()
            .into_iter()
            .filter_map(|(i, j, k)| {
                let param = forcefield.angle(name(i), name(j), name(k));
                if param.is_none() {
                    skipped += 1;
                }
                param.map(|p| AngleTerm {
                    atoms: [i, j, k],
                    k: p.k,
                    theta0: p.theta0.to_radians(),
                })
            })
            .collect();

        // Only the phi, psi and omega torsions carry parameters by default; the carbonyl and
        // hydrogen torsions are expected to be absent and are not counted as skipped.
        let dihedrals = graph
            .dihedrals()
            .into_iter()
            .filter_map(|(i, j, k, l)| {
                forcefield
                    .torsion(name(i), name(j), name(k), name(l))
                    .map(|params| DihedralTerm {
                        atoms: [i, j, k, l],
                        terms: params
                            .iter()
                            .map(|p| FourierTerm {
                                barrier: p.barrier,
                                periodicity: f64::from(p.periodicity),
                                phase: p.phase.to_radians(),
                            })
                            .collect(),
                    })
            })
            .collect();

        let globals = &forcefield.globals;
        let mut pairs = Vec::new();
        for i in 0..atoms.len() {
            for j in (i + 1)..atoms.len() {
                // Bonded paths of three bonds or fewer never span more than adjacent residues.
                let residue_gap = atoms[i].residue_index.abs_diff(atoms[j].residue_index);
                let separation = if residue_gap <= 1 {
                    graph.separation(i, j, 3)
                } else {
                    None
                };
                let (vdw_scale, elec_scale) = match separation {
                    Some(0..=2) => continue,
                    Some(_) => (globals.scale_14_vdw, globals.scale_14_elec),
                    None => (1.0, 1.0),
                };
                let vdw1 = forcefield.vdw(atoms[i].element.symbol());
                let vdw2 = forcefield.vdw(atoms[j].element.symbol());
                pairs.push(NonBondedPair {
                    atoms: [i, j],
                    r_min: vdw1.r_min_half + vdw2.r_min_half,
                    well_depth: (vdw1.well_depth * vdw2.well_depth).sqrt(),
                    charge1: forcefield.charge(name(i)),
                    charge2: forcefield.charge(name(j)),
                    vdw_scale,
                    elec_scale,
                });
            }
        }

        let ca_index = |residue: usize| {
            let id = structure.residue(residue)?.backbone().ca?;
            structure.atom_ids().iter().position(|&a| a == id)
        };
        let restraints = restraints
            .iter()
            .filter_map(|r| match (ca_index(r.residue_a), ca_index(r.residue_b)) {
                (Some(a), Some(b)) => Some(RestraintTerm {
                    atoms: [a, b],
                    upper_bound: r.upper_bound,
                    k: r.force_constant,
                }),
                _ => {
                    skipped += 1;
                    None
                }
            })
            .collect();

        if skipped > 0 {
            debug!(skipped, "Skipped energy terms without force-field parameters");
        }

        Self {
            atom_count: atoms.len(),
            bonds,
            angles,
            dihedrals,
            pairs,
            restraints,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::builder::{BackboneBuilder, extended_conformation};
    use crate::core::models::residue::parse_sequence;

    fn tripeptide() -> Structure {
        let residues = parse_sequence("GAC").unwrap();
        BackboneBuilder::default()
            .build(&residues, &extended_conformation(3))
            .unwrap()
            .structure
    }

    #[test]
    fn build_collects_bonded_terms_of_a_tripeptide() {
        let topology = EnergyTopology::build(&tripeptide(), &ForceField::default(), &[]);
        assert_eq!(topology.atom_count, 12);
        // 3 x (N-CA, CA-C, C-O) + 2 peptide bonds.
        assert_eq!(topology.bonds.len(), 11);
        // Per residue N-CA-C, CA-C-O; per peptide bond CA-C-N, O-C-N, C-N-CA.
        assert_eq!(topology.angles.len(), 3 * 2 + 2 * 3);
        // psi and omega per peptide bond plus phi of residues 2 and 3.
        assert_eq!(topology.dihedrals.len(), 6);
    }

    #[test]
    fn build_excludes_close_pairs_and_scales_one_four_pairs() {
        let topology = EnergyTopology::build(&tripeptide(), &ForceField::default(), &[]);
        // N0 (0) and CA0 (1) are bonded; N0 and C0 (2) are 1-3.
        assert!(!topology.pairs.iter().any(|p| p.atoms == [0, 1] || p.atoms == [0, 2]));
        // N0 and N1 (4) are 1-4.
        let one_four = topology.pairs.iter().find(|p| p.atoms == [0, 4]).unwrap();
        assert_eq!(one_four.vdw_scale, 0.5);
        // N0 and CA2 (9) are far apart in the chain.
        let distant = topology.pairs.iter().find(|p| p.atoms == [0, 9]).unwrap();
        assert_eq!(distant.vdw_scale, 1.0);
        assert!((distant.charge1 + 0.4157).abs() < 1e-12);
    }

    #[test]
    fn build_maps_contact_restraints_to_ca_atoms() {
        let restraint = ContactRestraint {
            residue_a: 0,
            residue_b: 2,
            upper_bound: 6.0,
            force_constant: 5.0,
        };
        let missing = ContactRestraint {
            residue_b: 7,
            ..restraint
        };
        let topology =
            EnergyTopology::build(&tripeptide(), &ForceField::default(), &[restraint, missing]);
        assert_eq!(topology.restraints.len(), 1);
        assert_eq!(topology.restraints[0].atoms, [1, 9]);
    }

    #[test]
    fn contact_restraint_deserializes_with_default_force_constant() {
        let restraint: ContactRestraint =
            toml::from_str("residue-a = 1\nresidue-b = 9\nupper-bound = 8.0").unwrap();
        assert_eq!(restraint.force_constant, 10.0);
    }
}
