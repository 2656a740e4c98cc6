use super::params::ForceField;
use super::potentials;
use super::term::{EnergyBreakdown, EnergyTerm};
use super::topology::{ContactRestraint, EnergyTopology};
use crate::core::geometry::spatial::{bond_angle, dihedral_angle};
use crate::core::limits::NumericLimits;
use crate::core::models::structure::Structure;
use crate::core::validation::ValidationFailure;
use nalgebra::{Point3, Vector3};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnergyError {
    #[error("Cannot evaluate energy of an invalid structure: {0}")]
    InvalidStructure(ValidationFailure),
}

/// Non-bonded interaction cutoffs in Å.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cutoffs {
    pub vdw: f64,
    pub electrostatic: f64,
}

impl Default for Cutoffs {
    fn default() -> Self {
        Self {
            vdw: 8.0,
            electrostatic: 12.0,
        }
    }
}

/// Molecular-mechanics energy of a backbone: harmonic bonds and angles, periodic backbone
/// torsions, 12-6 Lennard-Jones and distance-screened Coulomb within cutoffs, and optional
/// contact restraints.
#[derive(Debug, Clone)]
pub struct EnergyModel {
    forcefield: Arc<ForceField>,
    cutoffs: Cutoffs,
    limits: NumericLimits,
    restraints: Vec<ContactRestraint>,
}

impl EnergyModel {
    pub fn new(forcefield: Arc<ForceField>, cutoffs: Cutoffs, limits: NumericLimits) -> Self {
        Self {
            forcefield,
            cutoffs,
            limits,
            restraints: Vec::new(),
        }
    }

    pub fn with_restraints(mut self, restraints: Vec<ContactRestraint>) -> Self {
        self.restraints = restraints;
        self
    }

    pub fn limits(&self) -> &NumericLimits {
        &self.limits
    }

    pub fn forcefield(&self) -> &ForceField {
        &self.forcefield
    }

    pub fn evaluate(&self, structure: &Structure) -> Result<EnergyBreakdown, EnergyError> {
        let prepared = self.prepare(structure)?;
        Ok(prepared.breakdown(&structure.positions()))
    }

    /// Like [`evaluate`](Self::evaluate), substituting the sentinel for invalid structures.
    pub fn evaluate_or_sentinel(&self, structure: &Structure) -> EnergyBreakdown {
        self.evaluate(structure)
            .unwrap_or_else(|_| EnergyBreakdown::sentinel(&self.limits))
    }

    /// Builds the term lists of `structure` once, for repeated evaluation at new coordinates.
    pub fn prepare(&self, structure: &Structure) -> Result<PreparedEnergy, EnergyError> {
        if structure.is_empty() {
            return Err(EnergyError::InvalidStructure(ValidationFailure::EmptyStructure));
        }
        if let Some((_, atom)) = structure
            .atoms_iter()
            .find(|(_, atom)| !atom.position.coords.iter().all(|v| v.is_finite()))
        {
            return Err(EnergyError::InvalidStructure(
                ValidationFailure::NonFiniteCoordinate {
                    residue_index: atom.residue_index,
                    atom_name: atom.name.clone(),
                },
            ));
        }
        Ok(PreparedEnergy {
            topology: EnergyTopology::build(structure, &self.forcefield, &self.restraints),
            cutoffs: self.cutoffs,
            limits: self.limits,
            dielectric_slope: self.forcefield.globals.dielectric_slope,
        })
    }
}

/// Energy terms of one structure, evaluated at arbitrary coordinates in the structure's
/// atom order.
#[derive(Debug, Clone)]
pub struct PreparedEnergy {
    topology: EnergyTopology,
    cutoffs: Cutoffs,
    limits: NumericLimits,
    dielectric_slope: f64,
}

impl PreparedEnergy {
    pub fn atom_count(&self) -> usize {
        self.topology.atom_count
    }

    pub fn limits(&self) -> &NumericLimits {
        &self.limits
    }

    pub fn breakdown(&self, positions: &[Point3<f64>]) -> EnergyBreakdown {
        EnergyBreakdown::from_raw(self.raw_energy(positions), &self.limits)
    }

    /// Uncapped energy components.
    pub fn raw_energy(&self, positions: &[Point3<f64>]) -> EnergyTerm {
        self.accumulate(positions, None)
    }

    /// Uncapped energy components and the Cartesian gradient of their sum.
    pub fn energy_and_gradient(
        &self,
        positions: &[Point3<f64>],
    ) -> (EnergyTerm, Vec<Vector3<f64>>) {
        let mut gradient = vec![Vector3::zeros(); positions.len()];
        let energy = self.accumulate(positions, Some(&mut gradient));
        (energy, gradient)
    }

    fn accumulate(
        &self,
        positions: &[Point3<f64>],
        mut gradient: Option<&mut Vec<Vector3<f64>>>,
    ) -> EnergyTerm {
        let mut energy = EnergyTerm::default();
        let t = &self.topology;

        for bond in &t.bonds {
            let [i, j] = bond.atoms;
            let delta = positions[i] - positions[j];
            let dist = delta.norm();
            energy.bond += potentials::harmonic(dist, bond.r0, bond.k);
            if let Some(g) = gradient.as_deref_mut() {
                let de_dr = potentials::harmonic_derivative(dist, bond.r0, bond.k);
                add_pair_gradient(g, i, j, &delta, dist, de_dr);
            }
        }

        for angle in &t.angles {
            let [i, j, k] = angle.atoms;
            let theta = bond_angle(&positions[i], &positions[j], &positions[k]);
            energy.angle += potentials::harmonic(theta, angle.theta0, angle.k);
            if let Some(g) = gradient.as_deref_mut() {
                let de_dtheta = potentials::harmonic_derivative(theta, angle.theta0, angle.k);
                if let Some([gi, gj, gk]) =
                    angle_gradient(&positions[i], &positions[j], &positions[k])
                {
                    g[i] += gi * de_dtheta;
                    g[j] += gj * de_dtheta;
                    g[k] += gk * de_dtheta;
                }
            }
        }

        for dihedral in &t.dihedrals {
            let [i, j, k, l] = dihedral.atoms;
            let phi = dihedral_angle(&positions[i], &positions[j], &positions[k], &positions[l]);
            let mut de_dphi = 0.0;
            for term in &dihedral.terms {
                energy.dihedral +=
                    potentials::periodic_torsion(phi, term.barrier, term.periodicity, term.phase);
                de_dphi += potentials::periodic_torsion_derivative(
                    phi,
                    term.barrier,
                    term.periodicity,
                    term.phase,
                );
            }
            if let Some(g) = gradient.as_deref_mut() {
                if let Some([gi, gj, gk, gl]) =
                    dihedral_gradient(&positions[i], &positions[j], &positions[k], &positions[l])
                {
                    g[i] += gi * de_dphi;
                    g[j] += gj * de_dphi;
                    g[k] += gk * de_dphi;
                    g[l] += gl * de_dphi;
                }
            }
        }

        for pair in &t.pairs {
            let [i, j] = pair.atoms;
            let delta = positions[i] - positions[j];
            let dist = delta.norm();
            let mut de_dr = 0.0;
            if dist <= self.cutoffs.vdw {
                energy.vdw += pair.vdw_scale
                    * potentials::lennard_jones_12_6(dist, pair.r_min, pair.well_depth);
                de_dr += pair.vdw_scale
                    * potentials::lennard_jones_12_6_derivative(dist, pair.r_min, pair.well_depth);
            }
            if dist <= self.cutoffs.electrostatic && pair.charge1 != 0.0 && pair.charge2 != 0.0 {
                energy.electrostatic += pair.elec_scale
                    * potentials::screened_coulomb(
                        dist,
                        pair.charge1,
                        pair.charge2,
                        self.dielectric_slope,
                    );
                de_dr += pair.elec_scale
                    * potentials::screened_coulomb_derivative(
                        dist,
                        pair.charge1,
                        pair.charge2,
                        self.dielectric_slope,
                    );
            }
            if let Some(g) = gradient.as_deref_mut() {
                add_pair_gradient(g, i, j, &delta, dist, de_dr);
            }
        }

        for restraint in &t.restraints {
            let [i, j] = restraint.atoms;
            let delta = positions[i] - positions[j];
            let dist = delta.norm();
            energy.restraint +=
                potentials::flat_bottom_upper(dist, restraint.upper_bound, restraint.k);
            if let Some(g) = gradient.as_deref_mut() {
                let de_dr = potentials::flat_bottom_upper_derivative(
                    dist,
                    restraint.upper_bound,
                    restraint.k,
                );
                add_pair_gradient(g, i, j, &delta, dist, de_dr);
            }
        }

        energy
    }
}

#[inline]
fn add_pair_gradient(
    gradient: &mut [Vector3<f64>],
    i: usize,
    j: usize,
    delta: &Vector3<f64>,
    dist: f64,
    de_dr: f64,
) {
    if dist < crate::core::limits::COINCIDENT_DISTANCE || de_dr == 0.0 {
        return;
    }
    let force = delta * (de_dr / dist);
    gradient[i] += force;
    gradient[j] -= force;
}

/// Gradient of the angle A-B-C with respect to the three positions.
fn angle_gradient(
    a: &Point3<f64>,
    b: &Point3<f64>,
    c: &Point3<f64>,
) -> Option<[Vector3<f64>; 3]> {
    let u = a - b;
    let v = c - b;
    let (u_len, v_len) = (u.norm(), v.norm());
    if u_len < 1e-10 || v_len < 1e-10 {
        return None;
    }
    let (u_hat, v_hat) = (u / u_len, v / v_len);
    let cos_theta = u_hat.dot(&v_hat).clamp(-1.0, 1.0);
    let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
    if sin_theta < 1e-8 {
        return None;
    }
    let ga = -(v_hat - u_hat * cos_theta) / (u_len * sin_theta);
    let gc = -(u_hat - v_hat * cos_theta) / (v_len * sin_theta);
    Some([ga, -(ga + gc), gc])
}

/// Gradient of the dihedral I-J-K-L (Bekker's formulation).
fn dihedral_gradient(
    i: &Point3<f64>,
    j: &Point3<f64>,
    k: &Point3<f64>,
    l: &Point3<f64>,
) -> Option<[Vector3<f64>; 4]> {
    let r_ij = i - j;
    let r_kj = k - j;
    let r_kl = k - l;
    let m = r_ij.cross(&r_kj);
    let n = r_kj.cross(&r_kl);
    let (m_sq, n_sq, kj_sq) = (m.norm_squared(), n.norm_squared(), r_kj.norm_squared());
    if m_sq < 1e-12 || n_sq < 1e-12 || kj_sq < 1e-12 {
        return None;
    }
    let kj_len = kj_sq.sqrt();
    let gi = m * (kj_len / m_sq);
    let gl = -n * (kj_len / n_sq);
    let p = r_ij.dot(&r_kj) / kj_sq;
    let q = r_kl.dot(&r_kj) / kj_sq;
    let gj = gi * (p - 1.0) - gl * q;
    let gk = gl * (q - 1.0) - gi * p;
    Some([gi, gj, gk, gl])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::ramachandran::RamachandranAngles;
    use crate::core::limits::ENERGY_CAP_KCAL_MOL;
    use crate::core::models::builder::{BackboneBuilder, extended_conformation};
    use crate::core::models::residue::parse_sequence;

    fn model() -> EnergyModel {
        EnergyModel::new(
            Arc::new(ForceField::default()),
            Cutoffs::default(),
            NumericLimits::default(),
        )
    }

    fn build(sequence: &str, angles: &[RamachandranAngles], hydrogens: bool) -> Structure {
        let residues = parse_sequence(sequence).unwrap();
        BackboneBuilder::default()
            .with_hydrogens(hydrogens)
            .build(&residues, angles)
            .unwrap()
            .structure
    }

    fn helix(length: usize) -> Vec<RamachandranAngles> {
        vec![RamachandranAngles::from_degrees(-57.0, -47.0); length]
    }

    #[test]
    fn ideal_extended_backbone_has_finite_uncapped_energy() {
        let structure = build("GAC", &extended_conformation(3), false);
        let energy = model().evaluate(&structure).unwrap();
        assert!(energy.total.is_finite());
        assert!(!energy.capped);
        assert!(!energy.non_finite);
        assert!(energy.bond.abs() < 1e-6);
        assert!(energy.angle.abs() < 1e-6);
        assert_eq!(energy.restraint, 0.0);
    }

    #[test]
    fn near_coincident_atoms_stay_within_the_cap() {
        let mut structure = build("GAGAG", &extended_conformation(5), false);
        let target = structure.atom_position(0, "N").unwrap();
        let id = structure.residue(4).unwrap().backbone().ca.unwrap();
        structure.atom_mut(id).unwrap().position = target + Vector3::new(0.01, 0.0, 0.0);

        let energy = model().evaluate(&structure).unwrap();
        assert!(energy.total.is_finite());
        assert!(energy.total.abs() <= ENERGY_CAP_KCAL_MOL);
        assert!(energy.capped);
        assert!(energy.raw_total > ENERGY_CAP_KCAL_MOL);
    }

    #[test]
    fn evaluate_rejects_invalid_structures() {
        let err = model().evaluate(&Structure::new()).unwrap_err();
        assert_eq!(err, EnergyError::InvalidStructure(ValidationFailure::EmptyStructure));

        let mut structure = build("GA", &extended_conformation(2), false);
        let id = structure.residue(1).unwrap().backbone().c.unwrap();
        structure.atom_mut(id).unwrap().position.z = f64::INFINITY;
        assert!(matches!(
            model().evaluate(&structure),
            Err(EnergyError::InvalidStructure(ValidationFailure::NonFiniteCoordinate { .. }))
        ));
        let sentinel = model().evaluate_or_sentinel(&structure);
        assert!(sentinel.non_finite);
        assert!(sentinel.total.is_finite());
    }

    #[test]
    fn cutoffs_remove_distant_interactions() {
        let structure = build("AAAAAAAA", &extended_conformation(8), false);
        let full = model().evaluate(&structure).unwrap();
        let short = EnergyModel::new(
            Arc::new(ForceField::default()),
            Cutoffs {
                vdw: 0.0,
                electrostatic: 0.0,
            },
            NumericLimits::default(),
        )
        .evaluate(&structure)
        .unwrap();
        assert_eq!(short.vdw, 0.0);
        assert_eq!(short.electrostatic, 0.0);
        assert!(full.electrostatic != 0.0);
        assert_eq!(short.bonded(), full.bonded());
    }

    #[test]
    fn restraints_penalize_only_beyond_the_upper_bound() {
        let structure = build("AAAAAA", &extended_conformation(6), false);
        let loose = model().with_restraints(vec![ContactRestraint {
            residue_a: 0,
            residue_b: 5,
            upper_bound: 100.0,
            force_constant: 10.0,
        }]);
        let tight = model().with_restraints(vec![ContactRestraint {
            residue_a: 0,
            residue_b: 5,
            upper_bound: 5.0,
            force_constant: 10.0,
        }]);
        assert_eq!(loose.evaluate(&structure).unwrap().restraint, 0.0);
        assert!(tight.evaluate(&structure).unwrap().restraint > 0.0);
    }

    #[test]
    fn analytic_gradient_matches_finite_differences() {
        let mut angles = helix(4);
        angles[2] = RamachandranAngles::from_degrees(-100.0, 150.0);
        let mut structure = build("AGSA", &angles, true);
        // Perturb so bonds and angles are off equilibrium.
        let id = structure.residue(1).unwrap().backbone().ca.unwrap();
        structure.atom_mut(id).unwrap().position += Vector3::new(0.05, -0.04, 0.03);

        let prepared = model()
            .with_restraints(vec![ContactRestraint {
                residue_a: 0,
                residue_b: 3,
                upper_bound: 3.0,
                force_constant: 2.0,
            }])
            .prepare(&structure)
            .unwrap();
        let positions = structure.positions();
        let (_, gradient) = prepared.energy_and_gradient(&positions);

        let h = 1e-6;
        for atom in 0..positions.len() {
            for axis in 0..3 {
                let mut plus = positions.clone();
                let mut minus = positions.clone();
                plus[atom][axis] += h;
                minus[atom][axis] -= h;
                let numeric = (prepared.raw_energy(&plus).total()
                    - prepared.raw_energy(&minus).total())
                    / (2.0 * h);
                let analytic = gradient[atom][axis];
                assert!(
                    (numeric - analytic).abs() < 1e-3 * (1.0 + analytic.abs()),
                    "atom {atom} axis {axis}: numeric {numeric} vs analytic {analytic}"
                );
            }
        }
    }
}
