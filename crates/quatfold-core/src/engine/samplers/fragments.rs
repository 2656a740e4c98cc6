use super::{ConformationSampler, SamplingContext};
use crate::core::geometry::ramachandran::{RamachandranAngles, mark_termini, wrap_angle};
use crate::engine::config::FragmentConfig;
use crate::engine::error::EngineError;
use crate::engine::priors::SecondaryStructure;
use crate::engine::state::SamplerKind;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

/// Fragment lengths the library accepts.
pub const FRAGMENT_LENGTHS: [usize; 2] = [3, 9];

/// Score added per residue where a fragment contradicts the secondary-structure prior,
/// in kcal/mol.
const SECONDARY_STRUCTURE_MISMATCH: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FragmentClass {
    Helix,
    Sheet,
    Turn,
    Loop,
}

impl FragmentClass {
    fn contradicts(&self, state: SecondaryStructure) -> bool {
        match self {
            FragmentClass::Helix => state != SecondaryStructure::Helix,
            FragmentClass::Sheet => state != SecondaryStructure::Strand,
            FragmentClass::Turn | FragmentClass::Loop => state != SecondaryStructure::Coil,
        }
    }
}

/// An idealized backbone template.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub name: String,
    pub class: FragmentClass,
    /// (phi, psi) per position, in degrees.
    pub angles: Vec<(f64, f64)>,
}

impl Fragment {
    fn new(name: &str, class: FragmentClass, angles: &[(f64, f64)]) -> Self {
        Self {
            name: name.to_string(),
            class,
            angles: angles.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.angles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.angles.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum FragmentLoadError {
    #[error("CSV parsing error for '{path}': {source}")]
    Csv { path: String, source: csv::Error },
    #[error("Invalid fragment '{name}': {reason}")]
    InvalidFragment { name: String, reason: String },
    #[error("Fragment library '{path}' contains no fragments")]
    Empty { path: String },
}

#[derive(Debug, Deserialize)]
struct FragmentRecord {
    fragment: String,
    class: FragmentClass,
    position: usize,
    phi: f64,
    psi: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FragmentLibrary {
    fragments: Vec<Fragment>,
}

impl FragmentLibrary {
    /// Helix, sheet, turn and loop templates of lengths 3 and 9.
    pub fn built_in() -> Self {
        use FragmentClass::*;
        const HELIX: (f64, f64) = (-63.0, -43.0);
        const SHEET: (f64, f64) = (-120.0, 130.0);
        const PPII: (f64, f64) = (-75.0, 145.0);
        let fragments = vec![
            Fragment::new("helix-3", Helix, &[HELIX; 3]),
            Fragment::new("sheet-3", Sheet, &[SHEET; 3]),
            Fragment::new("turn-i-3", Turn, &[(-60.0, -30.0), (-90.0, 0.0), (-80.0, 170.0)]),
            Fragment::new("turn-ii-3", Turn, &[(-60.0, 120.0), (80.0, 0.0), (-80.0, 170.0)]),
            Fragment::new("loop-3", Loop, &[PPII, (-90.0, 10.0), (-100.0, 150.0)]),
            Fragment::new("helix-9", Helix, &[HELIX; 9]),
            Fragment::new("sheet-9", Sheet, &[SHEET; 9]),
            Fragment::new(
                "hairpin-9",
                Turn,
                &[SHEET, SHEET, SHEET, (-60.0, -30.0), (-90.0, 0.0), SHEET, SHEET, SHEET, SHEET],
            ),
            Fragment::new(
                "loop-9",
                Loop,
                &[
                    PPII,
                    (-70.0, -20.0),
                    (80.0, 10.0),
                    (-100.0, 150.0),
                    PPII,
                    (-65.0, -35.0),
                    (-90.0, 130.0),
                    (-80.0, 150.0),
                    PPII,
                ],
            ),
        ];
        Self { fragments }
    }

    /// Loads a library from CSV with columns `fragment,class,position,phi,psi`.
    ///
    /// Rows of one fragment may appear in any order but must cover positions `0..n` once,
    /// where `n` is 3 or 9. Angles are in degrees.
    pub fn load(path: &Path) -> Result<Self, FragmentLoadError> {
        let path_str = || path.to_string_lossy().to_string();
        let mut reader = csv::Reader::from_path(path).map_err(|e| FragmentLoadError::Csv {
            path: path_str(),
            source: e,
        })?;

        let mut order: Vec<String> = Vec::new();
        let mut grouped: HashMap<String, (FragmentClass, Vec<FragmentRecord>)> = HashMap::new();
        for result in reader.deserialize::<FragmentRecord>() {
            let record = result.map_err(|e| FragmentLoadError::Csv {
                path: path_str(),
                source: e,
            })?;
            match grouped.get_mut(&record.fragment) {
                Some((class, records)) => {
                    if *class != record.class {
                        return Err(FragmentLoadError::InvalidFragment {
                            name: record.fragment,
                            reason: "rows disagree on the fragment class".to_string(),
                        });
                    }
                    records.push(record);
                }
                None => {
                    order.push(record.fragment.clone());
                    grouped.insert(record.fragment.clone(), (record.class, vec![record]));
                }
            }
        }

        let mut fragments = Vec::with_capacity(order.len());
        for name in order {
            let Some((class, mut records)) = grouped.remove(&name) else {
                continue;
            };
            records.sort_by_key(|r| r.position);
            let contiguous = records.iter().enumerate().all(|(i, r)| r.position == i);
            if !contiguous {
                return Err(FragmentLoadError::InvalidFragment {
                    name,
                    reason: "positions must cover 0..n exactly once".to_string(),
                });
            }
            if !FRAGMENT_LENGTHS.contains(&records.len()) {
                return Err(FragmentLoadError::InvalidFragment {
                    name,
                    reason: format!("length {} is not one of {:?}", records.len(), FRAGMENT_LENGTHS),
                });
            }
            if records.iter().any(|r| !r.phi.is_finite() || !r.psi.is_finite()) {
                return Err(FragmentLoadError::InvalidFragment {
                    name,
                    reason: "angles must be finite".to_string(),
                });
            }
            let angles = records.iter().map(|r| (r.phi, r.psi)).collect();
            fragments.push(Fragment {
                name,
                class,
                angles,
            });
        }

        if fragments.is_empty() {
            return Err(FragmentLoadError::Empty { path: path_str() });
        }
        debug!(path = %path.display(), count = fragments.len(), "Loaded fragment library.");
        Ok(Self { fragments })
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn of_length(&self, length: usize) -> impl Iterator<Item = &Fragment> {
        self.fragments.iter().filter(move |f| f.len() == length)
    }

    /// Distinct fragment lengths that fit a chain of `chain_length`, longest first.
    pub fn lengths_fitting(&self, chain_length: usize) -> Vec<usize> {
        let mut lengths: Vec<usize> = self
            .fragments
            .iter()
            .map(Fragment::len)
            .filter(|&l| l > 0 && l <= chain_length)
            .collect();
        lengths.sort_unstable_by(|a, b| b.cmp(a));
        lengths.dedup();
        lengths
    }
}

/// Window start positions for fragments of `size` over a chain of `length`, always ending
/// with the window flush against the C terminus.
fn window_starts(length: usize, size: usize) -> Vec<usize> {
    if size == 0 || size > length {
        return Vec::new();
    }
    let last = length - size;
    let stride = (size / 3).max(1);
    let mut starts: Vec<usize> = (0..=last).step_by(stride).collect();
    if starts.last() != Some(&last) {
        starts.push(last);
    }
    starts
}

/// Assembles chains by sliding windows of fragment templates along the sequence.
///
/// At every window each template of the chosen length is perturbed with seeded noise,
/// inserted, and scored by the energy of the rebuilt chain plus the optional heuristic and
/// a penalty for contradicting the secondary-structure prior. The best insertion is kept
/// before moving on. Samples alternate between the available fragment lengths.
#[derive(Debug, Clone)]
pub struct FragmentSampler {
    library: Arc<FragmentLibrary>,
    perturbation_degrees: f64,
}

impl FragmentSampler {
    pub fn new(library: Arc<FragmentLibrary>, config: &FragmentConfig) -> Self {
        Self {
            library,
            perturbation_degrees: config.perturbation_degrees,
        }
    }

    fn noisy(&self, degrees: f64, rng: &mut ChaCha8Rng) -> f64 {
        let noise: f64 = rng.sample(StandardNormal);
        wrap_angle((degrees + self.perturbation_degrees * noise).to_radians())
    }

    fn prior_penalty(&self, context: &SamplingContext<'_>, fragment: &Fragment, start: usize) -> f64 {
        (0..fragment.len())
            .filter_map(|k| context.priors.state_at(start + k))
            .filter(|&state| fragment.class.contradicts(state))
            .count() as f64
            * SECONDARY_STRUCTURE_MISMATCH
    }

    fn assemble(
        &self,
        context: &SamplingContext<'_>,
        size: usize,
        rng: &mut ChaCha8Rng,
    ) -> Result<Vec<RamachandranAngles>, EngineError> {
        let length = context.sequence.len();
        let mut angles = context.priors.reference_angles(length);
        let (_, prepared) = context.prepare(&angles)?;

        for start in window_starts(length, size) {
            let mut best: Option<(f64, Vec<RamachandranAngles>)> = None;
            for fragment in self.library.of_length(size) {
                let mut trial = angles.clone();
                for (k, &(phi, psi)) in fragment.angles.iter().enumerate() {
                    let phi = self.noisy(phi, rng);
                    let psi = self.noisy(psi, rng);
                    trial[start + k] = RamachandranAngles::with_omega(phi, psi, trial[start + k].omega);
                }
                let (_, score) = context.score(&prepared, &trial)?;
                let score = score + self.prior_penalty(context, fragment, start);
                if best.as_ref().is_none_or(|(best_score, _)| score < *best_score) {
                    best = Some((score, trial));
                }
            }
            if let Some((_, trial)) = best {
                angles = trial;
            }
        }

        mark_termini(&mut angles);
        Ok(angles)
    }
}

impl ConformationSampler for FragmentSampler {
    fn kind(&self) -> SamplerKind {
        SamplerKind::Fragment
    }

    #[instrument(level = "debug", skip_all, fields(count))]
    fn sample(
        &self,
        context: &SamplingContext<'_>,
        count: usize,
        rng: &mut ChaCha8Rng,
    ) -> Result<Vec<Vec<RamachandranAngles>>, EngineError> {
        let length = context.sequence.len();
        if length == 0 {
            return Ok(Vec::new());
        }
        let lengths = self.library.lengths_fitting(length);
        if lengths.is_empty() {
            debug!(length, "No fragment fits the chain; using the prior reference.");
        }

        let mut sets = Vec::with_capacity(count);
        for s in 0..count {
            if context.cancel.is_cancelled() {
                break;
            }
            let set = match lengths.get(s % lengths.len().max(1)) {
                Some(&size) => self.assemble(context, size, rng)?,
                None => context.priors.reference_angles(length),
            };
            sets.push(set);
        }
        Ok(sets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::priors::{PriorConfig, Priors};
    use crate::engine::rng::stream_rng;
    use crate::engine::samplers::tests::{Fixture, bits};
    use std::fs;
    use tempfile::tempdir;

    fn quiet_sampler(library: FragmentLibrary) -> FragmentSampler {
        FragmentSampler::new(
            Arc::new(library),
            &FragmentConfig {
                perturbation_degrees: 0.0,
                ..FragmentConfig::default()
            },
        )
    }

    #[test]
    fn built_in_library_has_both_lengths_for_every_class() {
        let library = FragmentLibrary::built_in();
        for class in [FragmentClass::Helix, FragmentClass::Sheet, FragmentClass::Turn, FragmentClass::Loop] {
            for length in FRAGMENT_LENGTHS {
                assert!(
                    library.of_length(length).any(|f| f.class == class),
                    "{class:?} of length {length}"
                );
            }
        }
        assert_eq!(library.lengths_fitting(5), vec![3]);
        assert_eq!(library.lengths_fitting(20), vec![9, 3]);
        assert!(library.lengths_fitting(2).is_empty());
    }

    #[test]
    fn windows_cover_the_chain_end() {
        assert_eq!(window_starts(5, 3), vec![0, 1, 2]);
        assert_eq!(window_starts(13, 9), vec![0, 3, 4]);
        assert_eq!(window_starts(9, 9), vec![0]);
        assert!(window_starts(2, 3).is_empty());
    }

    #[test]
    fn load_reads_fragments_in_any_row_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fragments.csv");
        fs::write(
            &path,
            "fragment,class,position,phi,psi\n\
             h3,helix,2,-60,-40\n\
             h3,helix,0,-62,-41\n\
             h3,helix,1,-61,-42\n\
             t3,turn,0,-60,-30\n\
             t3,turn,1,-90,0\n\
             t3,turn,2,-80,170\n",
        )
        .unwrap();
        let library = FragmentLibrary::load(&path).unwrap();
        assert_eq!(library.len(), 2);
        assert_eq!(library.fragments()[0].name, "h3");
        assert_eq!(library.fragments()[0].angles[0], (-62.0, -41.0));
        assert_eq!(library.fragments()[1].class, FragmentClass::Turn);
    }

    #[test]
    fn load_rejects_bad_libraries() {
        let dir = tempdir().unwrap();

        let gap = dir.path().join("gap.csv");
        fs::write(&gap, "fragment,class,position,phi,psi\nx,loop,0,1,2\nx,loop,2,1,2\nx,loop,3,1,2\n").unwrap();
        assert!(matches!(FragmentLibrary::load(&gap), Err(FragmentLoadError::InvalidFragment { .. })));

        let short = dir.path().join("short.csv");
        fs::write(&short, "fragment,class,position,phi,psi\nx,loop,0,1,2\nx,loop,1,1,2\n").unwrap();
        assert!(matches!(FragmentLibrary::load(&short), Err(FragmentLoadError::InvalidFragment { .. })));

        let malformed = dir.path().join("malformed.csv");
        fs::write(&malformed, "fragment,class,position,phi,psi\nx,ribbon,0,1,2\n").unwrap();
        assert!(matches!(FragmentLibrary::load(&malformed), Err(FragmentLoadError::Csv { .. })));

        let empty = dir.path().join("empty.csv");
        fs::write(&empty, "fragment,class,position,phi,psi\n").unwrap();
        assert!(matches!(FragmentLibrary::load(&empty), Err(FragmentLoadError::Empty { .. })));

        let missing = dir.path().join("missing.csv");
        assert!(matches!(FragmentLibrary::load(&missing), Err(FragmentLoadError::Csv { .. })));
    }

    #[test]
    fn equal_seeds_give_identical_assemblies() {
        let fixture = Fixture::new("ACDEFGHIKLMN");
        let context = fixture.context();
        let sampler = FragmentSampler::new(Arc::new(FragmentLibrary::built_in()), &FragmentConfig::default());
        let a = sampler.sample(&context, 2, &mut stream_rng(4, 0, 2)).unwrap();
        let b = sampler.sample(&context, 2, &mut stream_rng(4, 0, 2)).unwrap();
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn single_template_library_is_inserted_everywhere() {
        let library = FragmentLibrary {
            fragments: vec![Fragment::new("helix-3", FragmentClass::Helix, &[(-63.0, -43.0); 3])],
        };
        let fixture = Fixture::new("AAAAAA");
        let sets = quiet_sampler(library)
            .sample(&fixture.context(), 1, &mut stream_rng(0, 0, 2))
            .unwrap();
        for angles in &sets[0][1..5] {
            assert!((angles.phi_degrees() + 63.0).abs() < 1e-9);
            assert!((angles.psi_degrees() + 43.0).abs() < 1e-9);
        }
    }

    #[test]
    fn prior_penalty_steers_the_choice() {
        let library = FragmentLibrary {
            fragments: vec![
                Fragment::new("helix-3", FragmentClass::Helix, &[(-63.0, -43.0); 3]),
                Fragment::new("sheet-3", FragmentClass::Sheet, &[(-120.0, 130.0); 3]),
            ],
        };
        let mut fixture = Fixture::new("AAA");
        fixture.priors = Priors::resolve(
            &fixture.sequence,
            &PriorConfig {
                secondary_structure: Some("EEE".to_string()),
                ..PriorConfig::default()
            },
        )
        .unwrap();
        let sampler = quiet_sampler(library);
        let context = fixture.context();
        let helix_penalty = sampler.prior_penalty(&context, &sampler.library.fragments()[0], 0);
        let sheet_penalty = sampler.prior_penalty(&context, &sampler.library.fragments()[1], 0);
        assert_eq!(helix_penalty, 3.0 * SECONDARY_STRUCTURE_MISMATCH);
        assert_eq!(sheet_penalty, 0.0);
    }

    #[test]
    fn chains_shorter_than_any_fragment_fall_back_to_the_reference() {
        let fixture = Fixture::new("GA");
        let sampler = FragmentSampler::new(Arc::new(FragmentLibrary::built_in()), &FragmentConfig::default());
        let sets = sampler.sample(&fixture.context(), 2, &mut stream_rng(0, 0, 2)).unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(bits(&sets[..1]), bits(&[fixture.priors.reference_angles(2)]));
    }
}
