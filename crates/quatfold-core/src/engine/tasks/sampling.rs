use crate::core::geometry::ramachandran::RamachandranAngles;
use crate::engine::context::PredictionContext;
use crate::engine::error::EngineError;
use crate::engine::progress::Progress;
use crate::engine::rng::{SAMPLER_STREAM, stream_rng};
use crate::engine::samplers::ConformationSampler;
use crate::engine::state::{Ensemble, SamplerKind};
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

type SamplerResult = Result<(SamplerKind, Vec<Vec<RamachandranAngles>>), EngineError>;

/// Runs every sampler on its own RNG stream and pools the output in sampler order.
#[instrument(skip_all, name = "sampling_task")]
pub fn run(
    context: &PredictionContext<'_>,
    samplers: &[Box<dyn ConformationSampler>],
) -> Result<Ensemble, EngineError> {
    info!(samplers = samplers.len(), "Sampling conformations.");
    context.reporter.report(Progress::TaskStart {
        total_steps: samplers.len() as u64,
    });

    let sampling = context.sampling();

    #[cfg(not(feature = "parallel"))]
    let iterator = samplers.iter();

    #[cfg(feature = "parallel")]
    let iterator = samplers.par_iter();

    let results: Vec<SamplerResult> = iterator
        .map(|sampler| -> SamplerResult {
            let kind = sampler.kind();
            if context.cancel.is_cancelled() {
                return Ok((kind, Vec::new()));
            }
            let mut rng = stream_rng(context.config.seed, SAMPLER_STREAM, kind.stream_index());
            let count = context.config.sampling.samples(kind);
            let sets = sampler.sample(&sampling, count, &mut rng)?;
            context.reporter.report(Progress::SamplerFinished {
                sampler: kind,
                produced: sets.len(),
            });
            context.reporter.report(Progress::TaskIncrement);
            Ok((kind, sets))
        })
        .collect();

    context.reporter.report(Progress::TaskFinish);

    let mut ensemble = Ensemble::new();
    for result in results {
        let (kind, sets) = result?;
        debug!(sampler = %kind, produced = sets.len(), "Sampler finished.");
        ensemble.extend_from(kind, sets);
    }

    info!(members = ensemble.len(), "Sampling finished.");
    Ok(ensemble)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::progress::ProgressReporter;
    use crate::engine::samplers::create_samplers;
    use crate::engine::samplers::fragments::FragmentLibrary;
    use crate::engine::tasks::tests::{Harness, quick_config};
    use std::sync::{Arc, Mutex};

    fn samplers(harness: &Harness) -> Vec<Box<dyn ConformationSampler>> {
        create_samplers(
            &harness.config.sampling,
            Arc::new(FragmentLibrary::built_in()),
        )
    }

    #[test]
    fn ensemble_is_pooled_in_sampler_order() {
        let harness = Harness::new("MKTAYIAKQR", quick_config());
        let ensemble = run(&harness.context(), &samplers(&harness)).unwrap();

        assert_eq!(ensemble.count_by(SamplerKind::Quaternion), 2);
        assert_eq!(ensemble.count_by(SamplerKind::MonteCarlo), 1);
        assert_eq!(ensemble.count_by(SamplerKind::Fragment), 2);
        assert_eq!(ensemble.count_by(SamplerKind::Basin), 2);

        let methods: Vec<SamplerKind> = ensemble.members().iter().map(|m| m.method).collect();
        let mut sorted = methods.clone();
        sorted.sort();
        assert_eq!(methods, sorted);
        assert!(ensemble.members().iter().all(|m| m.angles.len() == 10));
    }

    #[test]
    fn equal_seeds_give_equal_ensembles() {
        let a = Harness::new("MKTAYIAK", quick_config());
        let b = Harness::new("MKTAYIAK", quick_config());
        let first = run(&a.context(), &samplers(&a)).unwrap();
        let second = run(&b.context(), &samplers(&b)).unwrap();
        let bits = |e: &Ensemble| -> Vec<u64> {
            e.members()
                .iter()
                .flat_map(|m| m.angles.iter().flat_map(|a| [a.phi.to_bits(), a.psi.to_bits()]))
                .collect()
        };
        assert_eq!(bits(&first), bits(&second));
    }

    #[test]
    fn reports_one_event_per_sampler() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let mut harness = Harness::new("MKTAYIAK", quick_config());
        harness.reporter =
            ProgressReporter::with_callback(Box::new(move |event| sink.lock().unwrap().push(event)));
        run(&harness.context(), &samplers(&harness)).unwrap();

        let events = events.lock().unwrap();
        let finished = events
            .iter()
            .filter(|e| matches!(e, Progress::SamplerFinished { .. }))
            .count();
        assert_eq!(finished, 4);
        assert_eq!(events.first(), Some(&Progress::TaskStart { total_steps: 4 }));
        assert_eq!(events.last(), Some(&Progress::TaskFinish));
    }

    #[test]
    fn cancelled_run_yields_an_empty_ensemble() {
        let harness = Harness::new("MKTAYIAK", quick_config());
        harness.cancel.cancel();
        let ensemble = run(&harness.context(), &samplers(&harness)).unwrap();
        assert!(ensemble.is_empty());
    }
}
