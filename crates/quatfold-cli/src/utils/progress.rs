use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use quatfold::engine::progress::{Progress, ProgressCallback};
use std::fmt::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

const SPINNER_TICK_MS: u64 = 80;

/// Counts accumulated over a prediction run, shown next to the current phase.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct RunTally {
    phase: &'static str,
    sampled: usize,
    rejected: usize,
}

impl RunTally {
    fn status(&self) -> String {
        let mut counts = Vec::new();
        if self.sampled > 0 {
            counts.push(format!("{} sampled", self.sampled));
        }
        if self.rejected > 0 {
            counts.push(format!("{} rejected", self.rejected));
        }
        if counts.is_empty() {
            self.phase.to_string()
        } else {
            format!("{} · {}", self.phase, counts.join(", "))
        }
    }
}

struct ProgressDisplay {
    bar: ProgressBar,
    tally: RunTally,
}

impl ProgressDisplay {
    fn apply(&mut self, event: Progress) {
        let bar = &self.bar;
        match event {
            Progress::PhaseStart { name } => {
                self.tally.phase = name;
                bar.reset();
                bar.set_length(0);
                bar.set_style(spinner_style());
                bar.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                bar.set_message(self.tally.status());
            }
            Progress::PhaseFinish => {
                bar.disable_steady_tick();
                bar.finish_with_message(format!("✓ {}", self.tally.status()));
            }
            Progress::TaskStart { total_steps } => {
                bar.disable_steady_tick();
                bar.reset();
                bar.set_length(total_steps);
                bar.set_style(bar_style());
            }
            Progress::TaskIncrement => bar.inc(1),
            Progress::TaskFinish => {
                let length = bar.length().unwrap_or(0);
                bar.set_position(bar.position().max(length));
                bar.finish();
            }
            Progress::SamplerFinished { sampler, produced } => {
                self.tally.sampled += produced;
                debug!(%sampler, produced, "Sampler finished.");
                bar.set_message(self.tally.status());
            }
            Progress::CandidateRejected { index, reason } => {
                self.tally.rejected += 1;
                debug!(index, %reason, "Candidate rejected.");
                bar.set_message(self.tally.status());
            }
            Progress::Message(msg) => bar.println(format!("  {msg}")),
        }
    }
}

/// Renders pipeline progress on one stderr bar, annotated with sampled and rejected counts.
#[derive(Clone)]
pub struct CliProgressHandler {
    display: Arc<Mutex<ProgressDisplay>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::new(0).with_style(spinner_style());
        bar.set_draw_target(target);
        bar.finish_and_clear();

        Self {
            display: Arc::new(Mutex::new(ProgressDisplay {
                bar,
                tally: RunTally::default(),
            })),
        }
    }

    pub fn callback(&self) -> ProgressCallback<'static> {
        let display = self.display.clone();
        Box::new(move |event: Progress| match display.lock() {
            Ok(mut display) => display.apply(event),
            Err(_) => warn!("Progress display mutex was poisoned; dropping event."),
        })
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg:<32} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key("eta", |state: &ProgressState, w: &mut dyn Write| {
            let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
        })
        .progress_chars("##-")
}
