use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use microstruct::engine::progress::{Progress, ProgressCallback};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 100;

struct DisplayState {
    bar: ProgressBar,
    phases_started: usize,
}

/// Renders engine progress events as a spinner per phase and a bar per counted task.
///
/// Phases are numbered as they start, so a run prints e.g. `[2] Short-Ranged Binning`.
/// With `hidden` set nothing is drawn, but the state is still tracked.
#[derive(Clone)]
pub struct ProgressDisplay {
    state: Arc<Mutex<DisplayState>>,
}

impl ProgressDisplay {
    pub fn new(hidden: bool) -> Self {
        let bar = ProgressBar::new(0).with_style(spinner_style());
        bar.set_draw_target(if hidden {
            ProgressDrawTarget::hidden()
        } else {
            ProgressDrawTarget::stderr()
        });
        bar.finish_and_clear();

        Self {
            state: Arc::new(Mutex::new(DisplayState {
                bar,
                phases_started: 0,
            })),
        }
    }

    pub fn callback(&self) -> ProgressCallback<'static> {
        let state = Arc::clone(&self.state);
        Box::new(move |event: Progress| {
            let Ok(mut state) = state.lock() else {
                warn!("Progress display lock was poisoned; dropping event.");
                return;
            };
            state.apply(event);
        })
    }

    pub fn phases_started(&self) -> usize {
        self.state.lock().map_or(0, |s| s.phases_started)
    }
}

impl DisplayState {
    fn apply(&mut self, event: Progress) {
        match event {
            Progress::PhaseStart { name } => {
                self.phases_started += 1;
                self.bar.reset();
                self.bar.set_length(0);
                self.bar.set_style(spinner_style());
                self.bar
                    .set_message(format!("[{}] {}", self.phases_started, name));
                self.bar
                    .enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
            }
            Progress::TaskStart { total_steps } => {
                self.bar.disable_steady_tick();
                self.bar.set_style(bar_style());
                self.bar.set_length(total_steps);
                self.bar.set_position(0);
            }
            Progress::TaskIncrement => self.bar.inc(1),
            Progress::TaskFinish => {
                if let Some(len) = self.bar.length() {
                    self.bar.set_position(len);
                }
            }
            Progress::PhaseFinish => {
                self.bar.disable_steady_tick();
                let message = format!("{} ✓", self.bar.message());
                self.bar.finish_with_message(message);
            }
            Progress::Message(text) => self.bar.println(format!("  {text}")),
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{msg:<32} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}
