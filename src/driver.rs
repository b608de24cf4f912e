use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;

use crate::progress::{Phase, ProgressMachine};

/// Where progress samples come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// The embedding operation reports true progress through [`ProgressDriver::report`].
    Manual,
    /// The driver fabricates a plausible-looking schedule for operations that
    /// expose no progress of their own.
    Automatic,
}

#[derive(Debug, Clone, Copy)]
pub struct ProgressOptions {
    pub mode: ProgressMode,
    /// Total fabricated duration of an `Automatic` run, split evenly across
    /// the two stages.
    pub total_duration: Duration,
    /// Number of fabricated ticks per stage in `Automatic` mode.
    pub steps: u32,
    /// How long a finished stage stays visible at 100% before advancing.
    pub settle_delay: Duration,
}

impl Default for ProgressOptions {
    fn default() -> Self {
        Self {
            mode: ProgressMode::Manual,
            total_duration: Duration::from_millis(5000),
            steps: 5,
            settle_delay: Duration::from_millis(1000),
        }
    }
}

pub type ClickFn = Box<dyn Fn() + Send + Sync>;
pub type CompleteFn = Box<dyn Fn() + Send + Sync>;
pub type ErrorFn = Box<dyn Fn(&str) + Send + Sync>;

/// Hooks the embedding layer attaches to a driver.
///
/// `on_complete` fires exactly once per run, after the second stage settles.
/// `on_error` is a relay only; errors never mutate the machine.
#[derive(Default)]
pub struct DriverCallbacks {
    pub on_click: Option<ClickFn>,
    pub on_complete: Option<CompleteFn>,
    pub on_error: Option<ErrorFn>,
}

/// Source of randomness for the synthetic schedule.
///
/// Kept behind a trait so tests can seed it and replay identical schedules.
pub trait Jitter: Send {
    /// Uniform value in `[0, 1)`.
    fn next_unit(&mut self) -> f64;
}

/// Xorshift64 generator. Small, seedable, good enough for cosmetic jitter.
pub struct XorShiftJitter {
    state: u64,
}

impl XorShiftJitter {
    pub fn seeded(seed: u64) -> Self {
        // Xorshift has a single absorbing state at zero.
        Self { state: seed | 1 }
    }

    pub fn from_clock() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9e37_79b9_7f4a_7c15);
        Self::seeded(seed)
    }
}

impl Jitter for XorShiftJitter {
    fn next_unit(&mut self) -> f64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x >> 11) as f64 / (1u64 << 53) as f64
    }
}

/// One fabricated progress tick: wait `delay`, then show `percent`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticTick {
    pub delay: Duration,
    pub percent: f64,
}

/// Partition `total` into `steps` non-uniform time slices and matching
/// cumulative percentages.
///
/// Delays sum to `total` and percentages climb monotonically to exactly 100.
/// Any accumulated value above 95 snaps to 100 so the bar never hovers just
/// short of done; the last tick is always exactly 100 regardless.
pub fn synthetic_schedule(
    total: Duration,
    steps: u32,
    jitter: &mut dyn Jitter,
) -> Vec<SyntheticTick> {
    let steps = steps.max(1) as usize;
    let time_weights = normalized_weights(steps, jitter);
    let gain_weights = normalized_weights(steps, jitter);

    let mut ticks = Vec::with_capacity(steps);
    let mut acc = 0.0;
    for i in 0..steps {
        acc += 100.0 * gain_weights[i];
        let percent = if i == steps - 1 || acc > 95.0 {
            100.0
        } else {
            acc
        };
        ticks.push(SyntheticTick {
            delay: total.mul_f64(time_weights[i]),
            percent,
        });
    }
    ticks
}

/// Uneven positive weights summing to 1. Raw draws sit in [0.5, 1.5) so no
/// slice degenerates to zero.
fn normalized_weights(steps: usize, jitter: &mut dyn Jitter) -> Vec<f64> {
    let raw: Vec<f64> = (0..steps).map(|_| 0.5 + jitter.next_unit()).collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|w| w / sum).collect()
}

/// Owns a [`ProgressMachine`] and the timers that feed it.
///
/// All deferred work (settle delays, synthetic ticks) runs as tokio tasks whose
/// handles are retained; [`ProgressDriver::teardown`] aborts them so no timer
/// can fire into a machine whose owner is gone. `Drop` does the same.
pub struct ProgressDriver {
    machine: Arc<Mutex<ProgressMachine>>,
    options: ProgressOptions,
    callbacks: Arc<DriverCallbacks>,
    jitter: Mutex<Box<dyn Jitter>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    completed: Arc<AtomicBool>,
}

impl ProgressDriver {
    pub fn new(options: ProgressOptions, callbacks: DriverCallbacks) -> Self {
        Self::with_jitter(options, callbacks, Box::new(XorShiftJitter::from_clock()))
    }

    pub fn with_jitter(
        options: ProgressOptions,
        callbacks: DriverCallbacks,
        jitter: Box<dyn Jitter>,
    ) -> Self {
        Self {
            machine: Arc::new(Mutex::new(ProgressMachine::new())),
            options,
            callbacks: Arc::new(callbacks),
            jitter: Mutex::new(jitter),
            tasks: Mutex::new(Vec::new()),
            completed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared handle to the machine, for the rendering layer to poll.
    pub fn machine(&self) -> Arc<Mutex<ProgressMachine>> {
        Arc::clone(&self.machine)
    }

    pub fn phase(&self) -> Phase {
        self.machine.lock().unwrap().phase()
    }

    /// Handle a click on the control. Ignored unless the machine is idle.
    ///
    /// Fires `on_click`, starts the first stage, and in `Automatic` mode
    /// schedules the fabricated ticks for both stages plus the settle delays
    /// between them.
    pub fn activate(&self) {
        if !self.machine.lock().unwrap().is_interactive() {
            return;
        }
        if let Some(cb) = &self.callbacks.on_click {
            cb();
        }
        self.completed.store(false, Ordering::SeqCst);
        self.machine.lock().unwrap().start();

        if self.options.mode != ProgressMode::Automatic {
            return;
        }
        // The configured total covers the whole fabricated run, so each stage
        // gets half of it.
        let stage_duration = self.options.total_duration / 2;
        let (download, extract) = {
            let mut jitter = self.jitter.lock().unwrap();
            (
                synthetic_schedule(stage_duration, self.options.steps, jitter.as_mut()),
                synthetic_schedule(stage_duration, self.options.steps, jitter.as_mut()),
            )
        };
        let machine = Arc::clone(&self.machine);
        let callbacks = Arc::clone(&self.callbacks);
        let completed = Arc::clone(&self.completed);
        let settle = self.options.settle_delay;
        let handle = tokio::spawn(async move {
            for tick in download {
                tokio::time::sleep(tick.delay).await;
                machine.lock().unwrap().report_progress(tick.percent);
            }
            tokio::time::sleep(settle).await;
            machine.lock().unwrap().advance();
            for tick in extract {
                tokio::time::sleep(tick.delay).await;
                machine.lock().unwrap().report_progress(tick.percent);
            }
            tokio::time::sleep(settle).await;
            machine.lock().unwrap().advance();
            if !completed.swap(true, Ordering::SeqCst) {
                if let Some(cb) = &callbacks.on_complete {
                    cb();
                }
            }
        });
        self.tasks.lock().unwrap().push(handle);
    }

    /// Feed a true progress sample (`Manual` mode), clamped to `[0, 100]`.
    ///
    /// Clamping lives here rather than in the machine: out-of-range values are
    /// a transport artifact, not a state-machine concern.
    pub fn report(&self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.machine
            .lock()
            .unwrap()
            .report_progress(value.clamp(0.0, 100.0));
    }

    /// Signal that the active stage's operation has finished.
    ///
    /// Advances after the settle delay so the full bar stays on screen for a
    /// beat. When the stage that settles is the second one, `on_complete`
    /// fires (once).
    pub fn finish_phase(&self) {
        let machine = Arc::clone(&self.machine);
        let callbacks = Arc::clone(&self.callbacks);
        let completed = Arc::clone(&self.completed);
        let settle = self.options.settle_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(settle).await;
            let was_final_stage = {
                let mut m = machine.lock().unwrap();
                let was = m.phase() == Phase::InExtractProgress;
                m.advance();
                was
            };
            if was_final_stage && !completed.swap(true, Ordering::SeqCst) {
                if let Some(cb) = &callbacks.on_complete {
                    cb();
                }
            }
        });
        self.tasks.lock().unwrap().push(handle);
    }

    /// Relay an operation failure to `on_error`. The machine is untouched;
    /// the caller decides whether to `reset()` afterwards.
    pub fn fail(&self, message: &str) {
        log::warn!("progress operation failed: {}", message);
        if let Some(cb) = &self.callbacks.on_error {
            cb(message);
        }
    }

    pub fn fade_out(&self) {
        self.machine.lock().unwrap().fade_out();
    }

    /// Cancel pending timers and return the machine to idle, ready to re-arm.
    pub fn reset(&self) {
        self.teardown();
        self.completed.store(false, Ordering::SeqCst);
        self.machine.lock().unwrap().reset();
    }

    /// Abort every pending timer. After this returns no deferred callback
    /// scheduled so far can run.
    pub fn teardown(&self) {
        for handle in self.tasks.lock().unwrap().drain(..) {
            handle.abort();
        }
    }
}

impl Drop for ProgressDriver {
    fn drop(&mut self) {
        self.teardown();
    }
}
