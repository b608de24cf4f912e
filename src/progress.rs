use serde::Serialize;

/// Phase of the two-stage progress control.
///
/// Exactly one phase is active at a time. Events with no matching edge are
/// ignored rather than rejected: a stray event must never crash a UI affordance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Idle,
    InDownloadProgress,
    InExtractProgress,
    Success,
    SuccessFadeOut,
}

/// Last-known percentage for each stage, both in `0.0..=100.0`.
///
/// Fields are only written while their phase is active; delivering a sample in
/// the wrong phase is a caller error and is dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressContext {
    pub download_progress: f64,
    pub extract_progress: f64,
}

/// What the rendering layer should show for the current phase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Visual {
    /// Inert clickable trigger (idle icon + label).
    Trigger,
    /// Progress bar for the download stage.
    DownloadBar(f64),
    /// Progress bar for the extract stage.
    ExtractBar(f64),
    /// Persistent success glyph.
    SuccessGlyph,
    /// Success glyph animating out.
    FadingGlyph,
}

/// State machine behind the download-then-extract progress button.
///
/// Pure state container: it holds no reference to the driving operation and
/// performs no timing of its own. Reaching 100% and advancing to the next
/// phase are two separate events, so the settle policy between them lives in
/// the driving layer (see [`crate::driver`]) and can be swapped or tested
/// independently of the transition table.
///
/// There is no error phase. Failures of the underlying operation are the
/// caller's to surface; they never mutate the machine.
#[derive(Debug)]
pub struct ProgressMachine {
    phase: Phase,
    context: ProgressContext,
}

impl Default for ProgressMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressMachine {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            context: ProgressContext::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn context(&self) -> ProgressContext {
        self.context
    }

    /// Begin the first stage. Only valid from `Idle`; ignored elsewhere.
    ///
    /// Context is preserved, not reset: clearing stale percentages is
    /// `reset()`'s job, and folding it in here would make a re-armed control
    /// flicker to zero before its first real sample arrives.
    pub fn start(&mut self) {
        if self.phase == Phase::Idle {
            self.phase = Phase::InDownloadProgress;
            log::debug!("progress: idle -> download");
        }
    }

    /// Record a progress sample for the active stage.
    ///
    /// The machine does not clamp; the driving layer is expected to deliver
    /// values in `0.0..=100.0`. No phase change ever results from this call.
    pub fn report_progress(&mut self, value: f64) {
        match self.phase {
            Phase::InDownloadProgress => self.context.download_progress = value,
            Phase::InExtractProgress => self.context.extract_progress = value,
            _ => {}
        }
    }

    /// Move to the next stage: download -> extract -> success.
    ///
    /// Typically called by the driver after it observed 100% and its settle
    /// delay elapsed. No-op from `Idle`, `Success` and `SuccessFadeOut`.
    pub fn advance(&mut self) {
        match self.phase {
            Phase::InDownloadProgress => {
                self.phase = Phase::InExtractProgress;
                log::debug!("progress: download -> extract");
            }
            Phase::InExtractProgress => {
                self.phase = Phase::Success;
                log::debug!("progress: extract -> success");
            }
            _ => {}
        }
    }

    /// Begin the terminal visual decay. Only valid from `Success`.
    ///
    /// There is no automatic timer for this; whoever owns the control decides
    /// when the success glyph starts fading.
    pub fn fade_out(&mut self) {
        if self.phase == Phase::Success {
            self.phase = Phase::SuccessFadeOut;
        }
    }

    /// Return to `Idle` with both percentages zeroed. Valid from any phase,
    /// so a control can be reused without remounting.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.context = ProgressContext::default();
    }

    /// Fixed phase-to-visual mapping for the rendering layer.
    pub fn visual(&self) -> Visual {
        match self.phase {
            Phase::Idle => Visual::Trigger,
            Phase::InDownloadProgress => Visual::DownloadBar(self.context.download_progress),
            Phase::InExtractProgress => Visual::ExtractBar(self.context.extract_progress),
            Phase::Success => Visual::SuccessGlyph,
            Phase::SuccessFadeOut => Visual::FadingGlyph,
        }
    }

    /// Whether the control should accept clicks. Only the idle trigger does;
    /// in-progress and terminal displays are click-through disabled.
    pub fn is_interactive(&self) -> bool {
        self.phase == Phase::Idle
    }
}
