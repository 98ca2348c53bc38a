//! Per-session glue on the privileged side.
//!
//! Routes incoming messages, owns the registry/queue/gate lifetimes, and
//! exposes `drain` for the embedder's frame or idle callbacks. A
//! protocol-consistency failure poisons the session: nothing further is
//! applied, every later call reports the failure.

use std::fmt;
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use core_types::Viewport;
use proto::{Millis, ToHost, ToWorker};

use crate::apply::ReplayError;
use crate::bindings::StageBindings;
use crate::events::{EventCapture, StageEvent};
use crate::hydrate::{HydrationError, hydrate_batch};
use crate::schedule::{DrainBudget, DrainReport, FlushWaker, GestureGate, MutationQueue};
use crate::stage::{Stage, StageKey};

#[derive(Debug)]
pub enum SessionError {
    Replay(ReplayError),
    Hydration(HydrationError),
    /// A shared-frame payload failed to decode.
    Decode(proto::CodecError),
    /// The session already failed; no further work is accepted.
    Poisoned,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Replay(err) => write!(f, "replay failed: {err}"),
            SessionError::Hydration(err) => write!(f, "hydration failed: {err}"),
            SessionError::Decode(err) => write!(f, "shared payload decode failed: {err}"),
            SessionError::Poisoned => write!(f, "session previously failed"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Navigation intent surfaced by the worker's history shim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Navigation {
    pub replace: bool,
    pub url: String,
}

pub struct SessionConfig {
    /// Gesture-gated admission window; `None` admits unconditionally.
    pub gesture_window: Option<Duration>,
    /// Viewport used for the offscreen-skip policy; `None` disables it.
    pub viewport: Option<Viewport>,
    /// Pre-rendered root to hydrate the first snapshot against. Without one,
    /// the first snapshot replays like any other batch.
    pub prerendered_root: Option<StageKey>,
    /// Delay of the redundant timer wake when a drain pass runs out of
    /// budget with work left.
    pub wake_fallback: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            gesture_window: None,
            viewport: None,
            prerendered_root: None,
            wake_fallback: Duration::from_millis(100),
        }
    }
}

struct SessionClock {
    origin: Instant,
}

impl SessionClock {
    fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    fn now(&self) -> Millis {
        Millis(self.origin.elapsed().as_secs_f64() * 1000.0)
    }
}

pub struct StageSession<S: Stage> {
    stage: S,
    bindings: StageBindings,
    queue: MutationQueue,
    gate: GestureGate,
    capture: EventCapture,
    config: SessionConfig,
    clock: SessionClock,
    hydrated: bool,
    failed: bool,
    navigations: Vec<Navigation>,
    #[cfg(feature = "shared-buffer")]
    frame: Option<std::sync::Arc<bus::SharedFrame>>,
}

impl<S: Stage> StageSession<S> {
    pub fn new(stage: S, config: SessionConfig) -> Self {
        Self {
            stage,
            bindings: StageBindings::new(),
            queue: MutationQueue::new(),
            gate: GestureGate::new(config.gesture_window),
            capture: EventCapture::new(),
            config,
            clock: SessionClock::new(),
            hydrated: false,
            failed: false,
            navigations: Vec::new(),
            #[cfg(feature = "shared-buffer")]
            frame: None,
        }
    }

    pub fn stage(&self) -> &S {
        &self.stage
    }

    pub fn stage_mut(&mut self) -> &mut S {
        &mut self.stage
    }

    pub fn bindings(&self) -> &StageBindings {
        &self.bindings
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Backing frame for the experimental shared-memory mode.
    #[cfg(feature = "shared-buffer")]
    pub fn attach_frame(&mut self, frame: std::sync::Arc<bus::SharedFrame>) {
        self.frame = Some(frame);
    }

    /// Routes one worker message. Batches are stamped at receipt with this
    /// side's clock, keeping gesture comparisons in one time domain.
    pub fn on_message(&mut self, message: ToHost) -> Result<(), SessionError> {
        if self.failed {
            return Err(SessionError::Poisoned);
        }
        match message {
            ToHost::Mutate { mutations, .. } => {
                self.queue.enqueue_batch(mutations, self.clock.now());
                Ok(())
            }
            ToHost::Hydrate { mutations, .. } => match self.config.prerendered_root {
                Some(root) if !self.hydrated => {
                    self.hydrated = true;
                    hydrate_batch(&self.stage, &mut self.bindings, root, &mutations).map_err(
                        |err| {
                            self.failed = true;
                            log::error!("hydration halted: {err}");
                            SessionError::Hydration(err)
                        },
                    )
                }
                _ => {
                    // No pre-rendered content to bind against; the snapshot
                    // replays as ordinary mutations.
                    self.queue.enqueue_batch(mutations, self.clock.now());
                    Ok(())
                }
            },
            ToHost::PushState { url, .. } => {
                self.navigations.push(Navigation {
                    replace: false,
                    url,
                });
                Ok(())
            }
            ToHost::ReplaceState { url, .. } => {
                self.navigations.push(Navigation { replace: true, url });
                Ok(())
            }
            ToHost::InitRender { .. } => self.on_shared_signal(true),
            ToHost::DomUpdate { .. } => self.on_shared_signal(false),
        }
    }

    /// Runs one drain pass under `budget`. When the pass runs out of budget
    /// with records left, a follow-up is requested through `waker`, once
    /// directly and once via the redundant timer fallback.
    pub fn drain(
        &mut self,
        budget: &dyn DrainBudget,
        waker: Option<&mut dyn FlushWaker>,
    ) -> Result<DrainReport, SessionError> {
        if self.failed {
            return Err(SessionError::Poisoned);
        }
        let report = self
            .queue
            .drain(
                &mut self.stage,
                &mut self.bindings,
                &self.gate,
                budget,
                self.config.viewport,
            )
            .map_err(|err| {
                self.failed = true;
                SessionError::Replay(err)
            })?;
        if report.exhausted {
            if let Some(waker) = waker {
                waker.wake();
                waker.wake_after(self.config.wake_fallback);
            }
        }
        Ok(report)
    }

    /// Captures a real input event and forwards the resulting descriptors.
    /// Every forwarded event refreshes the gesture clock. Returns how many
    /// descriptors were sent.
    pub fn forward_event(&mut self, event: &StageEvent, tx: &Sender<ToWorker>) -> usize {
        let descriptors = self.capture.capture(event, &self.bindings);
        if descriptors.is_empty() {
            return 0;
        }
        self.gate.note_gesture(self.clock.now());
        let mut sent = 0;
        for descriptor in descriptors {
            if tx.send(ToWorker::Event { event: descriptor }).is_err() {
                log::warn!("event descriptor dropped, worker side is gone");
                break;
            }
            sent += 1;
        }
        sent
    }

    /// Navigation intents accumulated since the last call.
    pub fn take_navigations(&mut self) -> Vec<Navigation> {
        std::mem::take(&mut self.navigations)
    }

    #[cfg(feature = "shared-buffer")]
    fn on_shared_signal(&mut self, initial: bool) -> Result<(), SessionError> {
        use crate::apply::materialize;

        let Some(frame) = self.frame.as_ref() else {
            log::warn!("shared-mode signal without an attached frame, ignoring");
            return Ok(());
        };
        let Some(bytes) = frame.take() else {
            log::debug!("shared-mode signal raced an empty frame");
            return Ok(());
        };
        let skeleton = proto::decode_skeleton(&bytes).map_err(|err| {
            self.failed = true;
            SessionError::Decode(err)
        })?;
        if initial {
            let mount = self.stage.mount();
            for child in &skeleton.child_nodes {
                let key = materialize(&mut self.stage, &mut self.bindings, child)
                    .map_err(|err| {
                        self.failed = true;
                        SessionError::Replay(err)
                    })?;
                self.stage
                    .insert_before(mount, key, None)
                    .map_err(|err| {
                        self.failed = true;
                        SessionError::Replay(ReplayError::Stage(err))
                    })?;
            }
            Ok(())
        } else {
            // TODO: repaint attributes and structure in shared mode; only
            // text content refreshes today.
            self.refresh_text(&skeleton)
        }
    }

    #[cfg(feature = "shared-buffer")]
    fn refresh_text(&mut self, skeleton: &proto::NodeSkeleton) -> Result<(), SessionError> {
        let mount = self.stage.mount();
        if let Some(key) = self.bindings.resolve(&skeleton.id, mount) {
            if let Some(data) = &skeleton.data {
                self.stage.set_text(key, data).map_err(|err| {
                    self.failed = true;
                    SessionError::Replay(ReplayError::Stage(err))
                })?;
            }
        } else {
            log::debug!("shared refresh skipping unknown node {}", skeleton.id);
            return Ok(());
        }
        for child in &skeleton.child_nodes {
            self.refresh_text(child)?;
        }
        Ok(())
    }

    #[cfg(not(feature = "shared-buffer"))]
    fn on_shared_signal(&mut self, _initial: bool) -> Result<(), SessionError> {
        log::warn!("shared-buffer support not compiled in, ignoring shared-mode signal");
        Ok(())
    }
}
