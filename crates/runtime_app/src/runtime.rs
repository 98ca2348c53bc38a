//! The app runtime thread.
//!
//! One spawned thread per session, looping on the transport receiver. The
//! `init` message builds the sandbox scope and mounts the app; every turn
//! ends by flushing pending capture records: the first flush as `hydrate`,
//! the rest as `mutate`.

use std::sync::mpsc::RecvTimeoutError;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bus::WorkerBus;
use core_types::SessionId;
use dom::ObserverId;
use proto::{ToHost, ToWorker};

use crate::events::redispatch;
use crate::registry::NodeIds;
use crate::sanitize::sanitize_batch;
use crate::scope::WorkerScope;

/// Application entry point. Mount runs once, after the scope is scrubbed;
/// everything afterwards happens through event handlers the app registered.
pub trait WorkerApp: Send {
    fn mount(&mut self, scope: &mut WorkerScope);
}

impl<F> WorkerApp for F
where
    F: FnMut(&mut WorkerScope) + Send,
{
    fn mount(&mut self, scope: &mut WorkerScope) {
        self(scope)
    }
}

/// Outgoing batch coalescing. `Duration::ZERO` flushes at the end of every
/// turn; a positive tick holds batches back until the tick elapses.
#[derive(Clone, Copy, Debug)]
pub struct EmitPolicy {
    pub tick: Duration,
}

impl Default for EmitPolicy {
    fn default() -> Self {
        Self {
            tick: Duration::ZERO,
        }
    }
}

#[derive(Default)]
pub struct RuntimeOptions {
    pub policy: EmitPolicy,
    /// Host-inherited ambient names present before scrubbing.
    pub ambient: Vec<String>,
    /// Frame backing the experimental shared-memory mode.
    #[cfg(feature = "shared-buffer")]
    pub frame: Option<std::sync::Arc<bus::SharedFrame>>,
}

struct SessionState {
    scope: WorkerScope,
    ids: NodeIds,
    observer: ObserverId,
    hydrated: bool,
    shared: bool,
    dirty: bool,
    announced: bool,
    last_emit: Instant,
}

pub fn start_app_runtime(
    session: SessionId,
    bus: WorkerBus,
    app: impl WorkerApp + 'static,
) -> JoinHandle<()> {
    start_app_runtime_with_options(session, bus, app, RuntimeOptions::default())
}

pub fn start_app_runtime_with_options(
    session: SessionId,
    bus: WorkerBus,
    mut app: impl WorkerApp + 'static,
    options: RuntimeOptions,
) -> JoinHandle<()> {
    thread::spawn(move || run(session, bus, &mut app, &options))
}

fn run(session: SessionId, bus: WorkerBus, app: &mut dyn WorkerApp, options: &RuntimeOptions) {
    log::info!("app runtime {session} started");
    let mut state: Option<SessionState> = None;
    loop {
        let message = if options.policy.tick.is_zero() {
            match bus.rx.recv() {
                Ok(message) => message,
                Err(_) => break,
            }
        } else {
            match bus.rx.recv_timeout(options.policy.tick) {
                Ok(message) => message,
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(state) = state.as_mut() {
                        flush(state, &bus, options, true);
                    }
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        };
        match message {
            ToWorker::Init {
                location,
                shared_buffer,
            } => {
                let mut scope = WorkerScope::new(&location, bus.tx.clone(), &options.ambient);
                let observer = scope.document.observe(scope.document.document(), true);
                let mut fresh = SessionState {
                    scope,
                    ids: NodeIds::new(),
                    observer,
                    hydrated: false,
                    shared: shared_buffer,
                    dirty: false,
                    announced: false,
                    last_emit: Instant::now(),
                };
                app.mount(&mut fresh.scope);
                let slot = state.insert(fresh);
                flush(slot, &bus, options, true);
            }
            ToWorker::Event { event } => {
                let Some(state) = state.as_mut() else {
                    log::warn!("event {:?} before init, ignoring", event.event_type);
                    continue;
                };
                if let Err(err) = redispatch(&mut state.scope.document, &state.ids, &event) {
                    log::warn!("redispatch of {:?} failed: {err}", event.event_type);
                }
                flush(state, &bus, options, options.policy.tick.is_zero());
            }
        }
    }
    log::info!("app runtime {session} shut down");
}

fn flush(state: &mut SessionState, bus: &WorkerBus, options: &RuntimeOptions, force: bool) {
    if !force && state.last_emit.elapsed() < options.policy.tick {
        return;
    }
    if state.shared {
        flush_shared(state, bus, options);
        return;
    }
    let mutations = state.scope.document.take_records(state.observer);
    if mutations.is_empty() {
        return;
    }
    let count = mutations.len();
    let records = sanitize_batch(&state.scope.document, &mut state.ids, mutations);
    if records.is_empty() {
        return;
    }
    let timestamp = state.scope.performance.now();
    let message = if state.hydrated {
        ToHost::Mutate {
            mutations: records,
            timestamp,
        }
    } else {
        state.hydrated = true;
        ToHost::Hydrate {
            mutations: records,
            timestamp,
        }
    };
    log::debug!("flushing {count} captured mutations");
    if bus.tx.send(message).is_err() {
        log::warn!("batch dropped, host side is gone");
    }
    state.last_emit = Instant::now();
}

#[cfg(feature = "shared-buffer")]
fn flush_shared(state: &mut SessionState, bus: &WorkerBus, options: &RuntimeOptions) {
    use crate::sanitize::skeleton;

    if !state.scope.document.has_pending_records() && !state.dirty {
        return;
    }
    // Snapshot mode: individual records are superseded by the full skeleton.
    let _ = state.scope.document.take_records(state.observer);
    state.dirty = true;

    let Some(frame) = options.frame.as_ref() else {
        log::warn!("shared mode requested without a frame, dropping update");
        state.dirty = false;
        return;
    };
    let snapshot = skeleton(&state.scope.document, &mut state.ids, state.scope.document.body());
    let bytes = match proto::encode_skeleton(&snapshot) {
        Ok(bytes) => bytes,
        Err(err) => {
            log::warn!("skeleton encode failed: {err}");
            state.dirty = false;
            return;
        }
    };
    match frame.publish(&bytes) {
        Ok(()) => {
            let timestamp = state.scope.performance.now();
            let message = if state.announced {
                ToHost::DomUpdate { timestamp }
            } else {
                state.announced = true;
                ToHost::InitRender { timestamp }
            };
            if bus.tx.send(message).is_err() {
                log::warn!("shared-mode signal dropped, host side is gone");
            }
            state.dirty = false;
            state.last_emit = Instant::now();
        }
        Err(bus::FrameError::Busy) => {
            // Reader has not acknowledged yet; the dirty flag keeps the
            // snapshot pending for the next flush.
        }
        Err(err) => {
            log::warn!("shared frame publish failed: {err}");
            state.dirty = false;
        }
    }
}

#[cfg(not(feature = "shared-buffer"))]
fn flush_shared(state: &mut SessionState, bus: &WorkerBus, options: &RuntimeOptions) {
    // Shared mode was requested but not compiled in; fall back to messages.
    log::warn!("shared-buffer support not compiled in, using message transport");
    state.shared = false;
    flush(state, bus, options, true);
}
