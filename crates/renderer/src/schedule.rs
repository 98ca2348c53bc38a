//! Batching and pacing of incoming records.
//!
//! Two cooperating policies gate application: gesture-windowed admission and
//! deadline-bounded draining with a viewport test for text/attribute work.
//! Deferral is never an error: deferred records stay queued, in order, and
//! retry on a later pass.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use core_types::Viewport;
use proto::{ChangeRecord, Millis, NodeType, RemoteId};

use crate::apply::{ReplayError, apply_record};
use crate::bindings::StageBindings;
use crate::stage::Stage;

/// Admission policy: records apply only within a window after the most
/// recent user gesture. `None` disables the gate.
pub struct GestureGate {
    window: Option<Duration>,
    last_gesture: Millis,
}

impl GestureGate {
    pub fn new(window: Option<Duration>) -> Self {
        Self {
            window,
            last_gesture: Millis(0.0),
        }
    }

    pub fn note_gesture(&mut self, now: Millis) {
        self.last_gesture = now;
    }

    /// Eligible iff `timestamp - last_gesture <= window`. The boundary is
    /// inclusive: a record exactly at the window edge still applies.
    pub fn eligible(&self, timestamp: Millis) -> bool {
        match self.window {
            None => true,
            Some(window) => timestamp.since(self.last_gesture) <= window.as_secs_f64() * 1000.0,
        }
    }
}

/// Yield point: how much of the current pass's time budget remains. The same
/// drain logic runs under a frame callback, an idle callback, a timer, or a
/// test harness.
pub trait DrainBudget {
    /// `None` means unbounded.
    fn remaining(&self) -> Option<Duration>;
}

/// No deadline; drains until the queue empties or defers.
pub struct Unbounded;

impl DrainBudget for Unbounded {
    fn remaining(&self) -> Option<Duration> {
        None
    }
}

/// Wall-clock deadline measured from construction.
pub struct DeadlineBudget {
    deadline: Instant,
}

impl DeadlineBudget {
    pub fn starting_now(budget: Duration) -> Self {
        Self {
            deadline: Instant::now() + budget,
        }
    }
}

impl DrainBudget for DeadlineBudget {
    fn remaining(&self) -> Option<Duration> {
        Some(self.deadline.saturating_duration_since(Instant::now()))
    }
}

/// Continuation scheduling for passes that ran out of budget. `wake` is the
/// primary signal; `wake_after` is the redundant timer fallback for hosts
/// whose primary callback may be throttled or unavailable.
pub trait FlushWaker {
    fn wake(&mut self);
    fn wake_after(&mut self, delay: Duration);
}

#[derive(Clone, Debug)]
struct QueuedRecord {
    record: ChangeRecord,
    timestamp: Millis,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub applied: usize,
    pub deferred_gesture: usize,
    pub deferred_viewport: usize,
    /// Records held back only because an earlier record for the same target
    /// was deferred this pass.
    pub deferred_order: usize,
    pub remaining: usize,
    pub exhausted: bool,
}

/// FIFO queue of stamped records pending application.
///
/// Only one drain pass can run at a time (`drain` takes the queue
/// exclusively), and incoming batches always append to the tail.
pub struct MutationQueue {
    queue: VecDeque<QueuedRecord>,
}

impl MutationQueue {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    pub fn enqueue_batch(&mut self, records: Vec<ChangeRecord>, timestamp: Millis) {
        for record in records {
            self.queue.push_back(QueuedRecord { record, timestamp });
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drains in FIFO order until the queue empties or the budget runs out.
    ///
    /// A record that misses the gesture window or whose text/attribute
    /// target sits outside the viewport is kept, not dropped; once a target
    /// has a deferred record, everything later for that target defers too,
    /// so same-target order survives the pass. Viewport answers are cached
    /// for the duration of one pass.
    ///
    /// A replay error clears the queue, since the batch must not be
    /// partially retried, and surfaces to the caller.
    pub fn drain<S: Stage>(
        &mut self,
        stage: &mut S,
        bindings: &mut StageBindings,
        gate: &GestureGate,
        budget: &dyn DrainBudget,
        viewport: Option<Viewport>,
    ) -> Result<DrainReport, ReplayError> {
        let mut report = DrainReport::default();
        let mut deferred: VecDeque<QueuedRecord> = VecDeque::new();
        let mut stalled: HashSet<RemoteId> = HashSet::new();
        let mut visibility: HashMap<RemoteId, bool> = HashMap::new();

        loop {
            if budget.remaining().is_some_and(|left| left.is_zero()) {
                report.exhausted = !self.queue.is_empty();
                break;
            }
            let Some(item) = self.queue.pop_front() else {
                break;
            };
            let target = item.record.target().clone();

            if stalled.contains(&target) {
                report.deferred_order += 1;
                deferred.push_back(item);
                continue;
            }
            if !gate.eligible(item.timestamp) {
                log::warn!("record for {target} missed the gesture window, queued until next gesture");
                report.deferred_gesture += 1;
                stalled.insert(target);
                deferred.push_back(item);
                continue;
            }
            if let Some(viewport) = viewport {
                if is_viewport_gated(&item.record) {
                    let visible = *visibility.entry(target.clone()).or_insert_with(|| {
                        target_visible(stage, bindings, &target, viewport)
                    });
                    if !visible {
                        log::debug!("record for offscreen {target} deferred");
                        report.deferred_viewport += 1;
                        stalled.insert(target);
                        deferred.push_back(item);
                        continue;
                    }
                }
            }

            match apply_record(stage, bindings, &item.record) {
                Ok(()) => report.applied += 1,
                Err(err) => {
                    log::error!("replay failed, dropping {} queued records: {err}", self.queue.len());
                    self.queue.clear();
                    return Err(err);
                }
            }
        }

        // Deferred records go back to the front, ahead of anything the
        // budget cut off, preserving overall FIFO order.
        while let Some(item) = deferred.pop_back() {
            self.queue.push_front(item);
        }
        report.remaining = self.queue.len();
        Ok(report)
    }
}

impl Default for MutationQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn is_viewport_gated(record: &ChangeRecord) -> bool {
    matches!(
        record,
        ChangeRecord::CharacterData { .. } | ChangeRecord::Attributes { .. }
    )
}

fn target_visible<S: Stage>(
    stage: &S,
    bindings: &StageBindings,
    target: &RemoteId,
    viewport: Viewport,
) -> bool {
    let Some(mut key) = bindings.resolve(target, stage.mount()) else {
        // Unresolvable targets are not a visibility question; let the apply
        // step surface the consistency error.
        return true;
    };
    if stage.node_type(key) == Some(NodeType::Text) {
        match stage.parent(key) {
            Some(parent) => key = parent,
            None => return true,
        }
    }
    match stage.bounding_box(key) {
        Some(rect) => viewport.intersects(&rect),
        None => true,
    }
}
