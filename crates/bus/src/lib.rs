//! Transport between the app runtime and the privileged side.
//!
//! The primary transport is a pair of typed mpsc channels: FIFO, reliable,
//! unbounded. A slow receiver accumulates a deeper queue; it never blocks the
//! sender. The optional `shared-buffer` feature adds a fixed-size atomic
//! frame with an explicit ready/empty handshake for the experimental
//! shared-memory mode.

use std::sync::mpsc::{Receiver, Sender, channel};

use proto::{ToHost, ToWorker};

#[cfg(feature = "shared-buffer")]
pub mod shared;

#[cfg(feature = "shared-buffer")]
pub use crate::shared::{FrameError, SharedFrame};

/// Endpoint held by the privileged side.
pub struct HostBus {
    pub tx: Sender<ToWorker>,
    pub rx: Receiver<ToHost>,
}

/// Endpoint held by the app runtime.
pub struct WorkerBus {
    pub tx: Sender<ToHost>,
    pub rx: Receiver<ToWorker>,
}

/// Creates a connected endpoint pair.
pub fn pair() -> (HostBus, WorkerBus) {
    let (to_worker_tx, to_worker_rx) = channel();
    let (to_host_tx, to_host_rx) = channel();
    (
        HostBus {
            tx: to_worker_tx,
            rx: to_host_rx,
        },
        WorkerBus {
            tx: to_host_tx,
            rx: to_worker_rx,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proto::Millis;

    #[test]
    fn messages_arrive_in_send_order() {
        let (host, worker) = pair();
        host.tx
            .send(ToWorker::Init {
                location: "/".to_string(),
                shared_buffer: false,
            })
            .unwrap();
        worker
            .tx
            .send(ToHost::InitRender {
                timestamp: Millis(1.0),
            })
            .unwrap();
        worker
            .tx
            .send(ToHost::DomUpdate {
                timestamp: Millis(2.0),
            })
            .unwrap();

        assert!(matches!(worker.rx.recv().unwrap(), ToWorker::Init { .. }));
        assert!(matches!(host.rx.recv().unwrap(), ToHost::InitRender { .. }));
        assert!(matches!(host.rx.recv().unwrap(), ToHost::DomUpdate { .. }));
    }
}
