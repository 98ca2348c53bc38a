//! Experimental shared-memory mode, end to end.
#![cfg(feature = "shared-buffer")]

use std::sync::Arc;
use std::time::Duration;

use bus::SharedFrame;
use proto::{ToHost, ToWorker};
use renderer::{ArenaPage, SessionConfig, Stage, StageSession, Unbounded};
use runtime_app::{RuntimeOptions, WorkerScope, start_app_runtime_with_options};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn full_document_skeleton_crosses_the_frame() {
    let frame = Arc::new(SharedFrame::new(64 * 1024));
    let (host, worker) = bus::pair();
    let options = RuntimeOptions {
        frame: Some(frame.clone()),
        ..RuntimeOptions::default()
    };
    let handle = start_app_runtime_with_options(
        10,
        worker,
        |scope: &mut WorkerScope| {
            let doc = &mut scope.document;
            let banner = doc.create_element("header");
            let text = doc.create_text("shared");
            doc.append_child(banner, text).unwrap();
            doc.append_child(doc.body(), banner).unwrap();
        },
        options,
    );

    host.tx
        .send(ToWorker::Init {
            location: "http://localhost/".to_string(),
            shared_buffer: true,
        })
        .unwrap();

    let signal = host.rx.recv_timeout(RECV_TIMEOUT).unwrap();
    assert!(matches!(signal, ToHost::InitRender { .. }));

    let mut session = StageSession::new(ArenaPage::new(), SessionConfig::default());
    session.attach_frame(frame.clone());
    session.on_message(signal).unwrap();
    session.drain(&Unbounded, None).unwrap();

    let mount = session.stage().mount();
    let children = session.stage().child_nodes(mount);
    assert_eq!(children.len(), 1);
    assert_eq!(session.stage().node_name(children[0]).as_deref(), Some("HEADER"));
    assert_eq!(session.stage().text_content(children[0]), "shared");

    // Frame was acknowledged; the writer can publish again.
    assert!(frame.take().is_none());

    drop(host);
    handle.join().unwrap();
}
