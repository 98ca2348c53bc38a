//! Transport message kinds, one enum per direction.
//!
//! The channel is FIFO and reliable: messages arrive in send order, exactly
//! once. Backpressure lives entirely in the receiving scheduler; the
//! transport itself never blocks the sender.

use serde::{Deserialize, Serialize};

use crate::events::EventDescriptor;
use crate::records::ChangeRecord;

/// Milliseconds on a monotonic per-side clock.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Millis(pub f64);

impl Millis {
    /// Saturating difference, in milliseconds.
    pub fn since(self, earlier: Millis) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }
}

/// Host → worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ToWorker {
    /// First message of a session: the page location and transport mode.
    #[serde(rename = "init")]
    Init {
        location: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        shared_buffer: bool,
    },
    /// Forwarded input event.
    #[serde(rename = "event")]
    Event { event: EventDescriptor },
}

/// Worker → host.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ToHost {
    /// Ordered batch of captured changes.
    #[serde(rename = "mutate")]
    Mutate {
        mutations: Vec<ChangeRecord>,
        timestamp: Millis,
    },
    /// First structural snapshot, for binding onto a pre-rendered root.
    #[serde(rename = "hydrate")]
    Hydrate {
        mutations: Vec<ChangeRecord>,
        timestamp: Millis,
    },
    /// Shared-buffer mode: a full document skeleton is ready in the frame.
    #[serde(rename = "init-render")]
    InitRender { timestamp: Millis },
    /// Shared-buffer mode: the skeleton in the frame has changed.
    #[serde(rename = "dom-update")]
    DomUpdate { timestamp: Millis },
    /// History shim: the app pushed a new location.
    #[serde(rename = "pushState")]
    PushState { url: String, timestamp: Millis },
    /// History shim: the app replaced the current location.
    #[serde(rename = "replaceState")]
    ReplaceState { url: String, timestamp: Millis },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::RemoteId;

    #[test]
    fn message_tags_match_wire_names() {
        let init = ToWorker::Init {
            location: "http://localhost/".to_string(),
            shared_buffer: false,
        };
        let json = serde_json::to_value(&init).unwrap();
        assert_eq!(json["type"], "init");
        assert!(json.get("sharedBuffer").is_none());

        let mutate = ToHost::Mutate {
            mutations: vec![ChangeRecord::CharacterData {
                target: RemoteId::new("2"),
                value: "x".to_string(),
                old_value: None,
            }],
            timestamp: Millis(10.0),
        };
        let json = serde_json::to_value(&mutate).unwrap();
        assert_eq!(json["type"], "mutate");
        assert_eq!(json["mutations"][0]["type"], "characterData");

        let signal = ToHost::InitRender {
            timestamp: Millis(1.0),
        };
        assert_eq!(serde_json::to_value(&signal).unwrap()["type"], "init-render");

        let nav = ToHost::PushState {
            url: "/next".to_string(),
            timestamp: Millis(2.0),
        };
        assert_eq!(serde_json::to_value(&nav).unwrap()["type"], "pushState");
    }

    #[test]
    fn millis_since_saturates() {
        assert_eq!(Millis(5.0).since(Millis(2.0)), 3.0);
        assert_eq!(Millis(2.0).since(Millis(5.0)), 0.0);
    }
}
