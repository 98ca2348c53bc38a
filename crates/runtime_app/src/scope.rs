//! Sandbox scope construction.
//!
//! The scope is the entire surface application code can reach: the emulated
//! document, history/location shims wired to the transport, a monotonic
//! performance clock, and a registry of ambient globals reduced to a fixed
//! allow-list before the app mounts. Anything scrubbed resolves like any
//! undefined name would.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::mpsc::Sender;
use std::time::Instant;

use dom::TreeDocument;
use proto::{Millis, ToHost};

/// Names that survive scrubbing.
pub const ALLOWED_GLOBALS: &[&str] = &[
    "document",
    "history",
    "location",
    "performance",
    "console",
];

#[derive(Debug, PartialEq, Eq)]
pub enum ScopeError {
    NotDefined(String),
}

impl fmt::Display for ScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeError::NotDefined(name) => write!(f, "{name} is not defined"),
        }
    }
}

impl std::error::Error for ScopeError {}

/// One ambient name visible to application code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Global {
    Document,
    History,
    Location,
    Performance,
    Console,
    /// Capability inherited from the host environment. Scrubbed unless
    /// allow-listed.
    Host(String),
}

/// Explicit registry of ambient names, replacing anything resembling an
/// implicit global surface.
pub struct GlobalRegistry {
    entries: BTreeMap<String, Global>,
}

impl GlobalRegistry {
    pub fn with_shims() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert("document".to_string(), Global::Document);
        entries.insert("history".to_string(), Global::History);
        entries.insert("location".to_string(), Global::Location);
        entries.insert("performance".to_string(), Global::Performance);
        entries.insert("console".to_string(), Global::Console);
        Self { entries }
    }

    /// Registers a host-inherited ambient name, pre-scrub.
    pub fn inherit(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.entries.insert(name.clone(), Global::Host(name));
    }

    /// Removes everything outside the allow-list. Runs before any
    /// application code does.
    pub fn scrub(&mut self) {
        self.entries.retain(|name, _| {
            let keep = ALLOWED_GLOBALS.contains(&name.as_str());
            if !keep {
                log::info!("scrubbing ambient global {name:?}");
            }
            keep
        });
    }

    pub fn lookup(&self, name: &str) -> Result<&Global, ScopeError> {
        self.entries
            .get(name)
            .ok_or_else(|| ScopeError::NotDefined(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Monotonic clock matching the timestamps stamped onto outgoing batches.
#[derive(Clone, Copy, Debug)]
pub struct PerformanceClock {
    origin: Instant,
}

impl PerformanceClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> Millis {
        Millis(self.origin.elapsed().as_secs_f64() * 1000.0)
    }
}

impl Default for PerformanceClock {
    fn default() -> Self {
        Self::new()
    }
}

/// History shim: navigation intents cross the transport instead of touching
/// any real history.
pub struct History {
    tx: Sender<ToHost>,
    clock: PerformanceClock,
}

impl History {
    pub fn push_state(&self, url: &str) {
        let message = ToHost::PushState {
            url: url.to_string(),
            timestamp: self.clock.now(),
        };
        if self.tx.send(message).is_err() {
            log::warn!("history push dropped, host side is gone");
        }
    }

    pub fn replace_state(&self, url: &str) {
        let message = ToHost::ReplaceState {
            url: url.to_string(),
            timestamp: self.clock.now(),
        };
        if self.tx.send(message).is_err() {
            log::warn!("history replace dropped, host side is gone");
        }
    }
}

/// Read-only location shim parsed from the init message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub href: String,
    pub pathname: String,
    pub search: String,
    pub hash: String,
}

impl Location {
    pub fn parse(href: &str) -> Self {
        let rest = match href.find("://") {
            Some(pos) => {
                let after_scheme = &href[pos + 3..];
                match after_scheme.find('/') {
                    Some(slash) => &after_scheme[slash..],
                    None => "/",
                }
            }
            None => href,
        };
        let (before_hash, hash) = match rest.find('#') {
            Some(pos) => (&rest[..pos], rest[pos..].to_string()),
            None => (rest, String::new()),
        };
        let (pathname, search) = match before_hash.find('?') {
            Some(pos) => (
                before_hash[..pos].to_string(),
                before_hash[pos..].to_string(),
            ),
            None => (before_hash.to_string(), String::new()),
        };
        Self {
            href: href.to_string(),
            pathname,
            search,
            hash,
        }
    }
}

/// Everything application code can reach.
pub struct WorkerScope {
    pub document: TreeDocument,
    pub history: History,
    pub location: Location,
    pub performance: PerformanceClock,
    globals: GlobalRegistry,
}

impl WorkerScope {
    /// Builds and scrubs the scope. `ambient` lists host-inherited names
    /// present before scrubbing; all of them are removed unless allow-listed.
    pub fn new(location: &str, tx: Sender<ToHost>, ambient: &[String]) -> Self {
        let clock = PerformanceClock::new();
        let mut globals = GlobalRegistry::with_shims();
        for name in ambient {
            globals.inherit(name.clone());
        }
        globals.scrub();
        Self {
            document: TreeDocument::new(),
            history: History { tx, clock },
            location: Location::parse(location),
            performance: clock,
            globals,
        }
    }

    pub fn lookup_global(&self, name: &str) -> Result<&Global, ScopeError> {
        self.globals.lookup(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn scrub_removes_everything_outside_the_allow_list() {
        let (tx, _rx) = channel();
        let ambient = vec![
            "fetch".to_string(),
            "indexedDB".to_string(),
            "console".to_string(),
        ];
        let scope = WorkerScope::new("http://localhost/", tx, &ambient);

        assert_eq!(scope.lookup_global("document"), Ok(&Global::Document));
        assert_eq!(scope.lookup_global("console"), Ok(&Global::Console));
        assert_eq!(
            scope.lookup_global("fetch"),
            Err(ScopeError::NotDefined("fetch".to_string()))
        );
        assert_eq!(
            scope.lookup_global("indexedDB"),
            Err(ScopeError::NotDefined("indexedDB".to_string()))
        );
    }

    #[test]
    fn history_shim_sends_navigation_messages() {
        let (tx, rx) = channel();
        let scope = WorkerScope::new("http://localhost/", tx, &[]);
        scope.history.push_state("/a");
        scope.history.replace_state("/b");

        assert!(matches!(rx.recv().unwrap(), ToHost::PushState { url, .. } if url == "/a"));
        assert!(matches!(rx.recv().unwrap(), ToHost::ReplaceState { url, .. } if url == "/b"));
    }

    #[test]
    fn location_parses_its_pieces() {
        let loc = Location::parse("https://example.test/app/page?q=1#top");
        assert_eq!(loc.pathname, "/app/page");
        assert_eq!(loc.search, "?q=1");
        assert_eq!(loc.hash, "#top");
        assert_eq!(loc.href, "https://example.test/app/page?q=1#top");

        let bare = Location::parse("https://example.test");
        assert_eq!(bare.pathname, "/");
    }
}
