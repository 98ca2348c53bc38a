//! Worker-side runtime: sandbox scope, identifier registry, sanitization and
//! the app runtime thread.
//!
//! The runtime owns the emulated document and everything that touches the
//! transport from the isolated side. Application code only ever sees the
//! [`WorkerScope`] handed to it at mount time.

pub mod events;
pub mod registry;
pub mod runtime;
pub mod sanitize;
pub mod scope;

pub use crate::events::redispatch;
pub use crate::registry::NodeIds;
pub use crate::runtime::{EmitPolicy, RuntimeOptions, WorkerApp, start_app_runtime, start_app_runtime_with_options};
pub use crate::sanitize::{DENY_LIST, sanitize_batch, skeleton};
pub use crate::scope::{Global, GlobalRegistry, History, Location, PerformanceClock, ScopeError, WorkerScope};
