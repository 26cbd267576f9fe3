//! offergrid-core — shared types for the Offergrid multi-service scheduler.
//!
//! Everything that crosses a crate boundary lives here: the offers and
//! resources delivered by the cluster manager, the recommendations services
//! produce in response, the client status each service reports, and the
//! naming rules that map logical service names into flat namespaces.
//!
//! # Modules
//!
//! - **`types`** — offers, resources, reservations, recommendations
//! - **`status`** — client status and the per-call response enums
//! - **`names`** — service name sanitization and task-id parsing
//! - **`config`** — `offergrid.toml` configuration
//! - **`logging`** — tracing subscriber setup for the hosting process

pub mod config;
pub mod logging;
pub mod names;
pub mod status;
pub mod types;

pub use config::OffergridConfig;
pub use names::NameError;
pub use status::*;
pub use types::*;
