//! offergrid-state — persistence backend for Offergrid.
//!
//! Backed by [redb](https://docs.rs/redb), provides a path-addressed byte
//! store: values live at slash-separated paths such as
//! `ReserveDiscipline/SelectedServices` or `Services/data.kafka/Tasks/broker-0`.
//!
//! # Architecture
//!
//! Callers depend on the [`Persister`] trait. [`StateStore`] implements it
//! over a single redb table keyed by the full path; deleting a path removes
//! every descendant path with it.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across threads.

pub mod error;
pub mod persister;
pub mod store;
pub mod tables;

pub use error::{StateError, StateResult};
pub use persister::{Persister, join_path};
pub use store::StateStore;
