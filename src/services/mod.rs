//! Collaboration services.
//!
//! ARCHITECTURE
//! ============
//! Each service module owns one slice of the collaboration engine and works
//! against a `SessionState`. Mutations flow through `sync::commit`: apply to
//! the local cache, republish the view, write to the remote store, then
//! record history. Remote snapshots replace the cache wholesale via
//! `sync::apply_snapshot`.

pub mod agent;
pub mod clipboard;
pub mod connection;
pub mod group;
pub mod layout;
pub mod lock;
pub mod presence;
pub mod shape;
pub mod sync;
pub mod undo;
