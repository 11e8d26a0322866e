//! Real-time collaborative scene engine.
//!
//! A client-side engine that keeps a local copy of a shared vector-scene
//! document consistent with a remote document store. Shapes, groups, and
//! connections are edited optimistically against the local cache and then
//! written through; remote snapshots replace the cache wholesale. Services
//! layer advisory locks, undo/redo, grouping, connectors, layout, clipboard,
//! presence, and an agent-facing operation surface on top.

pub mod clipboard;
pub mod config;
pub mod db;
pub mod doc;
pub mod error;
pub mod geometry;
pub mod history;
pub mod services;
pub mod state;
pub mod store;
