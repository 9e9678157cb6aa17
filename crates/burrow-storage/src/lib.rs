//! Storage backends for the Burrow URL shortener.
//!
//! Two interchangeable implementations of [`burrow_core::Store`] live here:
//! [`JournalStore`], an in-memory index backed by an append-only file, and
//! [`PostgresStore`]. [`open`] picks one from a [`StoreConfig`].

pub mod config;
pub mod factory;
pub mod journal;
pub mod postgres;

pub use burrow_core::{Store, StoreError};
pub use config::{Backend, StoreConfig};
pub use factory::{open, AnyStore};
pub use journal::JournalStore;
pub use postgres::PostgresStore;
