//! ResendForward Storage - Backend record access
//!
//! This crate provides the record store abstraction over the hosted backend,
//! its PocketBase HTTP implementation, an in-memory implementation, the
//! structured filter builder and the typed repositories per collection.

pub mod backend;
pub mod filter;
pub mod memory;
pub mod models;
pub mod pocketbase;
pub mod repository;

pub use backend::{ListOptions, RecordStore};
pub use filter::{Filter, Op, Predicate};
pub use memory::{MemoryStore, StoreOp};
pub use models::*;
pub use pocketbase::PocketBaseStore;
pub use repository::*;
