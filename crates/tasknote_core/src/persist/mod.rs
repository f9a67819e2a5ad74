//! Persistence boundary.
//!
//! # Responsibility
//! - Mirror collections to a local cache synchronously.
//! - Queue remote writes and dispatch them off the caller's path.
//! - Debounce note content saves.
//!
//! # Invariants
//! - Local state is authoritative; a failed remote write never rolls back
//!   a store, except where a write carries a revert policy.
//! - Remote writes happen only while a user is signed in.

pub mod gateway;
pub mod local_cache;
pub mod remote;
pub mod scheduler;

pub use gateway::{DispatchFailure, FailurePolicy, PersistenceGateway, RemoteOp};
pub use local_cache::{LocalCache, MemoryCache, SqliteLocalCache};
pub use remote::{
    FilterValue, RecordQuery, RemoteError, RemoteResult, RemoteStore, SqliteRemoteStore,
};
pub use scheduler::{Debouncer, TimerHandle, TimerQueue};

/// Remote table and cache key of the task collection.
pub const TASKS: &str = "tasks";
/// Remote table and cache key of the note collection.
pub const NOTES: &str = "notes";
/// Remote table and cache key of the folder collection.
pub const FOLDERS: &str = "folders";
