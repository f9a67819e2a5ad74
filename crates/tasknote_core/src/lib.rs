//! Core domain logic for tasknote.
//! Task lists, notes with embedded task fragments, and the reconciliation
//! and persistence that keep them consistent.

pub mod clock;
pub mod config;
pub mod content;
pub mod db;
pub mod logging;
pub mod model;
pub mod persist;
pub mod service;
pub mod session;
pub mod store;
pub mod sync;

pub use clock::{Clock, EpochMs, ManualClock, SystemClock};
pub use config::{AppConfig, ConfigError, SyncConfig};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::fragment::{FragmentAttrs, FragmentId, TaskFragment};
pub use model::note::{Folder, FolderId, FolderRef, Note, NoteId};
pub use model::task::{SourceRef, Task, TaskId, TaskSection, TaskType};
pub use model::ValidationError;
pub use persist::{
    LocalCache, MemoryCache, PersistenceGateway, RemoteError, RemoteStore, SqliteLocalCache,
    SqliteRemoteStore,
};
pub use service::{TickReport, WorkspaceDeps, WorkspaceService};
pub use session::{AuthEvent, AuthStateSource, ManualAuthSource, SessionContext, User};
pub use store::{StoreError, StoreResult};
pub use sync::{EditorEvent, EditorSurface, HeadlessEditor, Reconciler};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
