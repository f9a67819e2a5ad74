//! Use-case services.
//!
//! # Responsibility
//! - Orchestrate stores, reconciliation and persistence into user-level
//!   operations.
//! - Keep UI layers decoupled from storage and timing details.

pub mod workspace_service;

pub use workspace_service::{TickReport, WorkspaceDeps, WorkspaceService};
