//! Local mirror, remote outbox and debounced note saves.
//!
//! # Responsibility
//! - Mirror whole collections to the [`LocalCache`] on every write.
//! - Queue remote writes as [`RemoteOp`]s and dispatch them in order.
//! - Track the trailing-edge save timer of each edited note.
//! - Load collections back from the cache or the remote store.
//!
//! # Invariants
//! - Nothing is queued while no user is signed in.
//! - A failed write is reported once and dropped (no retry queue).
//! - Mirror failures are logged, never surfaced to callers.

use crate::clock::EpochMs;
use crate::model::note::{Folder, FolderRecord, Note, NoteId, NoteRecord};
use crate::model::task::{Task, TaskId, TaskRecord};
use crate::persist::local_cache::LocalCache;
use crate::persist::remote::{RecordQuery, RemoteError, RemoteResult, RemoteStore};
use crate::persist::scheduler::Debouncer;
use crate::persist::{FOLDERS, NOTES, TASKS};
use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::VecDeque;

/// One queued remote write.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOp {
    Insert {
        table: &'static str,
        record: Value,
    },
    Update {
        table: &'static str,
        id: String,
        patch: Value,
    },
    Delete {
        table: &'static str,
        id: String,
    },
}

impl RemoteOp {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Insert { table, .. } | Self::Update { table, .. } | Self::Delete { table, .. } => {
                table
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Insert { .. } => "insert",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
        }
    }
}

/// What the caller should do locally when a write fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Keep the optimistic local state.
    KeepLocal,
    /// Restore the note's previous pin flag.
    RevertPin { note_id: NoteId, previous: bool },
}

/// A write the remote store rejected.
#[derive(Debug)]
pub struct DispatchFailure {
    pub op: RemoteOp,
    pub policy: FailurePolicy,
    pub error: RemoteError,
}

#[derive(Debug)]
struct PendingWrite {
    op: RemoteOp,
    policy: FailurePolicy,
}

pub struct PersistenceGateway {
    remote: Box<dyn RemoteStore>,
    cache: Box<dyn LocalCache>,
    outbox: VecDeque<PendingWrite>,
    note_saves: Debouncer<NoteId>,
    user_id: Option<String>,
}

impl PersistenceGateway {
    pub fn new(
        remote: Box<dyn RemoteStore>,
        cache: Box<dyn LocalCache>,
        save_debounce_ms: EpochMs,
    ) -> Self {
        Self {
            remote,
            cache,
            outbox: VecDeque::new(),
            note_saves: Debouncer::new(save_debounce_ms),
            user_id: None,
        }
    }

    /// Sets the signed-in user. Signing out drops queued writes.
    pub fn set_user(&mut self, user_id: Option<String>) {
        if user_id.is_none() && !self.outbox.is_empty() {
            warn!(
                "event=remote_outbox module=gateway status=discarded reason=signed_out count={}",
                self.outbox.len()
            );
            self.outbox.clear();
        }
        self.user_id = user_id;
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn pending_writes(&self) -> usize {
        self.outbox.len()
    }

    pub fn mirror_tasks(&self, tasks: &[Task]) {
        let records: Vec<TaskRecord> = tasks
            .iter()
            .map(|task| TaskRecord::from_task(task, None))
            .collect();
        self.mirror(TASKS, &records);
    }

    pub fn mirror_notes(&self, notes: &[Note]) {
        let records: Vec<NoteRecord> = notes
            .iter()
            .map(|note| NoteRecord::from_note(note, None))
            .collect();
        self.mirror(NOTES, &records);
    }

    pub fn mirror_folders(&self, folders: &[Folder]) {
        let records: Vec<FolderRecord> = folders
            .iter()
            .map(|folder| FolderRecord::from_folder(folder, None))
            .collect();
        self.mirror(FOLDERS, &records);
    }

    pub fn insert_task(&mut self, task: &Task) {
        let record = TaskRecord::from_task(task, self.user_id.as_deref());
        self.enqueue_record(TASKS, &record, |record| RemoteOp::Insert {
            table: TASKS,
            record,
        });
    }

    /// Queues a full-row update of a task.
    pub fn update_task(&mut self, task: &Task) {
        let record = TaskRecord::from_task(task, self.user_id.as_deref());
        let id = task.id.to_string();
        self.enqueue_record(TASKS, &record, |patch| RemoteOp::Update {
            table: TASKS,
            id,
            patch,
        });
    }

    pub fn delete_task(&mut self, task_id: TaskId) {
        self.enqueue(
            RemoteOp::Delete {
                table: TASKS,
                id: task_id.to_string(),
            },
            FailurePolicy::KeepLocal,
        );
    }

    pub fn insert_note(&mut self, note: &Note) {
        let record = NoteRecord::from_note(note, self.user_id.as_deref());
        self.enqueue_record(NOTES, &record, |record| RemoteOp::Insert {
            table: NOTES,
            record,
        });
    }

    /// Queues the content/folder columns of a note.
    pub fn save_note(&mut self, note: &Note) {
        self.enqueue(
            RemoteOp::Update {
                table: NOTES,
                id: note.id.to_string(),
                patch: json!({
                    "content": note.content,
                    "folder_id": note.folder.folder_id().map(|id| id.to_string()),
                    "updated_at": note.updated_at,
                }),
            },
            FailurePolicy::KeepLocal,
        );
    }

    /// Queues a pin change that is reverted to `previous` if rejected.
    pub fn set_note_pinned(&mut self, note_id: NoteId, pinned: bool, previous: bool) {
        self.enqueue(
            RemoteOp::Update {
                table: NOTES,
                id: note_id.to_string(),
                patch: json!({ "is_pinned": pinned }),
            },
            FailurePolicy::RevertPin { note_id, previous },
        );
    }

    pub fn delete_note(&mut self, note_id: NoteId) {
        self.note_saves.cancel(&note_id);
        self.enqueue(
            RemoteOp::Delete {
                table: NOTES,
                id: note_id.to_string(),
            },
            FailurePolicy::KeepLocal,
        );
    }

    pub fn insert_folder(&mut self, folder: &Folder) {
        let record = FolderRecord::from_folder(folder, self.user_id.as_deref());
        self.enqueue_record(FOLDERS, &record, |record| RemoteOp::Insert {
            table: FOLDERS,
            record,
        });
    }

    pub fn delete_folder(&mut self, folder: &Folder) {
        self.enqueue(
            RemoteOp::Delete {
                table: FOLDERS,
                id: folder.id.to_string(),
            },
            FailurePolicy::KeepLocal,
        );
    }

    /// (Re)starts the save timer of a note.
    pub fn schedule_note_save(&mut self, note_id: NoteId, now: EpochMs) {
        self.note_saves.touch(note_id, now);
    }

    pub fn has_pending_save(&self, note_id: NoteId) -> bool {
        self.note_saves.is_pending(&note_id)
    }

    /// Cancels the timer of a note. Returns whether a save was pending, in
    /// which case the caller saves it immediately.
    pub fn take_pending_save(&mut self, note_id: NoteId) -> bool {
        self.note_saves.cancel(&note_id)
    }

    /// Notes whose quiet period has elapsed.
    pub fn due_note_saves(&mut self, now: EpochMs) -> Vec<NoteId> {
        self.note_saves.due(now)
    }

    /// Cancels every save timer and returns the notes that were pending.
    pub fn drain_note_saves(&mut self) -> Vec<NoteId> {
        self.note_saves.drain()
    }

    /// Sends every queued write in order. Failures are logged and returned
    /// so the caller can apply their policy.
    pub fn dispatch(&mut self) -> Vec<DispatchFailure> {
        let mut failures = Vec::new();
        while let Some(pending) = self.outbox.pop_front() {
            let result = match &pending.op {
                RemoteOp::Insert { table, record } => self.remote.insert(table, record),
                RemoteOp::Update { table, id, patch } => self.remote.update(table, id, patch),
                RemoteOp::Delete { table, id } => self.remote.delete(table, id),
            };
            match result {
                Ok(()) => debug!(
                    "event=remote_write module=gateway status=ok op={} table={}",
                    pending.op.kind(),
                    pending.op.table()
                ),
                Err(err) => {
                    error!(
                        "event=remote_write module=gateway status=error op={} table={} error={}",
                        pending.op.kind(),
                        pending.op.table(),
                        err
                    );
                    failures.push(DispatchFailure {
                        op: pending.op,
                        policy: pending.policy,
                        error: err,
                    });
                }
            }
        }
        failures
    }

    pub fn load_cached_tasks(&self) -> Vec<Task> {
        self.load_cached::<TaskRecord, _, _>(TASKS, TaskRecord::into_task)
    }

    pub fn load_cached_notes(&self) -> Vec<Note> {
        self.load_cached::<NoteRecord, _, _>(NOTES, NoteRecord::into_note)
    }

    pub fn load_cached_folders(&self) -> Vec<Folder> {
        self.load_cached::<FolderRecord, _, _>(FOLDERS, FolderRecord::into_folder)
    }

    /// Tasks of the signed-in user, newest first.
    pub fn load_remote_tasks(&self) -> RemoteResult<Vec<Task>> {
        self.load_remote::<TaskRecord, _, _>(TASKS, "created_at", true, TaskRecord::into_task)
    }

    /// Notes of the signed-in user, most recently updated first.
    pub fn load_remote_notes(&self) -> RemoteResult<Vec<Note>> {
        self.load_remote::<NoteRecord, _, _>(NOTES, "updated_at", true, NoteRecord::into_note)
    }

    pub fn load_remote_folders(&self) -> RemoteResult<Vec<Folder>> {
        self.load_remote::<FolderRecord, _, _>(FOLDERS, "name", false, FolderRecord::into_folder)
    }

    fn mirror<R: Serialize>(&self, key: &str, records: &[R]) {
        let result = serde_json::to_string(records)
            .map_err(|err| err.to_string())
            .and_then(|value| self.cache.set(key, &value).map_err(|err| err.to_string()));
        if let Err(err) = result {
            error!("event=cache_mirror module=gateway status=error key={key} error={err}");
        }
    }

    fn enqueue_record<R, F>(&mut self, table: &'static str, record: &R, build: F)
    where
        R: Serialize,
        F: FnOnce(Value) -> RemoteOp,
    {
        match serde_json::to_value(record) {
            Ok(value) => self.enqueue(build(value), FailurePolicy::KeepLocal),
            Err(err) => error!(
                "event=remote_outbox module=gateway status=error table={table} error={err}"
            ),
        }
    }

    fn enqueue(&mut self, op: RemoteOp, policy: FailurePolicy) {
        if self.user_id.is_none() {
            debug!(
                "event=remote_outbox module=gateway status=skipped reason=signed_out op={} table={}",
                op.kind(),
                op.table()
            );
            return;
        }
        self.outbox.push_back(PendingWrite { op, policy });
    }

    fn load_cached<R, T, F>(&self, key: &str, convert: F) -> Vec<T>
    where
        R: DeserializeOwned,
        F: Fn(R) -> Result<T, crate::model::task::RecordError>,
    {
        let raw = match self.cache.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                error!("event=cache_load module=gateway status=error key={key} error={err}");
                return Vec::new();
            }
        };
        let records: Vec<R> = match serde_json::from_str(&raw) {
            Ok(records) => records,
            Err(err) => {
                warn!("event=cache_load module=gateway status=corrupt key={key} error={err}");
                return Vec::new();
            }
        };
        convert_records(key, records, convert)
    }

    fn load_remote<R, T, F>(
        &self,
        table: &str,
        order_field: &str,
        descending: bool,
        convert: F,
    ) -> RemoteResult<Vec<T>>
    where
        R: DeserializeOwned,
        F: Fn(R) -> Result<T, crate::model::task::RecordError>,
    {
        let Some(user_id) = self.user_id.as_deref() else {
            return Ok(Vec::new());
        };
        let query = RecordQuery::new().eq("user_id", user_id);
        let query = if descending {
            query.order_desc(order_field)
        } else {
            query.order_asc(order_field)
        };
        let rows = self.remote.query(table, &query)?;
        let records = rows
            .into_iter()
            .map(serde_json::from_value::<R>)
            .collect::<Result<Vec<_>, _>>()?;
        let loaded = convert_records(table, records, convert);
        info!(
            "event=remote_load module=gateway status=ok table={table} count={}",
            loaded.len()
        );
        Ok(loaded)
    }
}

fn convert_records<R, T, F>(collection: &str, records: Vec<R>, convert: F) -> Vec<T>
where
    F: Fn(R) -> Result<T, crate::model::task::RecordError>,
{
    records
        .into_iter()
        .filter_map(|record| match convert(record) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    "event=record_load module=gateway status=skipped collection={collection} error={err}"
                );
                None
            }
        })
        .collect()
}
