#![allow(dead_code)]

use serde_json::Value;
use std::cell::Cell;
use std::rc::Rc;
use tasknote_core::db::open_db_in_memory;
use tasknote_core::persist::{RecordQuery, RemoteError, RemoteResult};
use tasknote_core::{
    HeadlessEditor, ManualAuthSource, ManualClock, MemoryCache, RemoteStore, SqliteRemoteStore,
    SyncConfig, User, WorkspaceDeps, WorkspaceService,
};

pub const START_MS: i64 = 1_000;

/// Remote store that can be switched offline.
pub struct SwitchableRemote {
    inner: Rc<SqliteRemoteStore>,
    offline: Rc<Cell<bool>>,
}

impl SwitchableRemote {
    fn check(&self) -> RemoteResult<()> {
        if self.offline.get() {
            return Err(RemoteError::InvalidRecord("remote unavailable".to_string()));
        }
        Ok(())
    }
}

impl RemoteStore for SwitchableRemote {
    fn insert(&self, table: &str, record: &Value) -> RemoteResult<()> {
        self.check()?;
        self.inner.insert(table, record)
    }

    fn update(&self, table: &str, id: &str, patch: &Value) -> RemoteResult<()> {
        self.check()?;
        self.inner.update(table, id, patch)
    }

    fn delete(&self, table: &str, id: &str) -> RemoteResult<()> {
        self.check()?;
        self.inner.delete(table, id)
    }

    fn query(&self, table: &str, query: &RecordQuery) -> RemoteResult<Vec<Value>> {
        self.check()?;
        self.inner.query(table, query)
    }
}

pub struct Fixture {
    pub service: WorkspaceService<HeadlessEditor>,
    pub clock: ManualClock,
    pub cache: MemoryCache,
    pub auth: ManualAuthSource,
    pub remote: Rc<SqliteRemoteStore>,
    pub offline: Rc<Cell<bool>>,
}

impl Fixture {
    /// Workspace signed in as `u1`, initialized at `START_MS`.
    pub fn signed_in() -> Self {
        Self::build(ManualAuthSource::signed_in(User::new("u1")), MemoryCache::new())
    }

    pub fn signed_out() -> Self {
        Self::build(ManualAuthSource::new(), MemoryCache::new())
    }

    pub fn with_cache(cache: MemoryCache) -> Self {
        Self::build(ManualAuthSource::new(), cache)
    }

    fn build(auth: ManualAuthSource, cache: MemoryCache) -> Self {
        let clock = ManualClock::new(START_MS);
        let remote = Rc::new(SqliteRemoteStore::new(open_db_in_memory().unwrap()));
        let offline = Rc::new(Cell::new(false));
        let mut service = WorkspaceService::new(
            WorkspaceDeps {
                clock: Rc::new(clock.clone()),
                remote: Box::new(SwitchableRemote {
                    inner: Rc::clone(&remote),
                    offline: Rc::clone(&offline),
                }),
                cache: Box::new(cache.clone()),
                auth: Box::new(auth.clone()),
                editor: HeadlessEditor::new(),
            },
            SyncConfig::default(),
        );
        service.init();
        Self {
            service,
            clock,
            cache,
            auth,
            remote,
            offline,
        }
    }

    /// Types `content` into the open note and delivers the event.
    pub fn type_content(&mut self, content: &str) {
        let event = self
            .service
            .editor_mut()
            .type_content(content)
            .expect("a note is open");
        self.service.handle_editor_event(event);
    }

    pub fn remote_rows(&self, table: &str) -> Vec<Value> {
        self.remote.query(table, &RecordQuery::new()).unwrap()
    }
}

pub fn task_list(items: &[(&str, bool)]) -> String {
    let mut out = String::from(r#"<ul data-type="taskList">"#);
    for (text, checked) in items {
        out.push_str(&format!(
            r#"<li data-type="taskItem" data-checked="{checked}"><p>{text}</p></li>"#
        ));
    }
    out.push_str("</ul>");
    out
}
