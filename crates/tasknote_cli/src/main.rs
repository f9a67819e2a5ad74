//! CLI smoke entry point.
//!
//! # Responsibility
//! - Wire `tasknote_core` end to end: config, logging, storage, workspace.
//! - Run one scripted note-to-task session with deterministic output.
//!
//! Usage: `tasknote_cli [--config <path.json>]`

use log::info;
use std::error::Error;
use std::process::ExitCode;
use std::rc::Rc;
use tasknote_core::db::{open_db, open_db_in_memory};
use tasknote_core::persist::{LocalCache, RemoteStore};
use tasknote_core::{
    AppConfig, Clock, EditorSurface, FolderRef, HeadlessEditor, ManualAuthSource, ManualClock,
    SqliteLocalCache, SqliteRemoteStore, SystemClock, TaskSection, TaskType, User, WorkspaceDeps,
    WorkspaceService,
};

const DEMO_NOTE: &str = concat!(
    "<p>Errands</p>",
    r#"<ul data-type="taskList">"#,
    r#"<li data-type="taskItem" data-checked="false"><p>Buy milk</p></li>"#,
    r#"<li data-type="taskItem" data-checked="false" data-task-type="private" data-section="waiting"><p>Pick up parcel</p></li>"#,
    "</ul>",
    "<p>TW: call vendor</p>",
    "<p></p>"
);

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("tasknote: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = match config_path()? {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if tasknote_core::init_from_config(&config)? {
        println!("logging to {:?}", config.log_dir);
    }
    info!(
        "event=cli_start module=cli status=ok version={}",
        tasknote_core::core_version()
    );

    let (remote, cache): (Box<dyn RemoteStore>, Box<dyn LocalCache>) = match &config.database_path
    {
        Some(path) => (
            Box::new(SqliteRemoteStore::new(open_db(path)?)),
            Box::new(SqliteLocalCache::new(open_db(path)?)),
        ),
        None => (
            Box::new(SqliteRemoteStore::new(open_db_in_memory()?)),
            Box::new(SqliteLocalCache::new(open_db_in_memory()?)),
        ),
    };

    let clock = ManualClock::new(SystemClock.now_ms());
    let mut workspace = WorkspaceService::new(
        WorkspaceDeps {
            clock: Rc::new(clock.clone()),
            remote,
            cache,
            auth: Box::new(ManualAuthSource::signed_in(User::new("demo-user"))),
            editor: HeadlessEditor::new(),
        },
        config.sync.clone(),
    );
    workspace.init();

    let note = workspace
        .create_note(FolderRef::All)
        .ok_or("failed to create note")?;
    if let Some(event) = workspace.editor_mut().type_content(DEMO_NOTE) {
        workspace.handle_editor_event(event);
    }

    print_tasks(&workspace, "after typing");

    let milk = workspace
        .tasks()
        .all()
        .iter()
        .find(|task| task.text == "Buy milk")
        .map(|task| task.id)
        .ok_or("Buy milk task missing")?;
    workspace.toggle_task(milk);
    println!("note after completing `Buy milk`:");
    println!("  {}", workspace.editor().content());

    clock.advance(config.sync.save_debounce_ms);
    let report = workspace.tick();
    println!(
        "tick: saved_notes={} failed_writes={}",
        report.saved_notes.len(),
        report.failed_writes.len()
    );

    workspace.delete_note(note.id);
    print_tasks(&workspace, "after deleting the note");

    clock.advance(config.sync.archive_after_ms);
    let report = workspace.tick();
    println!("archived after a day: {}", report.archived.len());

    workspace.teardown();
    Ok(())
}

fn config_path() -> Result<Option<String>, Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None => Ok(None),
        Some("--config") => args
            .next()
            .map(Some)
            .ok_or_else(|| "--config needs a path".into()),
        Some(other) => Err(format!("unknown argument `{other}`").into()),
    }
}

fn print_tasks(workspace: &WorkspaceService<HeadlessEditor>, label: &str) {
    println!("tasks {label}:");
    for (task_type, section) in [
        (TaskType::Work, TaskSection::Todo),
        (TaskType::Work, TaskSection::Waiting),
        (TaskType::Private, TaskSection::Todo),
        (TaskType::Private, TaskSection::Waiting),
    ] {
        for task in workspace.tasks().list(task_type, section) {
            println!(
                "  [{}] {}/{} {}{}",
                if task.completed { "x" } else { " " },
                task_type.as_str(),
                section.as_str(),
                task.text,
                if task.is_note_derived() { " (from note)" } else { "" }
            );
        }
    }
}
