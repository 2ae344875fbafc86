//! Task store - durable CRUD storage for tasks backed by SQLite.
//!
//! The SQLite connection is owned by a dedicated worker thread; async callers
//! submit commands over a channel and await the reply. Every operation
//! (reads included) runs one at a time on that thread, in submission order,
//! so a read-merge-write update can never interleave with another write.

use std::path::Path;
use std::thread::JoinHandle;

use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};

/// A single task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub is_complete: bool,
}

/// Errors surfaced by the task store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("title must not be empty")]
    InvalidTitle,
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("task store is closed")]
    Closed,
}

/// Commands processed by the storage worker.
enum StoreCommand {
    ListAll {
        respond: oneshot::Sender<Result<Vec<Task>, StoreError>>,
    },
    Get {
        id: i64,
        respond: oneshot::Sender<Result<Option<Task>, StoreError>>,
    },
    Create {
        title: String,
        is_complete: bool,
        respond: oneshot::Sender<Result<Task, StoreError>>,
    },
    Update {
        id: i64,
        title: Option<String>,
        is_complete: Option<bool>,
        respond: oneshot::Sender<Result<bool, StoreError>>,
    },
    Delete {
        id: i64,
        respond: oneshot::Sender<Result<bool, StoreError>>,
    },
}

/// Handle to the task store.
///
/// Cheap to share behind an `Arc`; all methods go through the worker thread
/// that owns the connection. After `shutdown` every operation returns
/// `StoreError::Closed`.
pub struct TaskStore {
    tx: RwLock<Option<mpsc::Sender<StoreCommand>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl TaskStore {
    /// Open the database at `path`, ensure the schema exists, and start the
    /// storage worker.
    ///
    /// Creating the table is idempotent, so this is safe on every process
    /// start. Fails only if the file cannot be opened or written.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let (tx, rx) = mpsc::channel(64);
        let (init_tx, init_rx) = oneshot::channel();

        let handle = std::thread::Builder::new()
            .name("task-store".to_string())
            .spawn(move || worker_loop(path, rx, init_tx))
            .map_err(|_| StoreError::Closed)?;

        match init_rx.await {
            Ok(Ok(())) => {
                tracing::info!("tasks table initialized");
                Ok(Self {
                    tx: RwLock::new(Some(tx)),
                    worker: Mutex::new(Some(handle)),
                })
            }
            Ok(Err(e)) => Err(e),
            // Worker died before reporting; the open itself panicked.
            Err(_) => Err(StoreError::Closed),
        }
    }

    async fn sender(&self) -> Result<mpsc::Sender<StoreCommand>, StoreError> {
        self.tx.read().await.clone().ok_or(StoreError::Closed)
    }

    async fn submit<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T, StoreError>>) -> StoreCommand,
    ) -> Result<T, StoreError> {
        let tx = self.sender().await?;
        let (respond, reply) = oneshot::channel();
        tx.send(make(respond)).await.map_err(|_| StoreError::Closed)?;
        reply.await.map_err(|_| StoreError::Closed)?
    }

    /// All tasks, ordered by ascending id.
    pub async fn list_all(&self) -> Result<Vec<Task>, StoreError> {
        self.submit(|respond| StoreCommand::ListAll { respond }).await
    }

    /// Exact-match lookup; `None` when no task has that id.
    pub async fn get(&self, id: i64) -> Result<Option<Task>, StoreError> {
        self.submit(|respond| StoreCommand::Get { id, respond }).await
    }

    /// Persist a new task and return it with its assigned id.
    ///
    /// Empty or whitespace-only titles are rejected before anything reaches
    /// the database.
    pub async fn create(&self, title: &str, is_complete: bool) -> Result<Task, StoreError> {
        if title.trim().is_empty() {
            return Err(StoreError::InvalidTitle);
        }
        let title = title.to_string();
        self.submit(|respond| StoreCommand::Create {
            title,
            is_complete,
            respond,
        })
        .await
    }

    /// Partial update: each present field replaces the stored value, absent
    /// fields are retained. Returns `false` when no task has that id.
    ///
    /// Both fields omitted is a valid no-op that still returns `true` for an
    /// existing id. An explicitly empty title is rejected.
    pub async fn update(
        &self,
        id: i64,
        title: Option<String>,
        is_complete: Option<bool>,
    ) -> Result<bool, StoreError> {
        if let Some(t) = &title {
            if t.trim().is_empty() {
                return Err(StoreError::InvalidTitle);
            }
        }
        self.submit(|respond| StoreCommand::Update {
            id,
            title,
            is_complete,
            respond,
        })
        .await
    }

    /// Remove the task if present. Returns `false` (not an error) when no
    /// task has that id.
    pub async fn delete(&self, id: i64) -> Result<bool, StoreError> {
        self.submit(|respond| StoreCommand::Delete { id, respond }).await
    }

    /// Close the command channel and wait for the worker to drain and exit.
    ///
    /// Commands already submitted complete before the worker stops; anything
    /// sent afterwards gets `StoreError::Closed`.
    pub async fn shutdown(&self) {
        self.tx.write().await.take();
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            let join = tokio::task::spawn_blocking(move || handle.join());
            match join.await {
                Ok(Ok(())) => tracing::info!("task store shut down"),
                _ => tracing::error!("task store worker did not shut down cleanly"),
            }
        }
    }
}

/// Apply optional overrides onto the current record.
///
/// Pure so the merge semantics can be tested apart from storage I/O.
fn merge_task(current: &Task, title: Option<&str>, is_complete: Option<bool>) -> Task {
    Task {
        id: current.id,
        title: title.map(str::to_string).unwrap_or_else(|| current.title.clone()),
        is_complete: is_complete.unwrap_or(current.is_complete),
    }
}

fn worker_loop(
    path: std::path::PathBuf,
    mut rx: mpsc::Receiver<StoreCommand>,
    init_tx: oneshot::Sender<Result<(), StoreError>>,
) {
    let conn = match open_database(&path) {
        Ok(conn) => {
            let _ = init_tx.send(Ok(()));
            conn
        }
        Err(e) => {
            let _ = init_tx.send(Err(e));
            return;
        }
    };

    // A reply send fails only when the caller went away (cancelled request);
    // the operation has already been applied, so the result is dropped.
    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            StoreCommand::ListAll { respond } => {
                let _ = respond.send(list_all(&conn));
            }
            StoreCommand::Get { id, respond } => {
                let _ = respond.send(get_by_id(&conn, id));
            }
            StoreCommand::Create {
                title,
                is_complete,
                respond,
            } => {
                let _ = respond.send(create(&conn, &title, is_complete));
            }
            StoreCommand::Update {
                id,
                title,
                is_complete,
                respond,
            } => {
                let _ = respond.send(update(&conn, id, title.as_deref(), is_complete));
            }
            StoreCommand::Delete { id, respond } => {
                let _ = respond.send(delete(&conn, id));
            }
        }
    }
}

fn open_database(path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS tasks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            isComplete BOOLEAN DEFAULT 0
        )",
    )?;
    Ok(conn)
}

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        is_complete: row.get(2)?,
    })
}

fn list_all(conn: &Connection) -> Result<Vec<Task>, StoreError> {
    let mut stmt = conn.prepare("SELECT id, title, isComplete FROM tasks ORDER BY id")?;
    let tasks = stmt
        .query_map([], row_to_task)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Task>, StoreError> {
    let task = conn
        .query_row(
            "SELECT id, title, isComplete FROM tasks WHERE id = ?1",
            [id],
            row_to_task,
        )
        .optional()?;
    Ok(task)
}

fn create(conn: &Connection, title: &str, is_complete: bool) -> Result<Task, StoreError> {
    conn.execute(
        "INSERT INTO tasks (title, isComplete) VALUES (?1, ?2)",
        rusqlite::params![title, is_complete],
    )?;
    Ok(Task {
        id: conn.last_insert_rowid(),
        title: title.to_string(),
        is_complete,
    })
}

fn update(
    conn: &Connection,
    id: i64,
    title: Option<&str>,
    is_complete: Option<bool>,
) -> Result<bool, StoreError> {
    let Some(current) = get_by_id(conn, id)? else {
        return Ok(false);
    };
    let merged = merge_task(&current, title, is_complete);
    let changed = conn.execute(
        "UPDATE tasks SET title = ?1, isComplete = ?2 WHERE id = ?3",
        rusqlite::params![merged.title, merged.is_complete, id],
    )?;
    Ok(changed > 0)
}

fn delete(conn: &Connection, id: i64) -> Result<bool, StoreError> {
    let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", [id])?;
    Ok(changed > 0)
}
