// src/store/mod.rs

//! SQLite-backed persistent store.
//!
//! All durable state lives here: executions, stages, tasks and task files.
//! The schema uses `ON DELETE CASCADE` foreign keys so deleting an
//! execution removes everything beneath it, and enumerations are stored by
//! textual name so rows survive schema evolution.
//!
//! Entities are plain structs; the store maps rows to them on load and
//! writes whole rows back on commit. "Commit" methods are the persistence
//! checkpoints the engine calls at well-defined points (end of start, after
//! graph insertion, after command generation, on every status change).

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::{Result, RundagError};
use crate::model::{
    Execution, ExecutionId, ExecutionStatus, Stage, Task, TaskFile, TaskStatus,
};

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (creating if necessary) a store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        Self::from_connection(conn)
    }

    /// An in-memory store, used by tests.
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS executions(
              id INTEGER PRIMARY KEY,
              name TEXT NOT NULL UNIQUE,
              description TEXT,
              successful INTEGER NOT NULL DEFAULT 0,
              output_dir TEXT NOT NULL,
              created_on TEXT NOT NULL,
              started_on TEXT,
              finished_on TEXT,
              max_cpus INTEGER,
              info TEXT NOT NULL DEFAULT '{}',
              status TEXT NOT NULL DEFAULT 'no_attempt'
            );

            CREATE TABLE IF NOT EXISTS stages(
              id INTEGER PRIMARY KEY,
              execution_id INTEGER NOT NULL REFERENCES executions(id) ON DELETE CASCADE,
              name TEXT NOT NULL,
              UNIQUE (execution_id, name)
            );

            CREATE TABLE IF NOT EXISTS tasks(
              id INTEGER PRIMARY KEY,
              stage_id INTEGER NOT NULL REFERENCES stages(id) ON DELETE CASCADE,
              seq INTEGER NOT NULL,
              cpu_req INTEGER NOT NULL,
              must_succeed INTEGER NOT NULL,
              noop INTEGER NOT NULL,
              command TEXT,
              output_dir TEXT,
              log_dir TEXT,
              status TEXT NOT NULL DEFAULT 'no_attempt',
              successful INTEGER NOT NULL DEFAULT 0,
              profile TEXT NOT NULL DEFAULT '{}',
              UNIQUE (stage_id, seq)
            );

            CREATE TABLE IF NOT EXISTS task_files(
              id INTEGER PRIMARY KEY,
              task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
              name TEXT NOT NULL,
              basename TEXT NOT NULL,
              path TEXT,
              UNIQUE (task_id, name)
            );
            "#,
        )?;
        Ok(())
    }

    // Executions
    // ----------------------------------------------------------------

    pub fn find_execution_by_name(&self, name: &str) -> Result<Option<Execution>> {
        let row = self
            .conn
            .prepare(
                "SELECT id, name, description, successful, output_dir, created_on,
                        started_on, finished_on, max_cpus, info, status
                 FROM executions WHERE name = ?1",
            )?
            .query_row(params![name], ExecutionRow::from_row)
            .optional()?;
        row.map(ExecutionRow::into_execution).transpose()
    }

    /// Insert a new execution row. An `id != 0` is honoured (restart reuses
    /// the prior id); otherwise the synthesised rowid is written back.
    pub fn insert_execution(&mut self, ex: &mut Execution) -> Result<()> {
        if ex.id != 0 {
            self.conn.execute(
                "INSERT INTO executions(id, name, description, successful, output_dir,
                                        created_on, started_on, finished_on, max_cpus, info, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    ex.id,
                    ex.name,
                    ex.description,
                    ex.successful,
                    path_str(&ex.output_dir),
                    ts(&ex.created_on),
                    ex.started_on.as_ref().map(ts),
                    ex.finished_on.as_ref().map(ts),
                    ex.max_cpus,
                    serde_json::to_string(&ex.info)?,
                    ex.status().as_str(),
                ],
            )?;
        } else {
            self.conn.execute(
                "INSERT INTO executions(name, description, successful, output_dir,
                                        created_on, started_on, finished_on, max_cpus, info, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    ex.name,
                    ex.description,
                    ex.successful,
                    path_str(&ex.output_dir),
                    ts(&ex.created_on),
                    ex.started_on.as_ref().map(ts),
                    ex.finished_on.as_ref().map(ts),
                    ex.max_cpus,
                    serde_json::to_string(&ex.info)?,
                    ex.status().as_str(),
                ],
            )?;
            ex.id = self.conn.last_insert_rowid();
        }
        Ok(())
    }

    /// Write the execution's mutable fields back. `name` and `output_dir`
    /// are immutable after creation and deliberately not part of the update.
    pub fn commit_execution(&mut self, ex: &Execution) -> Result<()> {
        self.conn.execute(
            "UPDATE executions
             SET description = ?2, successful = ?3, started_on = ?4,
                 finished_on = ?5, max_cpus = ?6, info = ?7, status = ?8
             WHERE id = ?1",
            params![
                ex.id,
                ex.description,
                ex.successful,
                ex.started_on.as_ref().map(ts),
                ex.finished_on.as_ref().map(ts),
                ex.max_cpus,
                serde_json::to_string(&ex.info)?,
                ex.status().as_str(),
            ],
        )?;
        Ok(())
    }

    /// Delete an execution row; stages, tasks and files cascade.
    pub fn delete_execution(&mut self, ex: &Execution) -> Result<()> {
        // Before-delete event hook; observers only log.
        debug!(execution = %ex.name, id = ex.id, "deleting execution record");
        self.conn
            .execute("DELETE FROM executions WHERE id = ?1", params![ex.id])?;
        Ok(())
    }

    // Stages
    // ----------------------------------------------------------------

    /// Insert every stage that does not have an id yet, writing assigned
    /// ids back.
    pub fn insert_stages(&mut self, stages: &mut [Stage]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for stage in stages.iter_mut().filter(|s| s.id == 0) {
            tx.execute(
                "INSERT INTO stages(execution_id, name) VALUES (?1, ?2)",
                params![stage.execution_id, stage.name],
            )?;
            stage.id = tx.last_insert_rowid();
        }
        tx.commit()?;
        Ok(())
    }

    pub fn find_stage_by_name(
        &self,
        execution_id: ExecutionId,
        name: &str,
    ) -> Result<Option<Stage>> {
        let stage = self
            .conn
            .prepare("SELECT id, execution_id, name FROM stages WHERE execution_id = ?1 AND name = ?2")?
            .query_row(params![execution_id, name], |row| {
                Ok(Stage {
                    id: row.get(0)?,
                    execution_id: row.get(1)?,
                    name: row.get(2)?,
                })
            })
            .optional()?;
        Ok(stage)
    }

    pub fn load_stages(&self, execution_id: ExecutionId) -> Result<Vec<Stage>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, execution_id, name FROM stages WHERE execution_id = ?1 ORDER BY id")?;
        let stages = stmt
            .query_map(params![execution_id], |row| {
                Ok(Stage {
                    id: row.get(0)?,
                    execution_id: row.get(1)?,
                    name: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stages)
    }

    // Tasks
    // ----------------------------------------------------------------

    /// Insert every task that does not have an id yet (including its
    /// declared output files), writing assigned ids back.
    pub fn insert_tasks(&mut self, tasks: &mut [Task]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for task in tasks.iter_mut().filter(|t| t.id == 0) {
            tx.execute(
                "INSERT INTO tasks(stage_id, seq, cpu_req, must_succeed, noop, command,
                                   output_dir, log_dir, status, successful, profile)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    task.stage_id,
                    task.seq,
                    task.cpu_req,
                    task.must_succeed,
                    task.noop,
                    task.command,
                    task.output_dir.as_deref().map(path_str),
                    task.log_dir.as_deref().map(path_str),
                    task.status().as_str(),
                    task.successful,
                    serde_json::to_string(&task.profile)?,
                ],
            )?;
            task.id = tx.last_insert_rowid();
            for file in &task.output_files {
                tx.execute(
                    "INSERT INTO task_files(task_id, name, basename, path)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        task.id,
                        file.name,
                        file.basename,
                        file.path.as_deref().map(path_str)
                    ],
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Write one task's mutable fields (and its file paths) back.
    pub fn commit_task(&mut self, task: &Task) -> Result<()> {
        update_task(&self.conn, task)
    }

    /// Commit several tasks inside one transaction.
    pub fn commit_tasks<'t>(&mut self, tasks: impl IntoIterator<Item = &'t Task>) -> Result<()> {
        let tx = self.conn.transaction()?;
        for task in tasks {
            update_task(&tx, task)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// All tasks of an execution, in id order, with their output files.
    pub fn load_tasks(&self, execution_id: ExecutionId) -> Result<Vec<Task>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.id, t.stage_id, s.name, t.seq, t.cpu_req, t.must_succeed, t.noop,
                    t.command, t.output_dir, t.log_dir, t.status, t.successful, t.profile
             FROM tasks t JOIN stages s ON s.id = t.stage_id
             WHERE s.execution_id = ?1
             ORDER BY t.id",
        )?;
        let rows = stmt
            .query_map(params![execution_id], TaskRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut files_stmt = self.conn.prepare(
            "SELECT name, basename, path FROM task_files WHERE task_id = ?1 ORDER BY id",
        )?;
        let mut tasks = Vec::with_capacity(rows.len());
        for row in rows {
            let files = files_stmt
                .query_map(params![row.id], |r| {
                    Ok(TaskFile {
                        name: r.get(0)?,
                        basename: r.get(1)?,
                        path: r.get::<_, Option<String>>(2)?.map(Into::into),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            tasks.push(row.into_task(files)?);
        }
        Ok(tasks)
    }

    /// First output file with the given logical name across an execution's
    /// tasks, in task-id order.
    pub fn find_output(&self, execution_id: ExecutionId, name: &str) -> Result<Option<TaskFile>> {
        let file = self
            .conn
            .prepare(
                "SELECT f.name, f.basename, f.path
                 FROM task_files f
                 JOIN tasks t ON t.id = f.task_id
                 JOIN stages s ON s.id = t.stage_id
                 WHERE s.execution_id = ?1 AND f.name = ?2
                 ORDER BY t.id LIMIT 1",
            )?
            .query_row(params![execution_id, name], |row| {
                Ok(TaskFile {
                    name: row.get(0)?,
                    basename: row.get(1)?,
                    path: row.get::<_, Option<String>>(2)?.map(Into::into),
                })
            })
            .optional()?;
        Ok(file)
    }

    /// Prune every task of an execution that did not succeed. Used on
    /// resume; returns the number of rows removed.
    pub fn delete_unsuccessful_tasks(&mut self, execution_id: ExecutionId) -> Result<usize> {
        let n = self.conn.execute(
            "DELETE FROM tasks
             WHERE successful = 0
               AND stage_id IN (SELECT id FROM stages WHERE execution_id = ?1)",
            params![execution_id],
        )?;
        Ok(n)
    }
}

fn update_task(conn: &Connection, task: &Task) -> Result<()> {
    conn.execute(
        "UPDATE tasks
         SET command = ?2, output_dir = ?3, log_dir = ?4, status = ?5,
             successful = ?6, profile = ?7
         WHERE id = ?1",
        params![
            task.id,
            task.command,
            task.output_dir.as_deref().map(path_str),
            task.log_dir.as_deref().map(path_str),
            task.status().as_str(),
            task.successful,
            serde_json::to_string(&task.profile)?,
        ],
    )?;
    for file in &task.output_files {
        conn.execute(
            "UPDATE task_files SET path = ?3 WHERE task_id = ?1 AND name = ?2",
            params![task.id, file.name, file.path.as_deref().map(path_str)],
        )?;
    }
    Ok(())
}

// Row mapping
// ----------------------------------------------------------------

struct ExecutionRow {
    id: i64,
    name: String,
    description: Option<String>,
    successful: bool,
    output_dir: String,
    created_on: String,
    started_on: Option<String>,
    finished_on: Option<String>,
    max_cpus: Option<u32>,
    info: String,
    status: String,
}

impl ExecutionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            successful: row.get(3)?,
            output_dir: row.get(4)?,
            created_on: row.get(5)?,
            started_on: row.get(6)?,
            finished_on: row.get(7)?,
            max_cpus: row.get(8)?,
            info: row.get(9)?,
            status: row.get(10)?,
        })
    }

    fn into_execution(self) -> Result<Execution> {
        let mut ex = Execution::new(
            self.id,
            self.name,
            self.output_dir.into(),
            self.max_cpus,
            self.description,
        )?;
        ex.successful = self.successful;
        ex.created_on = parse_ts(&self.created_on)?;
        ex.started_on = self.started_on.as_deref().map(parse_ts).transpose()?;
        ex.finished_on = self.finished_on.as_deref().map(parse_ts).transpose()?;
        ex.info = parse_json_map(&self.info)?;
        ex.restore_status(ExecutionStatus::parse(&self.status)?);
        Ok(ex)
    }
}

struct TaskRow {
    id: i64,
    stage_id: i64,
    stage_name: String,
    seq: u32,
    cpu_req: u32,
    must_succeed: bool,
    noop: bool,
    command: Option<String>,
    output_dir: Option<String>,
    log_dir: Option<String>,
    status: String,
    successful: bool,
    profile: String,
}

impl TaskRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            stage_id: row.get(1)?,
            stage_name: row.get(2)?,
            seq: row.get(3)?,
            cpu_req: row.get(4)?,
            must_succeed: row.get(5)?,
            noop: row.get(6)?,
            command: row.get(7)?,
            output_dir: row.get(8)?,
            log_dir: row.get(9)?,
            status: row.get(10)?,
            successful: row.get(11)?,
            profile: row.get(12)?,
        })
    }

    fn into_task(self, output_files: Vec<TaskFile>) -> Result<Task> {
        let mut task = Task::new(
            self.stage_id,
            self.stage_name,
            self.seq,
            self.cpu_req,
            self.must_succeed,
            self.noop,
        );
        task.id = self.id;
        task.command = self.command;
        task.output_dir = self.output_dir.map(Into::into);
        task.log_dir = self.log_dir.map(Into::into);
        task.output_files = output_files;
        task.profile = parse_json_map(&self.profile)?;
        task.restore_status(TaskStatus::parse(&self.status)?, self.successful);
        Ok(task)
    }
}

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RundagError::Config(format!("corrupt timestamp '{s}': {e}")))
}

fn parse_json_map(s: &str) -> Result<Map<String, Value>> {
    Ok(serde_json::from_str(s)?)
}

fn path_str(p: impl AsRef<Path>) -> String {
    p.as_ref().to_string_lossy().into_owned()
}
