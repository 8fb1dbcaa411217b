//! SQLite-backed repository. Every change set runs inside a single transaction, so a failure
//! part-way through rolls back all earlier writes of the same set.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row, Transaction};
use tracing::{debug, warn};

use crate::workflows::applications::domain::{
    Application, ApplicationAggregate, ApplicationId, ApplicationStatus, Company, CompanyId,
    EventId, InterviewRound, Note, NoteId, Position, PositionId, RoundId, RoundOutcome,
};
use crate::workflows::applications::repository::{
    ApplicationRepository, ChangeSet, RepositoryError, Write,
};
use crate::workflows::applications::timeline::{TimelineEvent, TimelineEventKind};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS companies (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        website TEXT,
        industry TEXT,
        location TEXT,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS positions (
        id TEXT PRIMARY KEY,
        company_id TEXT NOT NULL REFERENCES companies (id),
        title TEXT NOT NULL,
        location TEXT,
        employment_type TEXT,
        salary_min INTEGER,
        salary_max INTEGER,
        posting_url TEXT,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS applications (
        id TEXT PRIMARY KEY,
        company_id TEXT NOT NULL REFERENCES companies (id),
        position_id TEXT NOT NULL REFERENCES positions (id),
        status TEXT NOT NULL,
        current_round INTEGER NOT NULL,
        rejected_round INTEGER,
        applied_on TEXT NOT NULL,
        source TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS interview_rounds (
        id TEXT PRIMARY KEY,
        application_id TEXT NOT NULL REFERENCES applications (id),
        seq_no INTEGER NOT NULL,
        title TEXT NOT NULL,
        is_finished INTEGER NOT NULL,
        feedback TEXT,
        note TEXT,
        scheduled_at TEXT,
        duration_min INTEGER,
        interviewer TEXT,
        outcome TEXT,
        completed_at TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_interview_rounds_application
    ON interview_rounds (application_id, seq_no);
    CREATE TABLE IF NOT EXISTS notes (
        id TEXT PRIMARY KEY,
        application_id TEXT NOT NULL REFERENCES applications (id),
        content TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS timeline_events (
        id TEXT PRIMARY KEY,
        application_id TEXT NOT NULL REFERENCES applications (id),
        kind TEXT NOT NULL,
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        status TEXT,
        occurred_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_timeline_events_application
    ON timeline_events (application_id, occurred_at);
";

const APPLICATION_COLUMNS: &str = "id, company_id, position_id, status, current_round, \
     rejected_round, applied_on, source, created_at, updated_at";

const ROUND_COLUMNS: &str = "id, application_id, seq_no, title, is_finished, feedback, note, \
     scheduled_at, duration_min, interviewer, outcome, completed_at";

pub struct SqliteApplicationStore {
    conn: Mutex<Connection>,
}

impl SqliteApplicationStore {
    /// Opens (or creates) the database file, creating parent directories as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| unavailable("create parent dir", e))?;
        }
        let conn = Connection::open(path).map_err(|e| unavailable("open sqlite db", e))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| unavailable("set journal_mode", e))?;
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|e| unavailable("set synchronous", e))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        let conn = Connection::open_in_memory().map_err(|e| unavailable("open sqlite db", e))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, RepositoryError> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| unavailable("enable foreign keys", e))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| unavailable("ensure schema", e))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Runs raw SQL against the store, e.g. maintenance statements or migrations.
    pub fn execute_batch(&self, sql: &str) -> Result<(), RepositoryError> {
        let conn = self.connection()?;
        conn.execute_batch(sql)
            .map_err(|e| unavailable("execute batch", e))
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
        self.conn
            .lock()
            .map_err(|_| RepositoryError::Unavailable("sqlite connection mutex poisoned".into()))
    }
}

impl ApplicationRepository for SqliteApplicationStore {
    fn load(&self, id: &ApplicationId) -> Result<Option<ApplicationAggregate>, RepositoryError> {
        let conn = self.connection()?;
        let application = conn
            .query_row(
                &format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?1"),
                params![id],
                application_from_row,
            )
            .optional()
            .map_err(|e| unavailable("load application", e))?;

        application
            .map(|application| load_aggregate(&conn, application))
            .transpose()
    }

    fn list(&self) -> Result<Vec<ApplicationAggregate>, RepositoryError> {
        let conn = self.connection()?;
        let applications = {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {APPLICATION_COLUMNS} FROM applications \
                     ORDER BY created_at DESC, rowid DESC"
                ))
                .map_err(|e| unavailable("prepare list", e))?;
            let rows = stmt
                .query_map([], application_from_row)
                .map_err(|e| unavailable("list applications", e))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| unavailable("decode application", e))?
        };

        applications
            .into_iter()
            .map(|application| load_aggregate(&conn, application))
            .collect()
    }

    fn commit(&self, changes: ChangeSet) -> Result<(), RepositoryError> {
        let mut conn = self.connection()?;
        let tx = conn
            .transaction()
            .map_err(|e| unavailable("begin transaction", e))?;

        let count = changes.len();
        for write in changes.writes() {
            if let Err(err) = apply_write(&tx, write) {
                warn!(write = write.label(), error = %err, "rolling back change set");
                return Err(err);
            }
        }

        tx.commit()
            .map_err(|e| unavailable("commit transaction", e))?;
        debug!(writes = count, "change set committed");
        Ok(())
    }
}

fn apply_write(tx: &Transaction<'_>, write: &Write) -> Result<(), RepositoryError> {
    let label = write.label();
    match write {
        Write::InsertCompany(company) => {
            tx.execute(
                "INSERT INTO companies (id, name, website, industry, location, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    company.id,
                    company.name,
                    company.website,
                    company.industry,
                    company.location,
                    company.created_at,
                ],
            )
            .map_err(|e| classify(label, e))?;
        }
        Write::InsertPosition(position) => {
            tx.execute(
                "INSERT INTO positions (id, company_id, title, location, employment_type,
                     salary_min, salary_max, posting_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    position.id,
                    position.company_id,
                    position.title,
                    position.location,
                    position.employment_type,
                    position.salary_min,
                    position.salary_max,
                    position.posting_url,
                    position.created_at,
                ],
            )
            .map_err(|e| classify(label, e))?;
        }
        Write::InsertApplication(application) => {
            tx.execute(
                &format!(
                    "INSERT INTO applications ({APPLICATION_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    application.id,
                    application.company_id,
                    application.position_id,
                    application.status,
                    application.current_round,
                    application.rejected_round,
                    application.applied_on,
                    application.source,
                    application.created_at,
                    application.updated_at,
                ],
            )
            .map_err(|e| classify(label, e))?;
        }
        Write::UpdateApplication(application) => {
            let changed = tx
                .execute(
                    "UPDATE applications
                     SET status = ?2, current_round = ?3, rejected_round = ?4, applied_on = ?5,
                         source = ?6, updated_at = ?7
                     WHERE id = ?1",
                    params![
                        application.id,
                        application.status,
                        application.current_round,
                        application.rejected_round,
                        application.applied_on,
                        application.source,
                        application.updated_at,
                    ],
                )
                .map_err(|e| classify(label, e))?;
            if changed == 0 {
                return Err(RepositoryError::NotFound(format!(
                    "application {}",
                    application.id
                )));
            }
        }
        Write::InsertRound(round) => {
            tx.execute(
                &format!(
                    "INSERT INTO interview_rounds ({ROUND_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
                ),
                params![
                    round.id,
                    round.application_id,
                    round.seq_no,
                    round.title,
                    round.is_finished,
                    round.feedback,
                    round.note,
                    round.scheduled_at,
                    round.duration_min,
                    round.interviewer,
                    round.outcome,
                    round.completed_at,
                ],
            )
            .map_err(|e| classify(label, e))?;
        }
        Write::UpdateRound(round) => {
            if update_round(tx, round, "")? == 0 {
                return Err(RepositoryError::NotFound(format!("round {}", round.id)));
            }
        }
        Write::FinishRound(round) => {
            if update_round(tx, round, " AND is_finished = 0")? == 0 {
                let exists = tx
                    .query_row(
                        "SELECT 1 FROM interview_rounds WHERE id = ?1 AND application_id = ?2",
                        params![round.id, round.application_id],
                        |_| Ok(()),
                    )
                    .optional()
                    .map_err(|e| classify(label, e))?
                    .is_some();
                return Err(if exists {
                    RepositoryError::Conflict(format!("round {} is already finished", round.id))
                } else {
                    RepositoryError::NotFound(format!("round {}", round.id))
                });
            }
        }
        Write::InsertNote(note) => {
            tx.execute(
                "INSERT INTO notes (id, application_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![note.id, note.application_id, note.content, note.created_at],
            )
            .map_err(|e| classify(label, e))?;
        }
        Write::AppendEvent(event) => {
            tx.execute(
                "INSERT INTO timeline_events
                     (id, application_id, kind, title, description, status, occurred_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    event.id,
                    event.application_id,
                    event.kind,
                    event.title,
                    event.description,
                    event.status,
                    event.occurred_at,
                ],
            )
            .map_err(|e| classify(label, e))?;
        }
    }
    Ok(())
}

fn load_aggregate(
    conn: &Connection,
    application: Application,
) -> Result<ApplicationAggregate, RepositoryError> {
    let company = conn
        .query_row(
            "SELECT id, name, website, industry, location, created_at
             FROM companies WHERE id = ?1",
            params![application.company_id],
            |row| {
                Ok(Company {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    website: row.get(2)?,
                    industry: row.get(3)?,
                    location: row.get(4)?,
                    created_at: row.get(5)?,
                })
            },
        )
        .map_err(|e| unavailable("load company", e))?;

    let position = conn
        .query_row(
            "SELECT id, company_id, title, location, employment_type, salary_min, salary_max,
                    posting_url, created_at
             FROM positions WHERE id = ?1",
            params![application.position_id],
            |row| {
                Ok(Position {
                    id: row.get(0)?,
                    company_id: row.get(1)?,
                    title: row.get(2)?,
                    location: row.get(3)?,
                    employment_type: row.get(4)?,
                    salary_min: row.get(5)?,
                    salary_max: row.get(6)?,
                    posting_url: row.get(7)?,
                    created_at: row.get(8)?,
                })
            },
        )
        .map_err(|e| unavailable("load position", e))?;

    let rounds = collect_rows(
        conn,
        &format!(
            "SELECT {ROUND_COLUMNS} FROM interview_rounds
             WHERE application_id = ?1 ORDER BY seq_no"
        ),
        &application.id,
        round_from_row,
    )?;

    let notes = collect_rows(
        conn,
        "SELECT id, application_id, content, created_at FROM notes
         WHERE application_id = ?1 ORDER BY created_at, rowid",
        &application.id,
        |row| {
            Ok(Note {
                id: row.get(0)?,
                application_id: row.get(1)?,
                content: row.get(2)?,
                created_at: row.get(3)?,
            })
        },
    )?;

    let timeline = collect_rows(
        conn,
        "SELECT id, application_id, kind, title, description, status, occurred_at
         FROM timeline_events WHERE application_id = ?1 ORDER BY occurred_at, rowid",
        &application.id,
        |row| {
            Ok(TimelineEvent {
                id: row.get(0)?,
                application_id: row.get(1)?,
                kind: row.get(2)?,
                title: row.get(3)?,
                description: row.get(4)?,
                status: row.get(5)?,
                occurred_at: row.get(6)?,
            })
        },
    )?;

    Ok(ApplicationAggregate {
        application,
        company,
        position,
        rounds,
        notes,
        timeline,
    }
    .normalized())
}

fn collect_rows<T>(
    conn: &Connection,
    sql: &str,
    id: &ApplicationId,
    map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>, RepositoryError> {
    let mut stmt = conn.prepare(sql).map_err(|e| unavailable("prepare", e))?;
    let rows = stmt
        .query_map(params![id], map)
        .map_err(|e| unavailable("query", e))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| unavailable("decode row", e))
}

fn application_from_row(row: &Row<'_>) -> rusqlite::Result<Application> {
    Ok(Application {
        id: row.get(0)?,
        company_id: row.get(1)?,
        position_id: row.get(2)?,
        status: row.get(3)?,
        current_round: row.get(4)?,
        rejected_round: row.get(5)?,
        applied_on: row.get(6)?,
        source: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn round_from_row(row: &Row<'_>) -> rusqlite::Result<InterviewRound> {
    Ok(InterviewRound {
        id: row.get(0)?,
        application_id: row.get(1)?,
        seq_no: row.get(2)?,
        title: row.get(3)?,
        is_finished: row.get(4)?,
        feedback: row.get(5)?,
        note: row.get(6)?,
        scheduled_at: row.get(7)?,
        duration_min: row.get(8)?,
        interviewer: row.get(9)?,
        outcome: row.get(10)?,
        completed_at: row.get(11)?,
    })
}

fn update_round(
    tx: &Transaction<'_>,
    round: &InterviewRound,
    guard: &str,
) -> Result<usize, RepositoryError> {
    tx.execute(
        &format!(
            "UPDATE interview_rounds
             SET seq_no = ?3, title = ?4, is_finished = ?5, feedback = ?6, note = ?7,
                 scheduled_at = ?8, duration_min = ?9, interviewer = ?10,
                 outcome = ?11, completed_at = ?12
             WHERE id = ?1 AND application_id = ?2{guard}"
        ),
        params![
            round.id,
            round.application_id,
            round.seq_no,
            round.title,
            round.is_finished,
            round.feedback,
            round.note,
            round.scheduled_at,
            round.duration_min,
            round.interviewer,
            round.outcome,
            round.completed_at,
        ],
    )
    .map_err(|e| classify("update round", e))
}

fn unavailable(prefix: &str, err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Unavailable(format!("{prefix}: {err}"))
}

fn classify(prefix: &str, err: rusqlite::Error) -> RepositoryError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &err {
        if failure.code == ErrorCode::ConstraintViolation {
            match failure.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE => {
                    return RepositoryError::Conflict(format!("{prefix}: {err}"));
                }
                rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    return RepositoryError::NotFound(format!("{prefix}: {err}"));
                }
                _ => {}
            }
        }
    }
    unavailable(prefix, err)
}

#[derive(Debug, thiserror::Error)]
#[error("unknown stored value '{0}'")]
struct UnknownValue(String);

macro_rules! sql_identifier {
    ($($name:ident),+ $(,)?) => {
        $(
            impl ToSql for $name {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.0.as_str()))
                }
            }

            impl FromSql for $name {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    String::column_result(value).map($name)
                }
            }
        )+
    };
}

sql_identifier!(ApplicationId, RoundId, CompanyId, PositionId, NoteId, EventId);

macro_rules! sql_key {
    ($($name:ident),+ $(,)?) => {
        $(
            impl ToSql for $name {
                fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                    Ok(ToSqlOutput::from(self.as_key()))
                }
            }

            impl FromSql for $name {
                fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                    let raw = value.as_str()?;
                    $name::from_key(raw)
                        .ok_or_else(|| FromSqlError::Other(Box::new(UnknownValue(raw.to_string()))))
                }
            }
        )+
    };
}

sql_key!(ApplicationStatus, RoundOutcome, TimelineEventKind);
