//! SQLite repository
//!
//! Each entity is stored as its JSON document next to the columns used for
//! lookups and constraints. Partial unique indexes back the domain
//! invariants: one PRODUCTION version per hospital, one active assignment
//! per (person, shift, date) and one COMPLETE batch per payload.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::{StorageError, StorageResult};
use crate::coverage::CoverageSnapshot;
use super::repository::{
    duplicate_assignment, plan_promotion, CoverageDataSource, ImportCommit, PromotionOutcome,
    ScheduleRepository,
};
use crate::models::{
    Assignment, AssignmentId, BatchState, DateRange, HospitalId, Person, PersonId,
    ScheduleVersion, ScheduleVersionId, ScrapeBatch, ScrapeBatchId, ShiftInstance, UserId,
    VersionStatus,
};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS persons (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        active INTEGER NOT NULL,
        deleted_at TEXT,
        body TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS scrape_batches (
        id TEXT PRIMARY KEY,
        hospital_id TEXT NOT NULL,
        state TEXT NOT NULL,
        window_start TEXT NOT NULL,
        window_end TEXT NOT NULL,
        checksum TEXT NOT NULL,
        scraped_at TEXT NOT NULL,
        deleted_at TEXT,
        body TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_scrape_batches_checksum
        ON scrape_batches(hospital_id, checksum);

    CREATE UNIQUE INDEX IF NOT EXISTS idx_scrape_batches_one_complete
        ON scrape_batches(hospital_id, window_start, window_end, checksum)
        WHERE state = 'COMPLETE' AND deleted_at IS NULL;

    CREATE TABLE IF NOT EXISTS schedule_versions (
        id TEXT PRIMARY KEY,
        hospital_id TEXT NOT NULL,
        status TEXT NOT NULL,
        scrape_batch_id TEXT REFERENCES scrape_batches(id),
        created_at TEXT NOT NULL,
        deleted_at TEXT,
        body TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_schedule_versions_hospital
        ON schedule_versions(hospital_id, status);

    CREATE UNIQUE INDEX IF NOT EXISTS idx_schedule_versions_one_production
        ON schedule_versions(hospital_id) WHERE status = 'PRODUCTION';

    CREATE TABLE IF NOT EXISTS shift_instances (
        id TEXT PRIMARY KEY,
        schedule_version_id TEXT NOT NULL REFERENCES schedule_versions(id),
        schedule_date TEXT NOT NULL,
        deleted_at TEXT,
        body TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_shift_instances_version_date
        ON shift_instances(schedule_version_id, schedule_date);

    CREATE TABLE IF NOT EXISTS assignments (
        id TEXT PRIMARY KEY,
        person_id TEXT NOT NULL REFERENCES persons(id),
        shift_instance_id TEXT NOT NULL REFERENCES shift_instances(id),
        schedule_date TEXT NOT NULL,
        deleted_at TEXT,
        body TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_assignments_shift
        ON assignments(shift_instance_id, schedule_date);

    CREATE UNIQUE INDEX IF NOT EXISTS idx_assignments_active
        ON assignments(person_id, shift_instance_id, schedule_date)
        WHERE deleted_at IS NULL;

    CREATE TABLE IF NOT EXISTS coverage_snapshots (
        id TEXT PRIMARY KEY,
        schedule_version_id TEXT NOT NULL REFERENCES schedule_versions(id),
        hospital_id TEXT NOT NULL,
        calculation_date TEXT NOT NULL,
        calculated_at TEXT NOT NULL,
        body TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_coverage_snapshots_version
        ON coverage_snapshots(schedule_version_id, calculated_at);

    CREATE INDEX IF NOT EXISTS idx_coverage_snapshots_hospital_date
        ON coverage_snapshots(hospital_id, calculation_date);
"#;

/// Upper bound on bound parameters per `IN (...)` query
const CHUNK_SIZE: usize = 500;

/// SQLite implementation of [`ScheduleRepository`]
///
/// Uses `Mutex` to serialize access to the connection. Units of work run in
/// IMMEDIATE transactions.
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Open (or create) a database file
    pub fn new(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Unavailable(format!(
                        "cannot create {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        let repo = Self::with_connection(conn)?;

        tracing::info!(path = %path.display(), "SQLite repository initialized");
        Ok(repo)
    }

    /// Create in-memory database (for testing)
    pub fn in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("connection lock poisoned".to_string()))
    }
}

// ============================================================================
// Row helpers
// ============================================================================

fn encode<T: Serialize>(value: &T) -> StorageResult<String> {
    Ok(serde_json::to_string(value)?)
}

fn decode<T: DeserializeOwned>(body: &str) -> StorageResult<T> {
    Ok(serde_json::from_str(body)?)
}

fn timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn optional_timestamp(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(timestamp)
}

fn query_bodies<T: DeserializeOwned, P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> StorageResult<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let bodies = stmt
        .query_map(params, |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    bodies.iter().map(|b| decode(b)).collect()
}

fn query_body<T: DeserializeOwned, P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> StorageResult<Option<T>> {
    let body: Option<String> = conn
        .query_row(sql, params, |row| row.get(0))
        .optional()?;
    body.as_deref().map(decode).transpose()
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn insert_batch(conn: &Connection, batch: &ScrapeBatch) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO scrape_batches
            (id, hospital_id, state, window_start, window_end, checksum, scraped_at, deleted_at, body)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            batch.id.to_string(),
            batch.hospital_id.to_string(),
            batch.state.as_str(),
            batch.window_start.to_string(),
            batch.window_end.to_string(),
            batch.checksum,
            timestamp(batch.scraped_at),
            optional_timestamp(batch.lifecycle.deleted_at),
            encode(batch)?,
        ],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            StorageError::conflict(format!("batch {} already exists", batch.id))
        } else {
            e.into()
        }
    })?;
    Ok(())
}

fn write_batch(conn: &Connection, batch: &ScrapeBatch) -> StorageResult<()> {
    let updated = conn
        .execute(
            "UPDATE scrape_batches SET state = ?2, deleted_at = ?3, body = ?4 WHERE id = ?1",
            params![
                batch.id.to_string(),
                batch.state.as_str(),
                optional_timestamp(batch.lifecycle.deleted_at),
                encode(batch)?,
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                StorageError::conflict(format!(
                    "another COMPLETE batch holds the payload of batch {}",
                    batch.id
                ))
            } else {
                e.into()
            }
        })?;
    if updated == 0 {
        return Err(StorageError::not_found("batch", batch.id));
    }
    Ok(())
}

fn insert_version(conn: &Connection, version: &ScheduleVersion) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO schedule_versions
            (id, hospital_id, status, scrape_batch_id, created_at, deleted_at, body)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            version.id.to_string(),
            version.hospital_id.to_string(),
            version.status.as_str(),
            version.scrape_batch_id.map(|id| id.to_string()),
            timestamp(version.lifecycle.created_at),
            optional_timestamp(version.lifecycle.deleted_at),
            encode(version)?,
        ],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            StorageError::conflict(format!("version {} already exists", version.id))
        } else {
            e.into()
        }
    })?;
    Ok(())
}

fn write_version(conn: &Connection, version: &ScheduleVersion) -> StorageResult<()> {
    let updated = conn
        .execute(
            "UPDATE schedule_versions SET status = ?2, deleted_at = ?3, body = ?4 WHERE id = ?1",
            params![
                version.id.to_string(),
                version.status.as_str(),
                optional_timestamp(version.lifecycle.deleted_at),
                encode(version)?,
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                StorageError::conflict(format!(
                    "hospital {} already has a PRODUCTION version",
                    version.hospital_id
                ))
            } else {
                e.into()
            }
        })?;
    if updated == 0 {
        return Err(StorageError::not_found("version", version.id));
    }
    Ok(())
}

fn insert_shift(conn: &Connection, shift: &ShiftInstance) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO shift_instances (id, schedule_version_id, schedule_date, deleted_at, body)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            shift.id.to_string(),
            shift.schedule_version_id.to_string(),
            shift.schedule_date.to_string(),
            optional_timestamp(shift.lifecycle.deleted_at),
            encode(shift)?,
        ],
    )?;
    Ok(())
}

fn insert_assignment(conn: &Connection, assignment: &Assignment) -> StorageResult<()> {
    conn.execute(
        "INSERT INTO assignments
            (id, person_id, shift_instance_id, schedule_date, deleted_at, body)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            assignment.id.to_string(),
            assignment.person_id.to_string(),
            assignment.shift_instance_id.to_string(),
            assignment.schedule_date.to_string(),
            optional_timestamp(assignment.lifecycle.deleted_at),
            encode(assignment)?,
        ],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            duplicate_assignment(assignment)
        } else {
            e.into()
        }
    })?;
    Ok(())
}

fn load_version(conn: &Connection, id: ScheduleVersionId) -> StorageResult<Option<ScheduleVersion>> {
    query_body(
        conn,
        "SELECT body FROM schedule_versions WHERE id = ?1",
        params![id.to_string()],
    )
}

fn range_bounds(range: Option<DateRange>) -> (String, String) {
    match range {
        Some(r) => (r.start.to_string(), r.end.to_string()),
        None => ("0000-01-01".to_string(), "9999-12-31".to_string()),
    }
}

// ============================================================================
// Trait implementations
// ============================================================================

#[async_trait]
impl CoverageDataSource for SqliteRepository {
    async fn live_version(
        &self,
        version_id: ScheduleVersionId,
    ) -> StorageResult<Option<ScheduleVersion>> {
        let conn = self.conn()?;
        query_body(
            &conn,
            "SELECT body FROM schedule_versions WHERE id = ?1 AND deleted_at IS NULL",
            params![version_id.to_string()],
        )
    }

    async fn shifts_for_version(
        &self,
        version_id: ScheduleVersionId,
        range: Option<DateRange>,
    ) -> StorageResult<Vec<ShiftInstance>> {
        let conn = self.conn()?;
        let (start, end) = range_bounds(range);
        let mut shifts: Vec<ShiftInstance> = query_bodies(
            &conn,
            "SELECT body FROM shift_instances
             WHERE schedule_version_id = ?1 AND deleted_at IS NULL
               AND schedule_date BETWEEN ?2 AND ?3",
            params![version_id.to_string(), start, end],
        )?;
        shifts.sort_by_key(|s| (s.schedule_date, s.shift_type, s.start_time, s.id));
        Ok(shifts)
    }

    async fn active_assignments_for_version(
        &self,
        version_id: ScheduleVersionId,
        range: Option<DateRange>,
    ) -> StorageResult<Vec<Assignment>> {
        let conn = self.conn()?;
        let (start, end) = range_bounds(range);
        let mut assignments: Vec<Assignment> = query_bodies(
            &conn,
            "SELECT a.body FROM assignments a
             JOIN shift_instances s ON s.id = a.shift_instance_id
             WHERE s.schedule_version_id = ?1 AND a.deleted_at IS NULL
               AND a.schedule_date BETWEEN ?2 AND ?3",
            params![version_id.to_string(), start, end],
        )?;
        assignments.sort_by_key(|a| (a.schedule_date, a.shift_instance_id, a.person_id, a.id));
        Ok(assignments)
    }

    async fn persons_by_ids(&self, ids: &[PersonId]) -> StorageResult<Vec<Person>> {
        let conn = self.conn()?;
        let mut ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
        ids.sort();
        ids.dedup();

        let mut persons = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(CHUNK_SIZE) {
            let placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let sql = format!("SELECT body FROM persons WHERE id IN ({placeholders})");
            persons.extend(query_bodies::<Person, _>(
                &conn,
                &sql,
                params_from_iter(chunk.iter()),
            )?);
        }
        persons.sort_by_key(|p| p.id);
        Ok(persons)
    }
}

#[async_trait]
impl ScheduleRepository for SqliteRepository {
    async fn upsert_person(&self, person: &Person) -> StorageResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO persons (id, name, active, deleted_at, body)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                active = excluded.active,
                deleted_at = excluded.deleted_at,
                body = excluded.body",
            params![
                person.id.to_string(),
                person.name,
                person.active,
                optional_timestamp(person.lifecycle.deleted_at),
                encode(person)?,
            ],
        )?;
        Ok(())
    }

    async fn active_persons(&self) -> StorageResult<Vec<Person>> {
        let conn = self.conn()?;
        query_bodies(
            &conn,
            "SELECT body FROM persons WHERE active = 1 AND deleted_at IS NULL ORDER BY name, id",
            [],
        )
    }

    async fn all_persons(&self) -> StorageResult<Vec<Person>> {
        let conn = self.conn()?;
        query_bodies(
            &conn,
            "SELECT body FROM persons WHERE deleted_at IS NULL ORDER BY name, id",
            [],
        )
    }

    async fn create_batch(&self, batch: &ScrapeBatch) -> StorageResult<()> {
        let conn = self.conn()?;
        insert_batch(&conn, batch)
    }

    async fn update_batch(&self, batch: &ScrapeBatch) -> StorageResult<()> {
        let conn = self.conn()?;
        write_batch(&conn, batch)
    }

    async fn get_batch(&self, id: ScrapeBatchId) -> StorageResult<Option<ScrapeBatch>> {
        let conn = self.conn()?;
        query_body(
            &conn,
            "SELECT body FROM scrape_batches WHERE id = ?1",
            params![id.to_string()],
        )
    }

    async fn find_complete_batch(
        &self,
        hospital_id: HospitalId,
        window_start: NaiveDate,
        window_end: NaiveDate,
        checksum: &str,
    ) -> StorageResult<Option<ScrapeBatch>> {
        let conn = self.conn()?;
        query_body(
            &conn,
            "SELECT body FROM scrape_batches
             WHERE hospital_id = ?1 AND window_start = ?2 AND window_end = ?3
               AND checksum = ?4 AND state = ?5 AND deleted_at IS NULL
             ORDER BY scraped_at LIMIT 1",
            params![
                hospital_id.to_string(),
                window_start.to_string(),
                window_end.to_string(),
                checksum,
                BatchState::Complete.as_str(),
            ],
        )
    }

    async fn get_version(&self, id: ScheduleVersionId) -> StorageResult<Option<ScheduleVersion>> {
        let conn = self.conn()?;
        load_version(&conn, id)
    }

    async fn list_versions(
        &self,
        hospital_id: HospitalId,
        status: Option<VersionStatus>,
    ) -> StorageResult<Vec<ScheduleVersion>> {
        let conn = self.conn()?;
        query_bodies(
            &conn,
            "SELECT body FROM schedule_versions
             WHERE hospital_id = ?1 AND deleted_at IS NULL
               AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at DESC, id",
            params![hospital_id.to_string(), status.map(|s| s.as_str())],
        )
    }

    async fn version_for_batch(
        &self,
        batch_id: ScrapeBatchId,
    ) -> StorageResult<Option<ScheduleVersion>> {
        let conn = self.conn()?;
        query_body(
            &conn,
            "SELECT body FROM schedule_versions WHERE scrape_batch_id = ?1 LIMIT 1",
            params![batch_id.to_string()],
        )
    }

    async fn commit_import(&self, commit: ImportCommit) -> StorageResult<()> {
        commit.check()?;
        if commit.batch.state != BatchState::Complete {
            return Err(StorageError::conflict("committed batch must be COMPLETE"));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let stored_state: Option<String> = tx
            .query_row(
                "SELECT state FROM scrape_batches WHERE id = ?1",
                params![commit.batch.id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match stored_state.as_deref().and_then(BatchState::parse) {
            None => return Err(StorageError::not_found("batch", commit.batch.id)),
            Some(BatchState::Pending) => {}
            Some(other) => {
                return Err(StorageError::conflict(format!(
                    "batch {} is already {other}",
                    commit.batch.id
                )))
            }
        }

        let duplicate: Option<ScrapeBatch> = query_body(
            &tx,
            "SELECT body FROM scrape_batches
             WHERE hospital_id = ?1 AND window_start = ?2 AND window_end = ?3
               AND checksum = ?4 AND state = ?5 AND deleted_at IS NULL AND id <> ?6
             ORDER BY scraped_at LIMIT 1",
            params![
                commit.batch.hospital_id.to_string(),
                commit.batch.window_start.to_string(),
                commit.batch.window_end.to_string(),
                commit.batch.checksum,
                BatchState::Complete.as_str(),
                commit.batch.id.to_string(),
            ],
        )?;
        if let Some(existing) = duplicate {
            return Err(StorageError::DuplicateBatch {
                existing: existing.id,
            });
        }

        write_batch(&tx, &commit.batch)?;
        insert_version(&tx, &commit.version)?;
        for shift in &commit.shifts {
            insert_shift(&tx, shift)?;
        }
        for assignment in &commit.assignments {
            insert_assignment(&tx, assignment)?;
        }

        // Dropping `tx` on any early return rolls everything back.
        tx.commit()?;
        Ok(())
    }

    async fn promote_exclusive(
        &self,
        version_id: ScheduleVersionId,
        actor: UserId,
    ) -> StorageResult<PromotionOutcome> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let target = load_version(&tx, version_id)?
            .filter(|v| !v.is_deleted())
            .ok_or_else(|| StorageError::not_found("version", version_id))?;
        let production: Vec<ScheduleVersion> = query_bodies(
            &tx,
            "SELECT body FROM schedule_versions WHERE hospital_id = ?1 AND status = ?2",
            params![
                target.hospital_id.to_string(),
                VersionStatus::Production.as_str()
            ],
        )?;

        let outcome = plan_promotion(&target, &production, actor)?;

        // Archive first so the one-PRODUCTION index never sees two rows.
        for archived in &outcome.archived {
            write_version(&tx, archived)?;
        }
        write_version(&tx, &outcome.promoted)?;

        tx.commit()?;
        Ok(outcome)
    }

    async fn archive_version(
        &self,
        version_id: ScheduleVersionId,
        actor: UserId,
    ) -> StorageResult<ScheduleVersion> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut version = load_version(&tx, version_id)?
            .ok_or_else(|| StorageError::not_found("version", version_id))?;
        version.archive(actor)?;
        write_version(&tx, &version)?;
        tx.commit()?;
        Ok(version)
    }

    async fn soft_delete_version(
        &self,
        version_id: ScheduleVersionId,
        actor: UserId,
    ) -> StorageResult<ScheduleVersion> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut version = load_version(&tx, version_id)?
            .ok_or_else(|| StorageError::not_found("version", version_id))?;
        version.soft_delete(actor);
        write_version(&tx, &version)?;
        tx.commit()?;
        Ok(version)
    }

    async fn add_assignment(&self, assignment: &Assignment) -> StorageResult<()> {
        let conn = self.conn()?;
        let shift_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM shift_instances WHERE id = ?1)",
            params![assignment.shift_instance_id.to_string()],
            |row| row.get(0),
        )?;
        if !shift_exists {
            return Err(StorageError::not_found(
                "shift instance",
                assignment.shift_instance_id,
            ));
        }
        let person_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM persons WHERE id = ?1)",
            params![assignment.person_id.to_string()],
            |row| row.get(0),
        )?;
        if !person_exists {
            return Err(StorageError::not_found("person", assignment.person_id));
        }
        insert_assignment(&conn, assignment)
    }

    async fn soft_delete_assignment(&self, id: AssignmentId, actor: UserId) -> StorageResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut assignment: Assignment = query_body(
            &tx,
            "SELECT body FROM assignments WHERE id = ?1",
            params![id.to_string()],
        )?
        .ok_or_else(|| StorageError::not_found("assignment", id))?;

        assignment.lifecycle.soft_delete(actor);
        tx.execute(
            "UPDATE assignments SET deleted_at = ?2, body = ?3 WHERE id = ?1",
            params![
                id.to_string(),
                optional_timestamp(assignment.lifecycle.deleted_at),
                encode(&assignment)?,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    async fn save_coverage_snapshot(&self, snapshot: &CoverageSnapshot) -> StorageResult<()> {
        let conn = self.conn()?;
        let version_exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM schedule_versions WHERE id = ?1)",
            params![snapshot.schedule_version_id.to_string()],
            |row| row.get(0),
        )?;
        if !version_exists {
            return Err(StorageError::not_found(
                "version",
                snapshot.schedule_version_id,
            ));
        }
        conn.execute(
            "INSERT INTO coverage_snapshots
                (id, schedule_version_id, hospital_id, calculation_date, calculated_at, body)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                snapshot.id.to_string(),
                snapshot.schedule_version_id.to_string(),
                snapshot.hospital_id.to_string(),
                snapshot.calculation_date().to_string(),
                timestamp(snapshot.calculated_at),
                encode(snapshot)?,
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                StorageError::conflict(format!("coverage snapshot {} already exists", snapshot.id))
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    async fn latest_coverage_snapshot(
        &self,
        version_id: ScheduleVersionId,
    ) -> StorageResult<Option<CoverageSnapshot>> {
        let conn = self.conn()?;
        query_body(
            &conn,
            "SELECT body FROM coverage_snapshots WHERE schedule_version_id = ?1
             ORDER BY calculated_at DESC, rowid DESC LIMIT 1",
            params![version_id.to_string()],
        )
    }

    async fn coverage_snapshots_on(
        &self,
        hospital_id: HospitalId,
        date: NaiveDate,
    ) -> StorageResult<Vec<CoverageSnapshot>> {
        let conn = self.conn()?;
        query_bodies(
            &conn,
            "SELECT body FROM coverage_snapshots
             WHERE hospital_id = ?1 AND calculation_date = ?2
             ORDER BY calculated_at DESC, rowid DESC",
            params![hospital_id.to_string(), date.to_string()],
        )
    }
}
