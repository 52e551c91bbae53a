use clockface_core::{Descriptor, DescriptorError, EnrolledFace};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tokio_rusqlite::Connection;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] tokio_rusqlite::Error),
    #[error("descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),
}

/// Enrollment metadata, without the descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentInfo {
    pub id: String,
    pub employee_id: String,
    pub created_at: String,
}

/// SQLite-backed roster of enrolled faces, one row per employee.
///
/// Descriptors are stored in the string-keyed JSON map encoding
/// (`{"0": v0, "1": v1, ...}`).
#[derive(Clone)]
pub struct RosterStore {
    conn: Connection,
}

impl RosterStore {
    /// Open (or create) the database at the given path and run migrations.
    pub async fn open(db_path: &Path) -> Result<Self, StoreError> {
        if db_path != Path::new(":memory:") {
            if let Some(parent) = db_path.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    tracing::warn!(path = %parent.display(), error = %e, "could not create database directory");
                }
            }
        }

        let conn = Connection::open(db_path).await?;
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 CREATE TABLE IF NOT EXISTS enrolled_faces (
                     id TEXT PRIMARY KEY,
                     employee_id TEXT NOT NULL UNIQUE,
                     descriptor TEXT NOT NULL,
                     created_at TEXT NOT NULL
                 );",
            )?;
            Ok(())
        })
        .await?;

        tracing::debug!(path = %db_path.display(), "roster store opened");
        Ok(Self { conn })
    }

    /// Store `descriptor` for `employee_id`, replacing any earlier enrollment.
    /// Returns the new row id.
    pub async fn enroll(
        &self,
        employee_id: &str,
        descriptor: &Descriptor,
    ) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        let encoded = descriptor.to_storage_json()?;

        let id_clone = id.clone();
        let employee = employee_id.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO enrolled_faces (id, employee_id, descriptor, created_at)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(employee_id) DO UPDATE SET
                         id = excluded.id,
                         descriptor = excluded.descriptor,
                         created_at = excluded.created_at",
                    rusqlite::params![id_clone, employee, encoded, created_at],
                )?;
                Ok(())
            })
            .await?;

        tracing::info!(employee_id, id = %id, "face enrolled");
        Ok(id)
    }

    /// The full roster for matching. Rows whose descriptor fails to decode
    /// are skipped.
    pub async fn roster(&self) -> Result<Vec<EnrolledFace>, StoreError> {
        let rows: Vec<(String, String)> = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT employee_id, descriptor FROM enrolled_faces ORDER BY created_at, employee_id",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await?;

        let mut roster = Vec::with_capacity(rows.len());
        for (employee_id, encoded) in rows {
            match Descriptor::from_storage_json(&encoded) {
                Ok(descriptor) => roster.push(EnrolledFace {
                    employee_id,
                    descriptor,
                }),
                Err(e) => {
                    tracing::warn!(employee_id = %employee_id, error = %e, "skipping undecodable descriptor");
                }
            }
        }
        Ok(roster)
    }

    /// Enrollment metadata for every employee, oldest first.
    pub async fn list(&self) -> Result<Vec<EnrollmentInfo>, StoreError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, employee_id, created_at FROM enrolled_faces
                     ORDER BY created_at, employee_id",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(EnrollmentInfo {
                        id: row.get(0)?,
                        employee_id: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                })?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
            .map_err(StoreError::from)
    }

    /// Remove an employee's enrollment. Returns whether a row was deleted.
    pub async fn remove(&self, employee_id: &str) -> Result<bool, StoreError> {
        let employee = employee_id.to_string();
        let removed = self
            .conn
            .call(move |conn| {
                let affected =
                    conn.execute("DELETE FROM enrolled_faces WHERE employee_id = ?1", [&employee])?;
                Ok(affected > 0)
            })
            .await?;
        if removed {
            tracing::info!(employee_id, "enrollment removed");
        }
        Ok(removed)
    }

    pub async fn count(&self) -> Result<u64, StoreError> {
        self.conn
            .call(|conn| {
                let count: u64 =
                    conn.query_row("SELECT COUNT(*) FROM enrolled_faces", [], |row| row.get(0))?;
                Ok(count)
            })
            .await
            .map_err(StoreError::from)
    }
}
