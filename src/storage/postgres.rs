//! Postgres storage

use std::time::Duration;

use chrono::NaiveDateTime;
use chrono::Utc;
use serde_json::Value;
use sqlx::FromRow;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::ipnetwork::IpNetwork;
use uuid::Uuid;

use crate::access_logs::AccessLog;
use crate::access_logs::NoteReadStatus;
use crate::mirror::PublicNote;
use crate::notes::Note;
use crate::statistics::Statistics;
use crate::statistics::StatisticsDelta;

use super::CreateAccessLogValues;
use super::CreateNoteValues;
use super::Error;
use super::Result;
use super::Storage;
use super::UpdateNoteValues;

/// Migrator to run migrations on startup
static MIGRATOR: Migrator = sqlx::migrate!();

/// Postgres storage
#[derive(Clone, Debug)]
pub struct Postgres {
    /// Pool of connections
    connection_pool: PgPool,
}

impl Postgres {
    /// Create Postgres storage
    ///
    /// Use the `DATABASE_URL` environment variable
    ///
    /// Migrations will be run
    pub async fn new() -> Result<Self> {
        let database_connection_string = std::env::var("DATABASE_URL")
            .map_err(|_| Error::Connection("DATABASE_URL is not set".to_string()))?;

        let connection_pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_connection_string)
            .await
            .map_err(connection_error)?;

        Self::new_with_pool(connection_pool).await
    }

    /// Create Postgres storage with existing pool
    ///
    /// Migrations will be run
    pub async fn new_with_pool(connection_pool: PgPool) -> Result<Self> {
        MIGRATOR
            .run(&connection_pool)
            .await
            .map_err(connection_error)?;

        Ok(Self { connection_pool })
    }
}

/// Postgres version of a note
#[derive(FromRow)]
struct PostgresNote {
    id: String,
    owner_id: String,
    title: String,
    tags: Vec<String>,
    description: Option<String>,
    image_url: Option<String>,
    is_public: bool,
    public_password: Option<String>,
    created_at: NaiveDateTime,
    last_modified: NaiveDateTime,
}

impl From<PostgresNote> for Note {
    fn from(note: PostgresNote) -> Self {
        Self {
            id: note.id,
            owner_id: note.owner_id,
            title: note.title,
            tags: note.tags,
            description: note.description,
            image_url: note.image_url,
            is_public: note.is_public,
            public_password: note.public_password,
            created_at: note.created_at,
            last_modified: note.last_modified,
        }
    }
}

/// Postgres version of a statistics summary
#[derive(FromRow)]
struct PostgresStatistics {
    note_count: i64,
    image_count: i64,
    total_image_size: i64,
    last_updated: Option<NaiveDateTime>,
}

impl From<PostgresStatistics> for Statistics {
    fn from(statistics: PostgresStatistics) -> Self {
        Self {
            note_count: statistics.note_count,
            image_count: statistics.image_count,
            total_image_size: statistics.total_image_size,
            last_updated: statistics.last_updated,
        }
    }
}

/// Postgres version of a public note
#[derive(FromRow)]
struct PostgresPublicNote {
    note_id: String,
    owner_id: String,
    title: String,
    description: String,
    image_url: Option<String>,
    password_protected: bool,
    last_updated_at: NaiveDateTime,
}

impl From<PostgresPublicNote> for PublicNote {
    fn from(public_note: PostgresPublicNote) -> Self {
        Self {
            note_id: public_note.note_id,
            owner_id: public_note.owner_id,
            title: public_note.title,
            description: public_note.description,
            image_url: public_note.image_url,
            password_protected: public_note.password_protected,
            last_updated_at: public_note.last_updated_at,
        }
    }
}

/// Postgres version of an access log
#[derive(FromRow)]
struct PostgresAccessLog {
    id: Uuid,
    owner_id: String,
    note_id: String,
    kind: String,
    location: Option<String>,
    client_info: Option<Value>,
    server_ip: Option<IpNetwork>,
    created_at: NaiveDateTime,
}

impl From<PostgresAccessLog> for AccessLog {
    fn from(access_log: PostgresAccessLog) -> Self {
        Self {
            id: access_log.id,
            owner_id: access_log.owner_id,
            note_id: access_log.note_id,
            kind: access_log.kind,
            location: access_log.location,
            client_info: access_log.client_info,
            server_ip: access_log.server_ip.map(|server_ip| server_ip.ip()),
            created_at: access_log.created_at,
        }
    }
}

const NOTE_COLUMNS: &str = "
    id,
    owner_id,
    title,
    tags,
    description,
    image_url,
    is_public,
    public_password,
    created_at,
    last_modified
";

const ACCESS_LOG_COLUMNS: &str = "
    id,
    owner_id,
    note_id,
    type AS kind,
    location,
    client_info,
    server_ip,
    created_at
";

impl Storage for Postgres {
    async fn find_all_notes_by_owner(&self, owner_id: &str) -> Result<Vec<Note>> {
        let notes = sqlx::query_as::<_, PostgresNote>(&format!(
            "
            SELECT {NOTE_COLUMNS}
            FROM notes
            WHERE owner_id = $1
            ORDER BY created_at
            "
        ))
        .bind(owner_id)
        .fetch_all(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(notes.into_iter().map(Note::from).collect())
    }

    async fn find_single_note_by_id(&self, owner_id: &str, note_id: &str) -> Result<Option<Note>> {
        let note = sqlx::query_as::<_, PostgresNote>(&format!(
            "
            SELECT {NOTE_COLUMNS}
            FROM notes
            WHERE owner_id = $1
                AND id = $2
            LIMIT 1
            "
        ))
        .bind(owner_id)
        .bind(note_id)
        .fetch_optional(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(note.map(Note::from))
    }

    async fn create_note(&self, owner_id: &str, values: &CreateNoteValues<'_>) -> Result<Note> {
        let note = sqlx::query_as::<_, PostgresNote>(&format!(
            "
            INSERT INTO notes (
                id, owner_id, title, tags, description, image_url, is_public, public_password
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {NOTE_COLUMNS}
            "
        ))
        .bind(Uuid::new_v4().simple().to_string())
        .bind(owner_id)
        .bind(values.title)
        .bind(values.tags)
        .bind(values.description)
        .bind(values.image_url)
        .bind(values.is_public)
        .bind(values.public_password)
        .fetch_one(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(note.into())
    }

    async fn update_note(
        &self,
        note: &Note,
        values: &UpdateNoteValues<'_>,
    ) -> Result<Option<Note>> {
        let mut updated = note.clone();
        values.apply_to(&mut updated);

        let note = sqlx::query_as::<_, PostgresNote>(&format!(
            "
            UPDATE notes SET
                title = $3,
                tags = $4,
                description = $5,
                image_url = $6,
                is_public = $7,
                public_password = $8,
                last_modified = NOW()
            WHERE owner_id = $1
                AND id = $2
            RETURNING {NOTE_COLUMNS}
            "
        ))
        .bind(&updated.owner_id)
        .bind(&updated.id)
        .bind(&updated.title)
        .bind(&updated.tags)
        .bind(&updated.description)
        .bind(&updated.image_url)
        .bind(updated.is_public)
        .bind(&updated.public_password)
        .fetch_optional(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(note.map(Note::from))
    }

    async fn delete_note(&self, note: &Note) -> Result<()> {
        let mut transaction = self
            .connection_pool
            .begin()
            .await
            .map_err(connection_error)?;

        for table in ["access_logs", "note_read_statuses"] {
            sqlx::query(&format!(
                "DELETE FROM {table} WHERE owner_id = $1 AND note_id = $2"
            ))
            .bind(&note.owner_id)
            .bind(&note.id)
            .execute(&mut *transaction)
            .await
            .map_err(connection_error)?;
        }

        sqlx::query("DELETE FROM notes WHERE owner_id = $1 AND id = $2")
            .bind(&note.owner_id)
            .bind(&note.id)
            .execute(&mut *transaction)
            .await
            .map_err(connection_error)?;

        transaction.commit().await.map_err(connection_error)?;

        Ok(())
    }

    async fn find_statistics(&self, owner_id: &str) -> Result<Option<Statistics>> {
        let statistics = sqlx::query_as::<_, PostgresStatistics>(
            "
            SELECT note_count, image_count, total_image_size, last_updated
            FROM statistics
            WHERE owner_id = $1
            ",
        )
        .bind(owner_id)
        .fetch_optional(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(statistics.map(Statistics::from))
    }

    async fn increment_statistics(&self, owner_id: &str, delta: &StatisticsDelta) -> Result<()> {
        sqlx::query(
            "
            INSERT INTO statistics (
                owner_id, note_count, image_count, total_image_size, last_updated
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (owner_id) DO UPDATE SET
                note_count = statistics.note_count + EXCLUDED.note_count,
                image_count = statistics.image_count + EXCLUDED.image_count,
                total_image_size = statistics.total_image_size + EXCLUDED.total_image_size,
                last_updated = EXCLUDED.last_updated
            ",
        )
        .bind(owner_id)
        .bind(delta.note_count)
        .bind(delta.image_count)
        .bind(delta.total_image_size)
        .bind(Utc::now().naive_utc())
        .execute(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(())
    }

    async fn initialize_statistics(&self, owner_id: &str, delta: &StatisticsDelta) -> Result<bool> {
        let initial = delta.clamped();

        let result = sqlx::query(
            "
            INSERT INTO statistics (
                owner_id, note_count, image_count, total_image_size, last_updated
            )
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (owner_id) DO NOTHING
            ",
        )
        .bind(owner_id)
        .bind(initial.note_count)
        .bind(initial.image_count)
        .bind(initial.total_image_size)
        .bind(Utc::now().naive_utc())
        .execute(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_public_note(&self, note_id: &str) -> Result<Option<PublicNote>> {
        let public_note = sqlx::query_as::<_, PostgresPublicNote>(
            "
            SELECT
                note_id,
                owner_id,
                title,
                description,
                image_url,
                password_protected,
                last_updated_at
            FROM public_notes
            WHERE note_id = $1
            ",
        )
        .bind(note_id)
        .fetch_optional(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(public_note.map(PublicNote::from))
    }

    async fn upsert_public_note(&self, public_note: &PublicNote) -> Result<()> {
        sqlx::query(
            "
            INSERT INTO public_notes (
                note_id, owner_id, title, description, image_url, password_protected,
                last_updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (note_id) DO UPDATE SET
                owner_id = EXCLUDED.owner_id,
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                image_url = EXCLUDED.image_url,
                password_protected = EXCLUDED.password_protected,
                last_updated_at = EXCLUDED.last_updated_at
            ",
        )
        .bind(&public_note.note_id)
        .bind(&public_note.owner_id)
        .bind(&public_note.title)
        .bind(&public_note.description)
        .bind(&public_note.image_url)
        .bind(public_note.password_protected)
        .bind(public_note.last_updated_at)
        .execute(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(())
    }

    async fn delete_public_note(&self, note_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM public_notes WHERE note_id = $1")
            .bind(note_id)
            .execute(&self.connection_pool)
            .await
            .map_err(connection_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_access_log(&self, values: &CreateAccessLogValues<'_>) -> Result<AccessLog> {
        let access_log = sqlx::query_as::<_, PostgresAccessLog>(&format!(
            "
            INSERT INTO access_logs (
                id, owner_id, note_id, type, location, client_info, server_ip
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ACCESS_LOG_COLUMNS}
            "
        ))
        .bind(Uuid::new_v4())
        .bind(values.owner_id)
        .bind(values.note_id)
        .bind(values.kind)
        .bind(values.location)
        .bind(values.client_info)
        .bind(values.server_ip.map(|server_ip| IpNetwork::from(*server_ip)))
        .fetch_one(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(access_log.into())
    }

    async fn find_all_access_logs_by_note(
        &self,
        owner_id: &str,
        note_id: &str,
    ) -> Result<Vec<AccessLog>> {
        let access_logs = sqlx::query_as::<_, PostgresAccessLog>(&format!(
            "
            SELECT {ACCESS_LOG_COLUMNS}
            FROM access_logs
            WHERE owner_id = $1
                AND note_id = $2
            ORDER BY created_at DESC
            "
        ))
        .bind(owner_id)
        .bind(note_id)
        .fetch_all(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(access_logs.into_iter().map(AccessLog::from).collect())
    }

    async fn save_read_status(
        &self,
        owner_id: &str,
        note_id: &str,
        read_at: NaiveDateTime,
    ) -> Result<()> {
        sqlx::query(
            "
            INSERT INTO note_read_statuses (owner_id, note_id, last_read_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (owner_id, note_id) DO UPDATE SET
                last_read_at = EXCLUDED.last_read_at
            ",
        )
        .bind(owner_id)
        .bind(note_id)
        .bind(read_at)
        .execute(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(())
    }

    async fn find_read_status(
        &self,
        owner_id: &str,
        note_id: &str,
    ) -> Result<Option<NoteReadStatus>> {
        let last_read_at = sqlx::query_scalar::<_, NaiveDateTime>(
            "
            SELECT last_read_at
            FROM note_read_statuses
            WHERE owner_id = $1
                AND note_id = $2
            ",
        )
        .bind(owner_id)
        .bind(note_id)
        .fetch_optional(&self.connection_pool)
        .await
        .map_err(connection_error)?;

        Ok(last_read_at.map(|last_read_at| NoteReadStatus { last_read_at }))
    }
}

/// Shorthand to create a connection error
fn connection_error<E>(err: E) -> Error
where
    E: std::error::Error,
{
    Error::Connection(err.to_string())
}
