use chrono::{DateTime, Utc};
use keeper_storage::{
    DataId, DataRow, DataUpdate, Metadata, NewData, SecretKind, Store, StoreError, User, UserId,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub struct SqliteStore {
    pool: SqlitePool,
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {micros}")))
}

fn user_from_row(row: &SqliteRow) -> Result<User, StoreError> {
    Ok(User {
        id: UserId(row.try_get("id").map_err(backend)?),
        username: row.try_get("username").map_err(backend)?,
        password_hash: row.try_get("password_hash").map_err(backend)?,
        created_at: from_micros(row.try_get("created_at").map_err(backend)?)?,
    })
}

fn data_from_row(row: &SqliteRow) -> Result<DataRow, StoreError> {
    let kind: String = row.try_get("data_type").map_err(backend)?;
    let kind = SecretKind::from_str(&kind).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let metadata: String = row.try_get("metadata").map_err(backend)?;
    let metadata: Metadata = serde_json::from_str(&metadata)
        .map_err(|e| StoreError::Corrupt(format!("metadata: {e}")))?;

    Ok(DataRow {
        id: DataId(row.try_get("id").map_err(backend)?),
        owner: UserId(row.try_get("user_id").map_err(backend)?),
        kind,
        content: row.try_get("data_content").map_err(backend)?,
        metadata,
        file_name: row.try_get("file_name").map_err(backend)?,
        created_at: from_micros(row.try_get("created_at").map_err(backend)?)?,
        updated_at: from_micros(row.try_get("updated_at").map_err(backend)?)?,
    })
}

fn metadata_json(metadata: &Metadata) -> Result<String, StoreError> {
    serde_json::to_string(metadata).map_err(|e| StoreError::Backend(format!("metadata: {e}")))
}

impl SqliteStore {
    /// `~/.keeper/server.db` (creates dir with 0700 perms on unix)
    pub async fn open_default() -> Result<Self, StoreError> {
        let dir = dirs::home_dir()
            .ok_or_else(|| StoreError::Backend("no home dir".into()))?
            .join(".keeper");
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::Backend(e.to_string()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&dir, std::fs::Permissions::from_mode(0o700))
                .map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        let path = dir.join("server.db");
        let url = format!("sqlite://{}?mode=rwc", path.to_string_lossy());
        Self::open(&url).await
    }

    pub async fn open_in_memory() -> Result<Self, StoreError> {
        Self::open("sqlite::memory:").await
    }

    pub async fn open(url: &str) -> Result<Self, StoreError> {
        let in_memory = url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(url)
            .map_err(backend)?
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // An in-memory database exists per connection.
        let max_connections = if in_memory { 1 } else { 8 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(backend)?;

        MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        tracing::debug!(url, "sqlite store ready");
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl Store for SqliteStore {
    // ───────────────────────────── Users ─────────────────────────────

    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<UserId, StoreError> {
        let result = sqlx::query(
            "INSERT INTO users(username, password_hash, created_at) VALUES(?, ?, ?)",
        )
        .bind(username)
        .bind(password_hash)
        .bind(Utc::now().timestamp_micros())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let s = e.to_string();
            if s.contains("UNIQUE") {
                StoreError::AlreadyExists
            } else {
                StoreError::Backend(s)
            }
        })?;

        Ok(UserId(result.last_insert_rowid()))
    }

    async fn get_user_by_name(&self, username: &str) -> Result<User, StoreError> {
        let row = sqlx::query(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?;

        user_from_row(&row)
    }

    // ───────────────────────────── Records ─────────────────────────────

    async fn create_data(&self, owner: &UserId, data: &NewData) -> Result<DataRow, StoreError> {
        let now = Utc::now();
        let micros = now.timestamp_micros();
        let metadata = metadata_json(&data.metadata)?;

        let result = sqlx::query(
            "INSERT INTO data(user_id, data_type, data_content, metadata, file_name, created_at, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(owner.0)
        .bind(data.kind.as_str())
        .bind(&data.content)
        .bind(&metadata)
        .bind(data.file_name.as_deref())
        .bind(micros)
        .bind(micros)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        // Round-trip through the stored precision so callers see what a later read returns.
        let stamp = from_micros(micros)?;
        Ok(DataRow {
            id: DataId(result.last_insert_rowid()),
            owner: *owner,
            kind: data.kind,
            content: data.content.clone(),
            metadata: data.metadata.clone(),
            file_name: data.file_name.clone(),
            created_at: stamp,
            updated_at: stamp,
        })
    }

    async fn list_data(&self, owner: &UserId) -> Result<Vec<DataRow>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, data_type, data_content, metadata, file_name, created_at, updated_at
             FROM data WHERE user_id = ? ORDER BY id",
        )
        .bind(owner.0)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(data_from_row).collect()
    }

    async fn get_data(&self, owner: &UserId, id: &DataId) -> Result<DataRow, StoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, data_type, data_content, metadata, file_name, created_at, updated_at
             FROM data WHERE id = ? AND user_id = ?",
        )
        .bind(id.0)
        .bind(owner.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?;

        data_from_row(&row)
    }

    async fn update_data(
        &self,
        owner: &UserId,
        id: &DataId,
        update: &DataUpdate,
    ) -> Result<DateTime<Utc>, StoreError> {
        let metadata = metadata_json(&update.metadata)?;

        // One statement, so concurrent writers never need a lock upgrade.
        let updated_at: i64 = sqlx::query(
            "UPDATE data SET data_content = ?, metadata = ?, file_name = ?,
                 updated_at = MAX(updated_at, ?)
             WHERE id = ? AND user_id = ?
             RETURNING updated_at",
        )
        .bind(&update.content)
        .bind(&metadata)
        .bind(update.file_name.as_deref())
        .bind(Utc::now().timestamp_micros())
        .bind(id.0)
        .bind(owner.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or(StoreError::NotFound)?
        .try_get("updated_at")
        .map_err(backend)?;

        from_micros(updated_at)
    }

    async fn delete_data(&self, owner: &UserId, id: &DataId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM data WHERE id = ? AND user_id = ?")
            .bind(id.0)
            .bind(owner.0)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
