use anyhow::Result;
use shared::{ProfilePatch, ProfileRecord};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use uuid::Uuid;

mod models;

pub use models::*;

const USER_COLUMNS: &str =
    "id, email, password_hash, provider, display_name, photo_url, created_at";

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", path);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Private in-memory database. A single connection, since every new
    /// connection to `:memory:` would open an empty database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT,
                provider TEXT,
                display_name TEXT,
                photo_url TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                document TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS usage_counters (
                user_id TEXT PRIMARY KEY,
                count INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Database migrations completed");
        Ok(())
    }

    // User operations
    pub async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, provider, display_name, photo_url)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.provider)
        .bind(&user.display_name)
        .bind(&user.photo_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = ?",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = ?",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Create the account on first federated sign-in, otherwise refresh the
    /// provider hints on the existing one.
    ///
    /// Returns `None` when the email already belongs to a password account
    /// or to another provider; those are never linked by email alone.
    pub async fn upsert_federated_user(&self, login: &FederatedLogin) -> Result<Option<User>> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, provider, display_name, photo_url)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(email) DO UPDATE SET
                display_name = excluded.display_name,
                photo_url = excluded.photo_url
            WHERE users.provider = excluded.provider AND users.password_hash IS NULL
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&login.email)
        .bind(&login.provider)
        .bind(&login.display_name)
        .bind(&login.photo_url)
        .execute(&self.pool)
        .await?;

        let user = self
            .get_user_by_email(&login.email)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user {} vanished after upsert", login.email))?;
        let owned = user.password_hash.is_none()
            && user.provider.as_deref() == Some(login.provider.as_str());
        Ok(owned.then_some(user))
    }

    // Profile operations
    pub async fn get_profile(&self, id: &str) -> Result<Option<ProfileRecord>> {
        let document: Option<String> =
            sqlx::query_scalar("SELECT document FROM profiles WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match document {
            Some(doc) => Ok(Some(serde_json::from_str(&doc)?)),
            None => Ok(None),
        }
    }

    /// Create or overwrite a profile document
    pub async fn put_profile(&self, record: &ProfileRecord) -> Result<()> {
        let document = serde_json::to_string(record)?;
        sqlx::query(
            r#"
            INSERT INTO profiles (id, document) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET
                document = excluded.document,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&record.id)
        .bind(document)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Merge a patch into an existing profile. Returns `None` when there is
    /// no profile with that id.
    pub async fn update_profile(
        &self,
        id: &str,
        patch: &ProfilePatch,
    ) -> Result<Option<ProfileRecord>> {
        let mut tx = self.pool.begin().await?;

        let document: Option<String> =
            sqlx::query_scalar("SELECT document FROM profiles WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(document) = document else {
            return Ok(None);
        };

        let mut record: ProfileRecord = serde_json::from_str(&document)?;
        record.apply(patch);

        sqlx::query(
            "UPDATE profiles SET document = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(serde_json::to_string(&record)?)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(record))
    }

    // Usage counters
    /// Current count, creating the counter at zero if it does not exist
    pub async fn get_usage(&self, user_id: &str) -> Result<u32> {
        sqlx::query("INSERT OR IGNORE INTO usage_counters (user_id, count) VALUES (?, 0)")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        let count: i64 = sqlx::query_scalar("SELECT count FROM usage_counters WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(u32::try_from(count)?)
    }

    pub async fn increment_usage(&self, user_id: &str) -> Result<u32> {
        let count: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO usage_counters (user_id, count) VALUES (?, 1)
            ON CONFLICT(user_id) DO UPDATE SET count = count + 1
            RETURNING count
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(u32::try_from(count)?)
    }

    // Demo collections
    pub async fn get_collection(&self, name: &str) -> Result<Option<serde_json::Value>> {
        let payload: Option<String> =
            sqlx::query_scalar("SELECT payload FROM collections WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        match payload {
            Some(p) => Ok(Some(serde_json::from_str(&p)?)),
            None => Ok(None),
        }
    }

    pub async fn put_collection(&self, name: &str, payload: &serde_json::Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO collections (name, payload) VALUES (?, ?)
            ON CONFLICT(name) DO UPDATE SET
                payload = excluded.payload,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(name)
        .bind(serde_json::to_string(payload)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
