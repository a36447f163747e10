use ackl_ledger::{LedgerReader, LedgerRepository, LedgerWriter, RepositoryError};
use ackl_types::{Digest, HashAlgorithmVersion, LedgerRecord, NewRecord, RecordId};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};

use crate::config::StoreConfig;
use crate::error::{backend, on_insert, StoreResult};
use crate::row::{into_records, RecordRow, RECORD_COLUMNS};

/// Ledger repository backed by the `acknowledgments` table.
///
/// Writers take `pg_advisory_xact_lock(ledger_lock_key)` as their first
/// statement, so appends, rebuilds, and migrations on the same ledger run one
/// at a time and release the lock on commit or rollback. Readers run in a
/// `REPEATABLE READ READ ONLY` transaction and see one snapshot throughout.
#[derive(Clone, Debug)]
pub struct PgLedgerRepository {
    pool: PgPool,
    lock_key: i64,
}

impl PgLedgerRepository {
    pub fn new(pool: PgPool, lock_key: i64) -> Self {
        Self { pool, lock_key }
    }

    /// Open a pool and, unless disabled, apply the embedded migrations.
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let mut options: PgConnectOptions = config.database_url.parse()?;
        if let Some(schema) = &config.schema {
            options = options.options([("search_path", schema.as_str())]);
        }
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await?;
        tracing::info!(
            max_connections = config.max_connections,
            lock_key = config.ledger_lock_key,
            schema = config.schema.as_deref().unwrap_or("default"),
            "connected to PostgreSQL"
        );

        if config.run_migrations {
            if let Some(schema) = &config.schema {
                // Validated as a plain identifier.
                sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {schema}"))
                    .execute(&pool)
                    .await?;
            }
            Self::migrate(&pool).await?;
        }
        Ok(Self::new(pool, config.ledger_lock_key))
    }

    pub async fn migrate(pool: &PgPool) -> StoreResult<()> {
        sqlx::migrate!("./migrations").run(pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn lock_key(&self) -> i64 {
        self.lock_key
    }
}

#[async_trait]
impl LedgerRepository for PgLedgerRepository {
    async fn begin_read(&self) -> Result<Box<dyn LedgerReader>, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        Ok(Box::new(PgSession { tx: Some(tx) }))
    }

    async fn begin_write(&self) -> Result<Box<dyn LedgerWriter>, RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(self.lock_key)
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        tracing::debug!(lock_key = self.lock_key, "ledger write lock acquired");
        Ok(Box::new(PgSession { tx: Some(tx) }))
    }
}

/// One open transaction. Dropping it without commit rolls back.
struct PgSession {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSession {
    fn conn(&mut self) -> Result<&mut PgConnection, RepositoryError> {
        self.tx
            .as_deref_mut()
            .ok_or(RepositoryError::TransactionClosed)
    }

    async fn fetch_all(
        &mut self,
        filter: &str,
        bind: Option<&str>,
    ) -> Result<Vec<LedgerRecord>, RepositoryError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM acknowledgments {filter} ORDER BY id ASC");
        let mut query = sqlx::query_as::<_, RecordRow>(&sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query.fetch_all(self.conn()?).await.map_err(backend)?;
        into_records(rows)
    }

    async fn fetch_optional(
        &mut self,
        sql: &str,
        binds: &[&str],
    ) -> Result<Option<LedgerRecord>, RepositoryError> {
        let mut query = sqlx::query_as::<_, RecordRow>(sql);
        for value in binds {
            query = query.bind(*value);
        }
        query
            .fetch_optional(self.conn()?)
            .await
            .map_err(backend)?
            .map(LedgerRecord::try_from)
            .transpose()
    }
}

#[async_trait]
impl LedgerReader for PgSession {
    async fn get_by_subject_and_actor(
        &mut self,
        subject_id: &str,
        actor_id: &str,
    ) -> Result<Option<LedgerRecord>, RepositoryError> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM acknowledgments WHERE subject_id = $1 AND actor_id = $2"
        );
        self.fetch_optional(&sql, &[subject_id, actor_id]).await
    }

    async fn list_by_subject(
        &mut self,
        subject_id: &str,
    ) -> Result<Vec<LedgerRecord>, RepositoryError> {
        self.fetch_all("WHERE subject_id = $1", Some(subject_id)).await
    }

    async fn list_by_actor(&mut self, actor_id: &str) -> Result<Vec<LedgerRecord>, RepositoryError> {
        self.fetch_all("WHERE actor_id = $1", Some(actor_id)).await
    }

    async fn exists_by_subject_and_actor(
        &mut self,
        subject_id: &str,
        actor_id: &str,
    ) -> Result<bool, RepositoryError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM acknowledgments WHERE subject_id = $1 AND actor_id = $2)",
        )
        .bind(subject_id)
        .bind(actor_id)
        .fetch_one(self.conn()?)
        .await
        .map_err(backend)
    }

    async fn get_last(&mut self) -> Result<Option<LedgerRecord>, RepositoryError> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM acknowledgments ORDER BY id DESC LIMIT 1");
        self.fetch_optional(&sql, &[]).await
    }

    async fn list_all_ordered(&mut self) -> Result<Vec<LedgerRecord>, RepositoryError> {
        self.fetch_all("", None).await
    }
}

#[async_trait]
impl LedgerWriter for PgSession {
    async fn append(&mut self, record: NewRecord) -> Result<LedgerRecord, RepositoryError> {
        let sql = format!(
            "INSERT INTO acknowledgments (subject_id, actor_id, actor_email, actor_display_name, \
             signed_at, payload_digest, signature_value, nonce, referer, back_link, \
             hash_algorithm_version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {RECORD_COLUMNS}"
        );
        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(&record.subject_id)
            .bind(&record.actor_id)
            .bind(&record.actor_email)
            .bind(&record.actor_display_name)
            .bind(record.signed_at)
            .bind(&record.payload_digest)
            .bind(&record.signature_value)
            .bind(&record.nonce)
            .bind(&record.referer)
            .bind(record.back_link.as_ref().map(Digest::as_str))
            .bind(record.hash_algorithm_version.as_i16())
            .fetch_one(self.conn()?)
            .await
            .map_err(|e| on_insert(e, &record.subject_id, &record.actor_id))?;
        LedgerRecord::try_from(row)
    }

    async fn update_back_link(
        &mut self,
        id: RecordId,
        back_link: Option<&Digest>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE acknowledgments SET back_link = $2 WHERE id = $1")
            .bind(id.get())
            .bind(back_link.map(Digest::as_str))
            .execute(self.conn()?)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::RecordNotFound(id));
        }
        Ok(())
    }

    async fn update_hash_version(
        &mut self,
        id: RecordId,
        version: HashAlgorithmVersion,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE acknowledgments SET hash_algorithm_version = $2 WHERE id = $1")
                .bind(id.get())
                .bind(version.as_i16())
                .execute(self.conn()?)
                .await
                .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::RecordNotFound(id));
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), RepositoryError> {
        let tx = self.tx.take().ok_or(RepositoryError::TransactionClosed)?;
        tx.commit().await.map_err(backend)
    }
}
