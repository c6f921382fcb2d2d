//! Repository pattern for database operations.
//!
//! Cursor reads and monotonic advances, ledger record upserts and queries, and
//! reporter rows for the registry task.

use sqlx::SqlitePool;
use tracing::{debug, info, instrument};

use super::models::{AddressCursor, LedgerRecord, ReporterRow};
use crate::error::{LedgerError, LedgerResult};
use crate::registry::ReporterEntry;

/// Repository for database operations.
///
/// Wraps a SQLite connection pool; cheap to clone.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Creates a new repository with the given connection pool.
    #[must_use]
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ==================== CURSOR OPERATIONS ====================

    /// Next block to fetch from for `address`, or `None` if never synced.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn get_cursor(&self, address: &str) -> LedgerResult<Option<AddressCursor>> {
        sqlx::query_as::<_, AddressCursor>(
            "SELECT address, last_synced_block, updated_at FROM address_cursors WHERE address = ?",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LedgerError::database("Failed to query address cursor", Some(Box::new(e))))
    }

    /// Store `max(current, block)` for `address` and return the stored value.
    ///
    /// Inserts on the first call; never lowers an existing cursor.
    ///
    /// # Errors
    ///
    /// Returns a database error if the upsert fails.
    #[instrument(skip(self))]
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub async fn advance_cursor(&self, address: &str, block: u64) -> LedgerResult<u64> {
        let (stored,): (i64,) = sqlx::query_as(
            r"
            INSERT INTO address_cursors (address, last_synced_block, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT (address) DO UPDATE SET
                last_synced_block = MAX(last_synced_block, excluded.last_synced_block),
                updated_at = excluded.updated_at
            RETURNING last_synced_block
            ",
        )
        .bind(address)
        .bind(block as i64)
        .bind(chrono::Utc::now().timestamp())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| LedgerError::database("Failed to advance address cursor", Some(Box::new(e))))?;

        debug!(stored, "Cursor advanced");
        Ok(stored as u64)
    }

    // ==================== LEDGER OPERATIONS ====================

    /// Upserts records keyed by `(address, hash)` in a single transaction.
    ///
    /// Either every record is written or none is. `created_at` of existing
    /// rows is preserved.
    ///
    /// # Errors
    ///
    /// Returns a database error if any statement or the commit fails.
    #[instrument(skip(self, records), fields(count = records.len(), duration_ms = tracing::field::Empty))]
    pub async fn upsert_records(&self, records: &[LedgerRecord]) -> LedgerResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let start = std::time::Instant::now();

        let mut tx = self.pool.begin().await.map_err(|e| {
            LedgerError::database("Failed to start transaction", Some(Box::new(e)))
        })?;

        for record in records {
            sqlx::query(
                r"
                INSERT INTO ledger_records (
                    address, hash, block_number, block_timestamp, fee, gas_price,
                    gas_used, method_selector, status, reward_amount, created_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (address, hash) DO UPDATE SET
                    block_number = excluded.block_number,
                    block_timestamp = excluded.block_timestamp,
                    fee = excluded.fee,
                    gas_price = excluded.gas_price,
                    gas_used = excluded.gas_used,
                    method_selector = excluded.method_selector,
                    status = excluded.status,
                    reward_amount = excluded.reward_amount
                ",
            )
            .bind(&record.address)
            .bind(&record.hash)
            .bind(record.block_number)
            .bind(record.block_timestamp)
            .bind(record.fee)
            .bind(&record.gas_price)
            .bind(&record.gas_used)
            .bind(&record.method_selector)
            .bind(record.status)
            .bind(record.reward_amount)
            .bind(record.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                LedgerError::database(
                    format!("Failed to upsert ledger record {}", record.hash),
                    Some(Box::new(e)),
                )
            })?;
        }

        tx.commit().await.map_err(|e| {
            LedgerError::database("Failed to commit transaction", Some(Box::new(e)))
        })?;

        let duration = start.elapsed();
        #[allow(clippy::cast_possible_truncation)]
        let elapsed_ms = duration.as_millis() as u64;
        tracing::Span::current().record("duration_ms", elapsed_ms);

        info!(
            count = records.len(),
            duration_ms = elapsed_ms,
            "Ledger records upserted"
        );

        Ok(records.len())
    }

    /// Records of `address`, newest block first.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn get_ledger(
        &self,
        address: &str,
        hide_failed: bool,
    ) -> LedgerResult<Vec<LedgerRecord>> {
        sqlx::query_as::<_, LedgerRecord>(
            r"
            SELECT address, hash, block_number, block_timestamp, fee, gas_price,
                   gas_used, method_selector, status, reward_amount, created_at
            FROM ledger_records
            WHERE address = ? AND (? = 0 OR status = 'success')
            ORDER BY block_number DESC, hash ASC
            ",
        )
        .bind(address)
        .bind(hide_failed)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::database("Failed to query ledger records", Some(Box::new(e))))
    }

    /// Number of stored records for `address`.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn count_records(&self, address: &str) -> LedgerResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM ledger_records WHERE address = ?")
                .bind(address)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    LedgerError::database("Failed to count ledger records", Some(Box::new(e)))
                })?;

        Ok(count)
    }

    /// Most recent rewarded records across all addresses.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub async fn recent_rewarded(&self, limit: u32) -> LedgerResult<Vec<LedgerRecord>> {
        sqlx::query_as::<_, LedgerRecord>(
            r"
            SELECT address, hash, block_number, block_timestamp, fee, gas_price,
                   gas_used, method_selector, status, reward_amount, created_at
            FROM ledger_records
            WHERE reward_amount > 0
            ORDER BY block_number DESC, hash ASC
            LIMIT ?
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::database("Failed to query recent rewards", Some(Box::new(e))))
    }

    // ==================== REPORTER OPERATIONS ====================

    /// All persisted reporter entries.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails, or a decoding error for a
    /// corrupt row.
    pub async fn get_reporters(&self) -> LedgerResult<Vec<ReporterEntry>> {
        let rows = sqlx::query_as::<_, ReporterRow>(
            r"
            SELECT address, is_contract, is_working, last_synced_block, recent_rewards,
                   last_report_at, label, stake, locked_balance, updated_at
            FROM reporters
            ORDER BY address
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::database("Failed to query reporters", Some(Box::new(e))))?;

        rows.into_iter().map(ReporterRow::into_entry).collect()
    }

    /// Single-row upsert of a reporter entry.
    ///
    /// # Errors
    ///
    /// Returns a database error if the upsert fails.
    pub async fn upsert_reporter(&self, entry: &ReporterEntry) -> LedgerResult<()> {
        let row = ReporterRow::from_entry(entry)?;

        sqlx::query(
            r"
            INSERT INTO reporters (
                address, is_contract, is_working, last_synced_block, recent_rewards,
                last_report_at, label, stake, locked_balance, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (address) DO UPDATE SET
                is_contract = excluded.is_contract,
                is_working = excluded.is_working,
                last_synced_block = excluded.last_synced_block,
                recent_rewards = excluded.recent_rewards,
                last_report_at = excluded.last_report_at,
                label = excluded.label,
                stake = excluded.stake,
                locked_balance = excluded.locked_balance,
                updated_at = excluded.updated_at
            ",
        )
        .bind(&row.address)
        .bind(row.is_contract)
        .bind(row.is_working)
        .bind(row.last_synced_block)
        .bind(&row.recent_rewards)
        .bind(row.last_report_at)
        .bind(&row.label)
        .bind(row.stake)
        .bind(row.locked_balance)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            LedgerError::database(
                format!("Failed to upsert reporter {}", row.address),
                Some(Box::new(e)),
            )
        })?;

        Ok(())
    }

    /// Round-trips a trivial query.
    ///
    /// # Errors
    ///
    /// Returns a database error if the database is unreachable.
    pub async fn health_check(&self) -> LedgerResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| LedgerError::database("Database health check failed", Some(Box::new(e))))?;
        Ok(())
    }
}
