//! Postgres-backed library store.
//!
//! Each commit runs in one database transaction. The book row (and the
//! account row for returns) is locked with `FOR UPDATE NOWAIT`, so two
//! writers on the same book serialize and the loser fails fast instead of
//! queueing behind the lock. Writers on different books never touch the
//! same rows.
//!
//! ## Error Mapping
//!
//! | SQLSTATE | Meaning | StoreError |
//! |----------|---------|------------|
//! | `55P03` | lock not available (NOWAIT) | `Conflict` |
//! | `40001` / `40P01` | serialization failure / deadlock | `Conflict` |
//! | `23503` | foreign key violation (row deleted mid-flight) | `Conflict` |
//! | `23505` | unique violation on `account_number` | `DuplicateAccountNumber` |
//! | `23505` | unique violation anywhere else | `Conflict` |
//! | `23514` | `balance >= 0` check | `NegativeBalance` |
//! | other | | `Backend` |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction as PgTransaction};
use tracing::instrument;
use uuid::Uuid;

use bookledger_accounts::{Account, AccountNumber};
use bookledger_catalog::{Book, BookStatus, BookTitle};
use bookledger_core::{AccountId, AggregateRoot, BookId, EntryId, Money};
use bookledger_ledger::{EntryKind, LedgerEntry};

use super::{EntryFilter, LibraryStore, StoreError, Transition};

/// Idempotent schema, applied statement by statement by [`PostgresLibraryStore::migrate`].
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS books (
        id          UUID PRIMARY KEY,
        title       TEXT NOT NULL CHECK (length(btrim(title)) > 0),
        status      TEXT NOT NULL DEFAULT 'available'
                    CHECK (status IN ('available', 'borrowed')),
        version     BIGINT NOT NULL DEFAULT 1,
        created_at  TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id              UUID PRIMARY KEY,
        account_number  TEXT NOT NULL UNIQUE,
        balance         BIGINT NOT NULL CHECK (balance >= 0),
        version         BIGINT NOT NULL DEFAULT 1,
        created_at      TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ledger_entries (
        sequence    BIGSERIAL PRIMARY KEY,
        id          UUID NOT NULL UNIQUE,
        account_id  UUID NOT NULL REFERENCES accounts (id) ON DELETE CASCADE,
        book_id     UUID NOT NULL REFERENCES books (id) ON DELETE CASCADE,
        kind        TEXT NOT NULL CHECK (kind IN ('borrow', 'return')),
        fee_amount  BIGINT NOT NULL CHECK (fee_amount >= 0),
        created_at  TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS ledger_entries_account_borrow_idx
        ON ledger_entries (account_id, created_at) WHERE kind = 'borrow'
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS ledger_entries_account_return_idx
        ON ledger_entries (account_id, created_at) WHERE kind = 'return'
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS ledger_entries_book_idx
        ON ledger_entries (book_id, sequence)
    "#,
];

const ENTRY_COLUMNS: &str =
    "sequence, id, account_id, book_id, kind, fee_amount, created_at";

/// Postgres-backed library store.
#[derive(Debug, Clone)]
pub struct PostgresLibraryStore {
    pool: Arc<PgPool>,
}

impl PostgresLibraryStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect and make sure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl LibraryStore for PostgresLibraryStore {
    #[instrument(skip(self, book), fields(book_id = %book.id_typed()), err)]
    async fn insert_book(&self, book: &Book) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO books (id, title, status, version, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(book.id_typed().as_uuid())
        .bind(book.title().as_str())
        .bind(book.status().as_str())
        .bind(book.version() as i64)
        .bind(book.created_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_book", e))?;
        Ok(())
    }

    async fn load_book(&self, id: BookId) -> Result<Option<Book>, StoreError> {
        let row = sqlx::query(
            "SELECT id, title, status, version, created_at FROM books WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_book", e))?;

        row.as_ref().map(book_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn delete_book(&self, id: BookId) -> Result<bool, StoreError> {
        // Ledger entries go with the book via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_book", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, account), fields(account_id = %account.id_typed()), err)]
    async fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (id, account_number, balance, version, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(account.id_typed().as_uuid())
        .bind(account.account_number().as_str())
        .bind(account.balance().minor())
        .bind(account.version() as i64)
        .bind(account.created_at())
        .execute(&*self.pool)
        .await
        .map_err(map_insert_account_error)?;
        Ok(())
    }

    async fn account_number_taken(&self, number: &AccountNumber) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM accounts WHERE account_number = $1)")
            .bind(number.as_str())
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("account_number_taken", e))?;
        row.try_get::<bool, _>(0)
            .map_err(|e| map_sqlx_error("account_number_taken", e))
    }

    async fn load_account(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            "SELECT id, account_number, balance, version, created_at FROM accounts WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_account", e))?;

        row.as_ref().map(account_from_row).transpose()
    }

    #[instrument(
        skip(self, transition),
        fields(
            book_id = %transition.book.book_id,
            account_id = %transition.entry.account_id,
            kind = %transition.entry.kind
        ),
        err
    )]
    async fn commit(&self, transition: Transition) -> Result<LedgerEntry, StoreError> {
        transition.validate()?;
        let Transition {
            book: book_write,
            balance,
            entry,
        } = transition;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let book_version = lock_version(&mut tx, "books", book_write.book_id.as_uuid()).await?;
        if let Err(e) = book_write.expected_version.check("book", book_version) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(e.into());
        }

        if let Some(bw) = &balance {
            let account_version = lock_version(&mut tx, "accounts", bw.account_id.as_uuid()).await?;
            if let Err(e) = bw.expected_version.check("account", account_version) {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(e.into());
            }

            sqlx::query(
                "UPDATE accounts SET balance = balance + $2, version = version + 1 WHERE id = $1",
            )
            .bind(bw.account_id.as_uuid())
            .bind(bw.delta.minor())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_balance_error(bw.account_id, e))?;
        }

        sqlx::query("UPDATE books SET status = $2, version = version + 1 WHERE id = $1")
            .bind(book_write.book_id.as_uuid())
            .bind(book_write.status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_status", e))?;

        let row = sqlx::query(
            r#"
            INSERT INTO ledger_entries (id, account_id, book_id, kind, fee_amount, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING sequence
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.account_id.as_uuid())
        .bind(entry.book_id.as_uuid())
        .bind(entry.kind.as_str())
        .bind(entry.fee_amount.minor())
        .bind(entry.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_entry", e))?;
        let sequence: i64 = row
            .try_get("sequence")
            .map_err(|e| map_sqlx_error("insert_entry", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(entry.into_stored(sequence as u64))
    }

    async fn entries(&self, filter: &EntryFilter) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new("SELECT ");
        qb.push(ENTRY_COLUMNS);
        qb.push(" FROM ledger_entries WHERE TRUE");
        if let Some(id) = filter.account_id {
            qb.push(" AND account_id = ").push_bind(Uuid::from(id));
        }
        if let Some(id) = filter.book_id {
            qb.push(" AND book_id = ").push_bind(Uuid::from(id));
        }
        if let Some(kind) = filter.kind {
            qb.push(" AND kind = ").push_bind(kind.as_str());
        }
        if let Some(range) = filter.range {
            qb.push(" AND created_at BETWEEN ")
                .push_bind(range.start)
                .push(" AND ")
                .push_bind(range.end);
        }
        qb.push(" ORDER BY sequence ASC");

        let rows = qb
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("entries", e))?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn borrowed_by(&self, account_id: AccountId) -> Result<Vec<Book>, StoreError> {
        // The open borrow of a book is its latest entry when that entry is a borrow.
        let rows = sqlx::query(
            r#"
            SELECT b.id, b.title, b.status, b.version, b.created_at
            FROM books b
            JOIN LATERAL (
                SELECT e.account_id, e.kind
                FROM ledger_entries e
                WHERE e.book_id = b.id
                ORDER BY e.sequence DESC
                LIMIT 1
            ) latest ON TRUE
            WHERE b.status = 'borrowed'
              AND latest.kind = 'borrow'
              AND latest.account_id = $1
            ORDER BY b.id
            "#,
        )
        .bind(account_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("borrowed_by", e))?;

        rows.iter().map(book_from_row).collect()
    }
}

/// Lock one row without waiting and return its version.
async fn lock_version(
    tx: &mut PgTransaction<'_, Postgres>,
    table: &'static str,
    id: &Uuid,
) -> Result<u64, StoreError> {
    let sql = format!("SELECT version FROM {table} WHERE id = $1 FOR UPDATE NOWAIT");
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_row", e))?;

    let Some(row) = row else {
        return Err(StoreError::Conflict(format!("{table} row {id} no longer exists")));
    };
    let version: i64 = row
        .try_get("version")
        .map_err(|e| map_sqlx_error("lock_row", e))?;
    Ok(version as u64)
}

fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
        _ => None,
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match sqlstate(&err).as_deref() {
        Some("55P03") | Some("40001") | Some("40P01") | Some("23503") => {
            StoreError::Conflict(format!("{operation}: {err}"))
        }
        Some("23505") => StoreError::Conflict(format!("{operation}: duplicate key: {err}")),
        _ => StoreError::Backend(format!("{operation}: {err}")),
    }
}

/// The only unique column written by an account insert is `account_number`.
fn map_insert_account_error(err: sqlx::Error) -> StoreError {
    if sqlstate(&err).as_deref() == Some("23505") {
        StoreError::DuplicateAccountNumber
    } else {
        map_sqlx_error("insert_account", err)
    }
}

fn map_balance_error(account_id: AccountId, err: sqlx::Error) -> StoreError {
    if sqlstate(&err).as_deref() == Some("23514") {
        StoreError::NegativeBalance(account_id)
    } else {
        map_sqlx_error("update_balance", err)
    }
}

fn decode<T>(operation: &str, r: Result<T, sqlx::Error>) -> Result<T, StoreError> {
    r.map_err(|e| StoreError::Backend(format!("failed to decode {operation} row: {e}")))
}

fn book_from_row(row: &PgRow) -> Result<Book, StoreError> {
    let id: Uuid = decode("book", row.try_get("id"))?;
    let title: String = decode("book", row.try_get("title"))?;
    let status: String = decode("book", row.try_get("status"))?;
    let version: i64 = decode("book", row.try_get("version"))?;
    let created_at: DateTime<Utc> = decode("book", row.try_get("created_at"))?;

    let title = BookTitle::parse(&title).map_err(|e| StoreError::Backend(e.to_string()))?;
    let status: BookStatus = status
        .parse()
        .map_err(|e: bookledger_core::DomainError| StoreError::Backend(e.to_string()))?;

    Ok(Book::restore(
        BookId::from_uuid(id),
        title,
        status,
        version as u64,
        created_at,
    ))
}

fn account_from_row(row: &PgRow) -> Result<Account, StoreError> {
    let id: Uuid = decode("account", row.try_get("id"))?;
    let number: String = decode("account", row.try_get("account_number"))?;
    let balance: i64 = decode("account", row.try_get("balance"))?;
    let version: i64 = decode("account", row.try_get("version"))?;
    let created_at: DateTime<Utc> = decode("account", row.try_get("created_at"))?;

    let number = AccountNumber::parse(&number).map_err(|e| StoreError::Backend(e.to_string()))?;

    Ok(Account::restore(
        AccountId::from_uuid(id),
        number,
        Money::from_minor(balance),
        version as u64,
        created_at,
    ))
}

fn entry_from_row(row: &PgRow) -> Result<LedgerEntry, StoreError> {
    let sequence: i64 = decode("ledger entry", row.try_get("sequence"))?;
    let id: Uuid = decode("ledger entry", row.try_get("id"))?;
    let account_id: Uuid = decode("ledger entry", row.try_get("account_id"))?;
    let book_id: Uuid = decode("ledger entry", row.try_get("book_id"))?;
    let kind: String = decode("ledger entry", row.try_get("kind"))?;
    let fee_amount: i64 = decode("ledger entry", row.try_get("fee_amount"))?;
    let created_at: DateTime<Utc> = decode("ledger entry", row.try_get("created_at"))?;

    let kind: EntryKind = kind
        .parse()
        .map_err(|e: bookledger_core::DomainError| StoreError::Backend(e.to_string()))?;

    Ok(LedgerEntry {
        id: EntryId::from_uuid(id),
        sequence: sequence as u64,
        account_id: AccountId::from_uuid(account_id),
        book_id: BookId::from_uuid(book_id),
        kind,
        fee_amount: Money::from_minor(fee_amount),
        created_at,
    })
}
