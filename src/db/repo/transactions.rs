//! Transaction record and settlement-claim operations for the repository.

use crate::domain::{
    Currency, Direction, OrderId, OrderStatus, Symbol, TimeMs, TransactionRecord, UserId,
};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

use super::{decode_decimal_opt, Repository};

fn map_transaction_row(row: &SqliteRow) -> Result<TransactionRecord, sqlx::Error> {
    let direction_raw = row.get::<String, _>("direction");
    let direction = Direction::parse(&direction_raw).ok_or_else(|| {
        sqlx::Error::Decode(format!("column direction: unknown value {:?}", direction_raw).into())
    })?;

    let status_raw = row.get::<String, _>("status");
    let status = OrderStatus::parse(&status_raw).ok_or_else(|| {
        sqlx::Error::Decode(format!("column status: unknown value {:?}", status_raw).into())
    })?;

    let metadata = row
        .get::<Option<String>, _>("provider_metadata")
        .map(|raw| {
            serde_json::from_str(&raw).map_err(|e| {
                sqlx::Error::Decode(format!("column provider_metadata: {}", e).into())
            })
        })
        .transpose()?;

    Ok(TransactionRecord {
        order_id: OrderId::new(row.get::<String, _>("order_id")),
        user_id: UserId::new(row.get::<String, _>("user_id")),
        direction,
        crypto_currency: Symbol::new(row.get::<String, _>("crypto_currency")),
        crypto_amount: decode_decimal_opt("crypto_amount", row.get("crypto_amount"))?,
        fiat_amount: decode_decimal_opt("fiat_amount", row.get("fiat_amount"))?,
        fiat_currency: row
            .get::<Option<String>, _>("fiat_currency")
            .map(Currency::new),
        network: row.get("network"),
        wallet_address: row.get("wallet_address"),
        wallet_link: row.get("wallet_link"),
        status,
        status_reason: row.get("status_reason"),
        provider_metadata: metadata,
        settled_at: row
            .get::<Option<i64>, _>("settled_at_ms")
            .map(TimeMs::new),
        created_at: TimeMs::new(row.get::<i64, _>("created_at_ms")),
        updated_at: TimeMs::new(row.get::<i64, _>("updated_at_ms")),
    })
}

impl Repository {
    /// Insert a transaction record idempotently.
    ///
    /// Returns false when a record with the same order id already exists.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_transaction(
        &self,
        record: &TransactionRecord,
    ) -> Result<bool, sqlx::Error> {
        let metadata = record
            .provider_metadata
            .as_ref()
            .map(|m| m.to_string());

        let result = sqlx::query(
            r#"
            INSERT INTO transactions (
                order_id, user_id, direction, crypto_currency, crypto_amount,
                fiat_amount, fiat_currency, network, wallet_address, wallet_link,
                status, status_reason, provider_metadata, settled_at_ms,
                created_at_ms, updated_at_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(order_id) DO NOTHING
            "#,
        )
        .bind(record.order_id.as_str())
        .bind(record.user_id.as_str())
        .bind(record.direction.as_str())
        .bind(record.crypto_currency.as_str())
        .bind(record.crypto_amount.map(|d| d.to_canonical_string()))
        .bind(record.fiat_amount.map(|d| d.to_canonical_string()))
        .bind(record.fiat_currency.as_ref().map(|c| c.as_str().to_string()))
        .bind(record.network.as_deref())
        .bind(record.wallet_address.as_deref())
        .bind(record.wallet_link.as_deref())
        .bind(record.status.as_str())
        .bind(record.status_reason.as_deref())
        .bind(metadata)
        .bind(record.settled_at.map(|t| t.as_ms()))
        .bind(record.created_at.as_ms())
        .bind(record.updated_at.as_ms())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Read one transaction record by order id.
    ///
    /// # Errors
    /// Returns an error if the query fails or a column fails to decode.
    pub async fn get_transaction(
        &self,
        order_id: &OrderId,
    ) -> Result<Option<TransactionRecord>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT order_id, user_id, direction, crypto_currency, crypto_amount,
                   fiat_amount, fiat_currency, network, wallet_address, wallet_link,
                   status, status_reason, provider_metadata, settled_at_ms,
                   created_at_ms, updated_at_ms
            FROM transactions
            WHERE order_id = ?
            "#,
        )
        .bind(order_id.as_str())
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(map_transaction_row).transpose()
    }

    /// Persist a merged transaction record. The settlement marker is not
    /// touched here; only `claim_settlement` writes it.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn update_transaction(
        &self,
        record: &TransactionRecord,
    ) -> Result<(), sqlx::Error> {
        let metadata = record
            .provider_metadata
            .as_ref()
            .map(|m| m.to_string());

        sqlx::query(
            r#"
            UPDATE transactions SET
                crypto_amount = ?, fiat_amount = ?, fiat_currency = ?,
                network = ?, wallet_address = ?, wallet_link = ?,
                status = ?, status_reason = ?, provider_metadata = ?,
                updated_at_ms = ?
            WHERE order_id = ?
            "#,
        )
        .bind(record.crypto_amount.map(|d| d.to_canonical_string()))
        .bind(record.fiat_amount.map(|d| d.to_canonical_string()))
        .bind(record.fiat_currency.as_ref().map(|c| c.as_str().to_string()))
        .bind(record.network.as_deref())
        .bind(record.wallet_address.as_deref())
        .bind(record.wallet_link.as_deref())
        .bind(record.status.as_str())
        .bind(record.status_reason.as_deref())
        .bind(metadata)
        .bind(record.updated_at.as_ms())
        .bind(record.order_id.as_str())
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// List a user's transaction records, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails or a column fails to decode.
    pub async fn list_transactions_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<TransactionRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT order_id, user_id, direction, crypto_currency, crypto_amount,
                   fiat_amount, fiat_currency, network, wallet_address, wallet_link,
                   status, status_reason, provider_metadata, settled_at_ms,
                   created_at_ms, updated_at_ms
            FROM transactions
            WHERE user_id = ?
            ORDER BY created_at_ms DESC, order_id DESC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(map_transaction_row).collect()
    }

    /// Atomically claim an order for settlement.
    ///
    /// Returns false when the order was already settled. Runs on the
    /// caller's connection so the claim commits (or rolls back) together
    /// with the holding mutation.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn claim_settlement(
        &self,
        conn: &mut SqliteConnection,
        order_id: &OrderId,
        at: TimeMs,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET settled_at_ms = ?
            WHERE order_id = ? AND settled_at_ms IS NULL
            "#,
        )
        .bind(at.as_ms())
        .bind(order_id.as_str())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
