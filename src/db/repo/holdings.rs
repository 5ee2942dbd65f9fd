//! Holding row operations for the repository.

use crate::domain::{Currency, Holding, HoldingKey, Symbol, TimeMs, UserId};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

use super::{decode_decimal, Repository};

fn map_holding_row(row: &SqliteRow) -> Result<Holding, sqlx::Error> {
    Ok(Holding {
        key: HoldingKey::new(
            UserId::new(row.get::<String, _>("user_id")),
            Symbol::new(row.get::<String, _>("symbol")),
            Currency::new(row.get::<String, _>("currency")),
        ),
        quantity: decode_decimal("quantity", &row.get::<String, _>("quantity"))?,
        average_cost: decode_decimal("average_cost", &row.get::<String, _>("average_cost"))?,
        total_invested: decode_decimal("total_invested", &row.get::<String, _>("total_invested"))?,
        updated_at: TimeMs::new(row.get::<i64, _>("updated_at_ms")),
    })
}

impl Repository {
    /// Read one holding by key on a specific connection (usable inside a
    /// transaction).
    ///
    /// # Errors
    /// Returns an error if the query fails or a column fails to decode.
    pub async fn get_holding_conn(
        &self,
        conn: &mut SqliteConnection,
        key: &HoldingKey,
    ) -> Result<Option<Holding>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT user_id, symbol, currency, quantity, average_cost, total_invested, updated_at_ms
            FROM holdings
            WHERE user_id = ? AND symbol = ? AND currency = ?
            "#,
        )
        .bind(key.user_id.as_str())
        .bind(key.symbol.as_str())
        .bind(key.currency.as_str())
        .fetch_optional(&mut *conn)
        .await?;

        row.as_ref().map(map_holding_row).transpose()
    }

    /// Read one holding by key.
    ///
    /// # Errors
    /// Returns an error if the query fails or a column fails to decode.
    pub async fn get_holding(&self, key: &HoldingKey) -> Result<Option<Holding>, sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        self.get_holding_conn(&mut conn, key).await
    }

    /// Write a holding row, replacing any existing row for the key.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub async fn upsert_holding_conn(
        &self,
        conn: &mut SqliteConnection,
        holding: &Holding,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO holdings
            (user_id, symbol, currency, quantity, average_cost, total_invested, updated_at_ms)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(holding.key.user_id.as_str())
        .bind(holding.key.symbol.as_str())
        .bind(holding.key.currency.as_str())
        .bind(holding.quantity.to_canonical_string())
        .bind(holding.average_cost.to_canonical_string())
        .bind(holding.total_invested.to_canonical_string())
        .bind(holding.updated_at.as_ms())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Delete the holding row for a key. No zero-quantity rows persist.
    ///
    /// # Errors
    /// Returns an error if the delete fails.
    pub async fn delete_holding_conn(
        &self,
        conn: &mut SqliteConnection,
        key: &HoldingKey,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            DELETE FROM holdings
            WHERE user_id = ? AND symbol = ? AND currency = ?
            "#,
        )
        .bind(key.user_id.as_str())
        .bind(key.symbol.as_str())
        .bind(key.currency.as_str())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// List all holdings for a user, ordered for stable output.
    ///
    /// # Errors
    /// Returns an error if the query fails or a column fails to decode.
    pub async fn list_holdings_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Holding>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, symbol, currency, quantity, average_cost, total_invested, updated_at_ms
            FROM holdings
            WHERE user_id = ?
            ORDER BY symbol ASC, currency ASC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(map_holding_row).collect()
    }
}
