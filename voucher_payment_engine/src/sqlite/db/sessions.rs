use sqlx::SqliteConnection;

use crate::db_types::UssdSession;

/// Fetches the session for the given id. A missing row is not an error; the caller starts a fresh menu session.
pub async fn fetch_session(session_id: &str, conn: &mut SqliteConnection) -> Result<Option<UssdSession>, sqlx::Error> {
    let session = sqlx::query_as("SELECT * FROM ussd_sessions WHERE session_id = $1")
        .bind(session_id)
        .fetch_optional(conn)
        .await?;
    Ok(session)
}

pub async fn upsert_session(session: &UssdSession, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO ussd_sessions (session_id, stage, voucher_type, quantity, amount, order_ref, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, CURRENT_TIMESTAMP)
        ON CONFLICT (session_id) DO UPDATE
        SET stage = $2, voucher_type = $3, quantity = $4, amount = $5, order_ref = $6, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(session.session_id.as_str())
    .bind(session.stage)
    .bind(session.voucher_type)
    .bind(session.quantity)
    .bind(session.amount)
    .bind(session.order_ref.as_ref().map(|r| r.as_str().to_string()))
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn delete_session(session_id: &str, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM ussd_sessions WHERE session_id = $1").bind(session_id).execute(conn).await?;
    Ok(())
}
