//! Gmail thread repository (base spec §3 `EmailThread`).

use sqlx::PgPool;

use crate::models::EmailThread;
use crate::store::StoreError;

pub async fn create_or_update_thread(
    pool: &PgPool,
    gmail_thread_id: &str,
    subject: &str,
    participants: &[String],
) -> Result<EmailThread, StoreError> {
    let participants_json = serde_json::to_value(participants)
        .map_err(|e| StoreError::Db(sqlx::Error::Encode(Box::new(e))))?;

    let row = sqlx::query_as::<_, EmailThread>(
        r#"
        INSERT INTO email_threads (
            gmail_thread_id, subject, participants, message_count,
            first_message_date, last_message_date
        )
        VALUES ($1, $2, $3, 1, now(), now())
        ON CONFLICT (gmail_thread_id) DO UPDATE SET
            subject = EXCLUDED.subject,
            participants = EXCLUDED.participants,
            message_count = email_threads.message_count + 1,
            last_message_date = now()
        RETURNING *
        "#,
    )
    .bind(gmail_thread_id)
    .bind(subject)
    .bind(participants_json)
    .fetch_one(pool)
    .await
    .map_err(StoreError::Db)?;

    Ok(row)
}

pub async fn get_thread_by_gmail_thread_id(
    pool: &PgPool,
    gmail_thread_id: &str,
) -> Result<Option<EmailThread>, StoreError> {
    sqlx::query_as::<_, EmailThread>("SELECT * FROM email_threads WHERE gmail_thread_id = $1")
        .bind(gmail_thread_id)
        .fetch_optional(pool)
        .await
        .map_err(StoreError::Db)
}
