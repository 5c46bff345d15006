//! Processed-email repository (base spec §4.1 `Emails:` operation list).

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::ProcessedEmail;
use crate::store::StoreError;

/// Upserts by `gmail_message_id`. Used when a pass re-observes a message the
/// mail source already reported (legacy single-phase path).
pub async fn create_or_update(
    pool: &PgPool,
    gmail_message_id: &str,
    gmail_thread_id: &str,
    from_address: &str,
    subject: &str,
    date: DateTime<Utc>,
    scan_method: &str,
) -> Result<ProcessedEmail, StoreError> {
    let row = sqlx::query_as::<_, ProcessedEmail>(
        r#"
        INSERT INTO processed_emails (
            gmail_message_id, gmail_thread_id, from_address, subject, date,
            internal_timestamp, scan_method, processed_at, status, tracking_numbers,
            processing_phase, relevance_score, snippet, has_content
        )
        VALUES ($1, $2, $3, $4, $5, now(), $6, now(), 'processed', '[]'::jsonb, 'legacy', 0, '', false)
        ON CONFLICT (gmail_message_id) DO UPDATE SET
            gmail_thread_id = EXCLUDED.gmail_thread_id,
            from_address = EXCLUDED.from_address,
            subject = EXCLUDED.subject,
            date = EXCLUDED.date
        RETURNING *
        "#,
    )
    .bind(gmail_message_id)
    .bind(gmail_thread_id)
    .bind(from_address)
    .bind(subject)
    .bind(date)
    .bind(scan_method)
    .fetch_one(pool)
    .await
    .map_err(StoreError::Db)?;

    Ok(row)
}

pub async fn get_by_id(pool: &PgPool, id: i32) -> Result<ProcessedEmail, StoreError> {
    sqlx::query_as::<_, ProcessedEmail>("SELECT * FROM processed_emails WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(|e| StoreError::from_sqlx(e, format!("email {id} not found")))
}

pub async fn get_by_gmail_message_id(
    pool: &PgPool,
    gmail_message_id: &str,
) -> Result<Option<ProcessedEmail>, StoreError> {
    sqlx::query_as::<_, ProcessedEmail>("SELECT * FROM processed_emails WHERE gmail_message_id = $1")
        .bind(gmail_message_id)
        .fetch_optional(pool)
        .await
        .map_err(StoreError::Db)
}

pub async fn get_by_shipment_id(
    pool: &PgPool,
    shipment_id: i32,
) -> Result<Vec<ProcessedEmail>, StoreError> {
    sqlx::query_as::<_, ProcessedEmail>(
        r#"
        SELECT pe.* FROM processed_emails pe
        JOIN email_shipment_links l ON l.email_id = pe.id
        WHERE l.shipment_id = $1
        ORDER BY pe.date DESC
        "#,
    )
    .bind(shipment_id)
    .fetch_all(pool)
    .await
    .map_err(StoreError::Db)
}

pub async fn get_by_shipment_id_paginated(
    pool: &PgPool,
    shipment_id: i32,
    limit: i64,
    offset: i64,
) -> Result<Vec<ProcessedEmail>, StoreError> {
    sqlx::query_as::<_, ProcessedEmail>(
        r#"
        SELECT pe.* FROM processed_emails pe
        JOIN email_shipment_links l ON l.email_id = pe.id
        WHERE l.shipment_id = $1
        ORDER BY pe.date DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(shipment_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(StoreError::Db)
}

pub async fn get_emails_by_thread_id(
    pool: &PgPool,
    gmail_thread_id: &str,
) -> Result<Vec<ProcessedEmail>, StoreError> {
    sqlx::query_as::<_, ProcessedEmail>(
        "SELECT * FROM processed_emails WHERE gmail_thread_id = $1 ORDER BY date ASC",
    )
    .bind(gmail_thread_id)
    .fetch_all(pool)
    .await
    .map_err(StoreError::Db)
}

pub async fn get_emails_since(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> Result<Vec<ProcessedEmail>, StoreError> {
    sqlx::query_as::<_, ProcessedEmail>(
        "SELECT * FROM processed_emails WHERE internal_timestamp > $1 ORDER BY internal_timestamp ASC",
    )
    .bind(since)
    .fetch_all(pool)
    .await
    .map_err(StoreError::Db)
}

pub async fn is_processed(pool: &PgPool, gmail_message_id: &str) -> Result<bool, StoreError> {
    let row: Option<(i32,)> =
        sqlx::query_as("SELECT id FROM processed_emails WHERE gmail_message_id = $1")
            .bind(gmail_message_id)
            .fetch_optional(pool)
            .await
            .map_err(StoreError::Db)?;
    Ok(row.is_some())
}

/// Scrubs body fields for emails older than `older_than`; rows are retained.
pub async fn cleanup_old_emails(
    pool: &PgPool,
    older_than: DateTime<Utc>,
) -> Result<u64, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE processed_emails SET body_text = NULL, body_html = NULL, body_compressed = NULL
        WHERE date < $1 AND (body_text IS NOT NULL OR body_html IS NOT NULL OR body_compressed IS NOT NULL)
        "#,
    )
    .bind(older_than)
    .execute(pool)
    .await
    .map_err(StoreError::Db)?;

    Ok(result.rows_affected())
}

/// Lossy `LIKE` match against the JSON-encoded tracking-numbers array,
/// preserved as-is per base spec §9 ("preserve, not to fix"): this can match
/// a tracking number that is merely a substring of a stored one.
pub async fn get_emails_for_tracking_number(
    pool: &PgPool,
    tracking_number: &str,
) -> Result<Vec<ProcessedEmail>, StoreError> {
    let pattern = format!("%{tracking_number}%");
    sqlx::query_as::<_, ProcessedEmail>(
        "SELECT * FROM processed_emails WHERE tracking_numbers::text LIKE $1",
    )
    .bind(pattern)
    .fetch_all(pool)
    .await
    .map_err(StoreError::Db)
}

pub async fn get_emails_with_tracking_numbers(
    pool: &PgPool,
) -> Result<Vec<ProcessedEmail>, StoreError> {
    sqlx::query_as::<_, ProcessedEmail>(
        "SELECT * FROM processed_emails WHERE tracking_numbers != '[]'::jsonb",
    )
    .fetch_all(pool)
    .await
    .map_err(StoreError::Db)
}

/// Phase 1 of the two-phase ingest: a metadata-only row (base spec §4.7).
#[allow(clippy::too_many_arguments)]
pub async fn create_metadata_entry(
    pool: &PgPool,
    gmail_message_id: &str,
    gmail_thread_id: &str,
    from_address: &str,
    subject: &str,
    date: DateTime<Utc>,
    snippet: &str,
    relevance_score: f64,
    scan_method: &str,
) -> Result<ProcessedEmail, StoreError> {
    let row = sqlx::query_as::<_, ProcessedEmail>(
        r#"
        INSERT INTO processed_emails (
            gmail_message_id, gmail_thread_id, from_address, subject, date,
            internal_timestamp, scan_method, processed_at, status, tracking_numbers,
            processing_phase, relevance_score, snippet, has_content, metadata_extracted_at
        )
        VALUES ($1, $2, $3, $4, $5, now(), $6, now(), 'processed', '[]'::jsonb,
                'metadata_only', $7, $8, false, now())
        ON CONFLICT (gmail_message_id) DO UPDATE SET
            relevance_score = EXCLUDED.relevance_score,
            snippet = EXCLUDED.snippet
        RETURNING *
        "#,
    )
    .bind(gmail_message_id)
    .bind(gmail_thread_id)
    .bind(from_address)
    .bind(subject)
    .bind(date)
    .bind(scan_method)
    .bind(relevance_score)
    .bind(snippet)
    .fetch_one(pool)
    .await
    .map_err(StoreError::Db)?;

    Ok(row)
}

/// Phase 2 of the two-phase ingest: fills in the body and flips the phase
/// (base spec §4.7, §3 invariant `has_content=true <=> processing_phase=content_extracted`).
pub async fn update_with_content(
    pool: &PgPool,
    gmail_message_id: &str,
    body_text: Option<&str>,
    body_html: Option<&str>,
    body_compressed: Option<&[u8]>,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE processed_emails SET
            body_text = $2, body_html = $3, body_compressed = $4,
            processing_phase = 'content_extracted', has_content = true,
            content_extracted_at = now()
        WHERE gmail_message_id = $1
        "#,
    )
    .bind(gmail_message_id)
    .bind(body_text)
    .bind(body_html)
    .bind(body_compressed)
    .execute(pool)
    .await
    .map_err(StoreError::Db)?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!(
            "email {gmail_message_id} not found"
        )));
    }
    Ok(())
}

pub async fn get_metadata_only_emails(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<ProcessedEmail>, StoreError> {
    sqlx::query_as::<_, ProcessedEmail>(
        r#"
        SELECT * FROM processed_emails
        WHERE processing_phase = 'metadata_only'
        ORDER BY relevance_score DESC, date DESC
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(StoreError::Db)
}

pub async fn get_emails_by_relevance_score(
    pool: &PgPool,
    min_score: f64,
    limit: i64,
) -> Result<Vec<ProcessedEmail>, StoreError> {
    sqlx::query_as::<_, ProcessedEmail>(
        "SELECT * FROM processed_emails WHERE relevance_score >= $1 ORDER BY relevance_score DESC LIMIT $2",
    )
    .bind(min_score)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(StoreError::Db)
}

pub async fn update_relevance_score(
    pool: &PgPool,
    gmail_message_id: &str,
    score: f64,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE processed_emails SET relevance_score = $2 WHERE gmail_message_id = $1")
        .bind(gmail_message_id)
        .bind(score)
        .execute(pool)
        .await
        .map_err(StoreError::Db)?;
    Ok(())
}

/// Marks a message as having finished extraction, recording the tracking
/// numbers found (possibly none) and flipping status to `processed`.
pub async fn mark_processed(
    pool: &PgPool,
    gmail_message_id: &str,
    tracking_numbers: &[String],
) -> Result<(), StoreError> {
    let payload = serde_json::to_value(tracking_numbers)
        .map_err(|e| StoreError::Db(sqlx::Error::Encode(Box::new(e))))?;
    sqlx::query(
        "UPDATE processed_emails SET status = 'processed', tracking_numbers = $2 WHERE gmail_message_id = $1",
    )
    .bind(gmail_message_id)
    .bind(payload)
    .execute(pool)
    .await
    .map_err(StoreError::Db)?;
    Ok(())
}

/// Marks a message as failed, recording the error for diagnostics (base spec §7).
pub async fn mark_error(
    pool: &PgPool,
    gmail_message_id: &str,
    error_message: &str,
) -> Result<(), StoreError> {
    sqlx::query("UPDATE processed_emails SET status = 'error', error_message = $2 WHERE gmail_message_id = $1")
        .bind(gmail_message_id)
        .bind(error_message)
        .execute(pool)
        .await
        .map_err(StoreError::Db)?;
    Ok(())
}
