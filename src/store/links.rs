//! Email<->shipment association table (base spec §3 `EmailShipmentLink`).
//! Many-to-many: never embed one entity inside the other (base spec §9).

use sqlx::PgPool;

use crate::models::EmailShipmentLink;
use crate::store::StoreError;

/// Idempotent: linking the same pair twice is a no-op (base spec §8 invariant 9).
pub async fn link_email_to_shipment(
    pool: &PgPool,
    email_id: i32,
    shipment_id: i32,
    link_type: &str,
    tracking_number: &str,
    created_by: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO email_shipment_links (email_id, shipment_id, link_type, tracking_number, created_by)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email_id, shipment_id) DO NOTHING
        "#,
    )
    .bind(email_id)
    .bind(shipment_id)
    .bind(link_type)
    .bind(tracking_number)
    .bind(created_by)
    .execute(pool)
    .await
    .map_err(StoreError::Db)?;

    Ok(())
}

/// Fails with `NotFound` if the link doesn't exist (base spec §4.1).
pub async fn unlink_email_from_shipment(
    pool: &PgPool,
    email_id: i32,
    shipment_id: i32,
) -> Result<(), StoreError> {
    let result = sqlx::query(
        "DELETE FROM email_shipment_links WHERE email_id = $1 AND shipment_id = $2",
    )
    .bind(email_id)
    .bind(shipment_id)
    .execute(pool)
    .await
    .map_err(StoreError::Db)?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!(
            "no link between email {email_id} and shipment {shipment_id}"
        )));
    }
    Ok(())
}

pub async fn get_links_for_shipment(
    pool: &PgPool,
    shipment_id: i32,
) -> Result<Vec<EmailShipmentLink>, StoreError> {
    sqlx::query_as::<_, EmailShipmentLink>(
        "SELECT * FROM email_shipment_links WHERE shipment_id = $1",
    )
    .bind(shipment_id)
    .fetch_all(pool)
    .await
    .map_err(StoreError::Db)
}
