//! Email thread, body, and shipment-link endpoints (base spec §6).

use std::io::Read;

use flate2::read::GzDecoder;
use rocket::response::status::{Created, NoContent};
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use sqlx::PgPool;

use crate::error::ApiError;
use crate::models::{EmailBody, EmailShipmentLink, EmailThreadDetail, LinkEmailRequest};
use crate::store;

#[openapi(tag = "Emails")]
#[get("/emails/<thread_id>/thread")]
pub async fn get_thread(
    pool: &State<PgPool>,
    thread_id: &str,
) -> Result<Json<EmailThreadDetail>, ApiError> {
    let thread = store::threads::get_thread_by_gmail_thread_id(pool.inner(), thread_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("thread {thread_id} not found")))?;
    let messages = store::emails::get_emails_by_thread_id(pool.inner(), thread_id).await?;

    Ok(Json(EmailThreadDetail { thread, messages }))
}

#[openapi(tag = "Emails")]
#[get("/emails/<email_id>/body")]
pub async fn get_body(pool: &State<PgPool>, email_id: i32) -> Result<Json<EmailBody>, ApiError> {
    let email = store::emails::get_by_id(pool.inner(), email_id).await?;

    let plain_text = match &email.body_text {
        Some(text) => Some(text.clone()),
        None => decompress(email.body_compressed.as_deref()),
    };

    Ok(Json(EmailBody {
        plain_text,
        html_text: email.body_html,
        subject: email.subject,
        from: email.from_address,
        date: email.date,
    }))
}

fn decompress(compressed: Option<&[u8]>) -> Option<String> {
    let compressed = compressed?;
    let mut decoder = GzDecoder::new(compressed);
    let mut out = String::new();
    decoder.read_to_string(&mut out).ok()?;
    Some(out)
}

#[openapi(tag = "Emails")]
#[post("/emails/<email_id>/link/<shipment_id>", data = "<request>")]
pub async fn link(
    pool: &State<PgPool>,
    email_id: i32,
    shipment_id: i32,
    request: Json<LinkEmailRequest>,
) -> Result<Created<Json<EmailShipmentLink>>, ApiError> {
    let req = request.into_inner();
    store::emails::get_by_id(pool.inner(), email_id).await?;
    store::shipments::get_by_id(pool.inner(), shipment_id).await?;

    store::links::link_email_to_shipment(
        pool.inner(),
        email_id,
        shipment_id,
        req.link_type.as_deref().unwrap_or("manual"),
        &req.tracking_number,
        req.created_by.as_deref().unwrap_or("api"),
    )
    .await?;

    let link = store::links::get_links_for_shipment(pool.inner(), shipment_id)
        .await?
        .into_iter()
        .find(|l| l.email_id == email_id)
        .ok_or_else(|| ApiError::Internal("link vanished immediately after creation".to_string()))?;

    let location = format!("/api/emails/{email_id}/link/{shipment_id}");
    Ok(Created::new(location).body(Json(link)))
}

#[openapi(tag = "Emails")]
#[delete("/emails/<email_id>/link/<shipment_id>")]
pub async fn unlink(
    pool: &State<PgPool>,
    email_id: i32,
    shipment_id: i32,
) -> Result<NoContent, ApiError> {
    store::links::unlink_email_from_shipment(pool.inner(), email_id, shipment_id).await?;
    Ok(NoContent)
}
