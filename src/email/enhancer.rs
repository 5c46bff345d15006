//! Description enhancer (component H, base spec §4.8): retroactively
//! improves weak shipment descriptions by re-extracting from linked emails,
//! and backfills missing email<->shipment links from recorded tracking
//! numbers.

use std::io::Read;
use std::sync::Arc;

use flate2::read::GzDecoder;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::Serialize;

use crate::email::extractor::{self, EmailContent, LlmHook};
use crate::models::ProcessedEmail;
use crate::store;
use crate::store::StoreError;

pub struct DescriptionEnhancer {
    pool: sqlx::PgPool,
    llm_hook: Option<Arc<dyn LlmHook>>,
}

/// What `enhance` changed, or would change under `dry_run`.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct EnhancementPreview {
    pub shipment_id: i32,
    pub old_description: String,
    pub new_description: String,
}

impl DescriptionEnhancer {
    pub fn new(pool: sqlx::PgPool, llm_hook: Option<Arc<dyn LlmHook>>) -> Self {
        Self { pool, llm_hook }
    }

    /// Runs over shipments with weak descriptions (or a single shipment, if
    /// given), writing `UpdateDescription` unless `dry_run` is set.
    pub async fn enhance(
        &self,
        shipment_id: Option<i32>,
        limit: i64,
        dry_run: bool,
    ) -> Result<Vec<EnhancementPreview>, StoreError> {
        let candidates = match shipment_id {
            Some(id) => vec![store::shipments::get_by_id(&self.pool, id).await?],
            None => store::shipments::get_shipments_with_poor_descriptions(&self.pool, limit).await?,
        };

        let mut previews = Vec::new();

        for shipment in candidates {
            let emails = store::emails::get_emails_for_tracking_number(&self.pool, &shipment.tracking_number)
                .await?;

            let Some(email) = select_best_email(&emails) else {
                continue;
            };

            let plain_text = reconstruct_plain_text(email);
            let content = EmailContent {
                from: &email.from_address,
                subject: &email.subject,
                plain_text: &plain_text,
                html_text: email.body_html.as_deref().unwrap_or(""),
            };

            let extracted = extractor::extract(&content, self.llm_hook.as_deref()).await;
            let Some(info) = extracted
                .iter()
                .find(|i| i.number == shipment.tracking_number && !i.description.is_empty())
            else {
                continue;
            };

            if info.description == shipment.description {
                continue;
            }

            previews.push(EnhancementPreview {
                shipment_id: shipment.id,
                old_description: shipment.description.clone(),
                new_description: info.description.clone(),
            });

            if !dry_run {
                store::shipments::update_description(&self.pool, shipment.id, &info.description).await?;
            }
        }

        Ok(previews)
    }

    /// Scans every email with recorded tracking numbers and creates any
    /// email<->shipment links that are missing (idempotent).
    pub async fn associate_emails_with_shipments(&self) -> Result<usize, StoreError> {
        let emails = store::emails::get_emails_with_tracking_numbers(&self.pool).await?;
        let mut created = 0usize;

        for email in emails {
            let Some(numbers) = email.tracking_numbers.as_array() else {
                continue;
            };

            for number in numbers {
                let Some(number) = number.as_str() else { continue };
                let Some(shipment) = store::shipments::get_by_tracking_number(&self.pool, number).await? else {
                    continue;
                };

                store::links::link_email_to_shipment(
                    &self.pool,
                    email.id,
                    shipment.id,
                    "automatic",
                    number,
                    "enhancer",
                )
                .await?;
                created += 1;
            }
        }

        Ok(created)
    }
}

/// Prioritizes an Amazon shipping/delivery subject, then any shipping-related
/// subject, else the most recent email that has content (base spec §4.8).
fn select_best_email(emails: &[ProcessedEmail]) -> Option<&ProcessedEmail> {
    let with_content: Vec<&ProcessedEmail> = emails.iter().filter(|e| e.has_content).collect();
    if with_content.is_empty() {
        return None;
    }

    let amazon_shipping = with_content.iter().find(|e| {
        e.from_address.to_lowercase().contains("amazon.com")
            && is_shipping_subject(&e.subject)
    });
    if let Some(email) = amazon_shipping {
        return Some(email);
    }

    if let Some(email) = with_content.iter().find(|e| is_shipping_subject(&e.subject)) {
        return Some(email);
    }

    with_content.into_iter().max_by_key(|e| e.date)
}

fn is_shipping_subject(subject: &str) -> bool {
    let lower = subject.to_lowercase();
    ["shipped", "shipment", "tracking", "delivered", "out for delivery"]
        .iter()
        .any(|t| lower.contains(t))
}

fn reconstruct_plain_text(email: &ProcessedEmail) -> String {
    if let Some(text) = &email.body_text {
        return text.clone();
    }
    let Some(compressed) = &email.body_compressed else {
        return String::new();
    };
    let mut decoder = GzDecoder::new(compressed.as_slice());
    let mut out = String::new();
    match decoder.read_to_string(&mut out) {
        Ok(_) => out,
        Err(_) => String::new(),
    }
}
