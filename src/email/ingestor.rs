//! Email ingestor (component G, base spec §4.7): two-phase periodic worker.
//! Metadata phase scores and records every new message cheaply; content
//! phase pulls full bodies for the most relevant ones, extracts tracking
//! numbers, and links or creates shipments.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use flate2::write::GzEncoder;
use flate2::Compression;
use sqlx::PgPool;
use tokio::sync::Mutex;

use crate::email::extractor::{self, EmailContent, LlmHook};
use crate::email::mail_source::MailSource;
use crate::email::relevance::{self, MessageSignals};
use crate::models::CreateShipmentRequest;
use crate::store;
use crate::workers::WorkerHandle;

pub struct EmailIngestor {
    pool: PgPool,
    mail_source: Arc<dyn MailSource>,
    llm_hook: Option<Arc<dyn LlmHook>>,
    check_interval: Duration,
    max_per_run: usize,
    rate_limit_delay: Duration,
    handle: WorkerHandle,
    since: Mutex<chrono::DateTime<Utc>>,
}

impl EmailIngestor {
    pub fn new(
        pool: PgPool,
        mail_source: Arc<dyn MailSource>,
        llm_hook: Option<Arc<dyn LlmHook>>,
        check_interval: Duration,
        max_per_run: usize,
        rate_limit_delay: Duration,
    ) -> Self {
        Self {
            pool,
            mail_source,
            llm_hook,
            check_interval,
            max_per_run,
            rate_limit_delay,
            handle: WorkerHandle::new(),
            since: Mutex::new(Utc::now() - chrono::Duration::days(7)),
        }
    }

    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    pub async fn run(self) {
        let cancel = self.handle.cancellation_token();
        let mut ticker = tokio::time::interval(self.check_interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::info!("email ingestor shutting down");
                    return;
                }
                _ = ticker.tick() => {
                    if self.handle.is_paused() {
                        continue;
                    }
                    self.handle.mark_pass_started().await;
                    let result = self.run_pass().await;
                    self.handle.mark_pass_finished(result.err()).await;
                }
            }
        }
    }

    async fn run_pass(&self) -> Result<(), String> {
        self.metadata_phase().await?;
        self.content_phase().await
    }

    async fn metadata_phase(&self) -> Result<(), String> {
        let since = *self.since.lock().await;
        let pass_started = Utc::now();

        let messages = self
            .mail_source
            .list_since(since)
            .await
            .map_err(|e| e.to_string())?;

        for msg in &messages {
            if store::emails::is_processed(&self.pool, &msg.gmail_message_id)
                .await
                .map_err(|e| e.to_string())?
            {
                continue;
            }

            let score = relevance::score(&MessageSignals {
                from: &msg.from,
                subject: &msg.subject,
                snippet: &msg.snippet,
                plain_text: "",
                html_text: "",
            });

            if let Err(e) = store::emails::create_metadata_entry(
                &self.pool,
                &msg.gmail_message_id,
                &msg.gmail_thread_id,
                &msg.from,
                &msg.subject,
                msg.date,
                &msg.snippet,
                score,
                "time-based",
            )
            .await
            {
                log::warn!("failed to record metadata for {}: {e}", msg.gmail_message_id);
            }
        }

        *self.since.lock().await = pass_started;
        Ok(())
    }

    async fn content_phase(&self) -> Result<(), String> {
        let rows = store::emails::get_metadata_only_emails(&self.pool, self.max_per_run as i64)
            .await
            .map_err(|e| e.to_string())?;

        for row in rows {
            tokio::time::sleep(self.rate_limit_delay).await;

            let content = match self.mail_source.fetch_content(&row.gmail_message_id).await {
                Ok(c) => c,
                Err(e) => {
                    let _ = store::emails::mark_error(&self.pool, &row.gmail_message_id, &e.to_string()).await;
                    continue;
                }
            };

            let compressed = compress_plain_text(&content.plain_text);
            if let Err(e) = store::emails::update_with_content(
                &self.pool,
                &row.gmail_message_id,
                (!content.plain_text.is_empty()).then_some(content.plain_text.as_str()),
                (!content.html_text.is_empty()).then_some(content.html_text.as_str()),
                compressed.as_deref(),
            )
            .await
            {
                log::error!("failed to store content for {}: {e}", row.gmail_message_id);
                continue;
            }

            if let Err(e) = store::threads::create_or_update_thread(
                &self.pool,
                &row.gmail_thread_id,
                &row.subject,
                &[row.from_address.clone()],
            )
            .await
            {
                log::warn!("failed to upsert thread {}: {e}", row.gmail_thread_id);
            }

            let extracted = extractor::extract(
                &EmailContent {
                    from: &row.from_address,
                    subject: &row.subject,
                    plain_text: &content.plain_text,
                    html_text: &content.html_text,
                },
                self.llm_hook.as_deref(),
            )
            .await;

            let mut tracking_numbers = Vec::with_capacity(extracted.len());
            for info in &extracted {
                tracking_numbers.push(info.number.clone());

                let shipment = match store::shipments::get_by_tracking_number(&self.pool, &info.number).await {
                    Ok(Some(existing)) => existing,
                    Ok(None) => {
                        let req = CreateShipmentRequest {
                            tracking_number: info.number.clone(),
                            carrier: info.carrier.clone(),
                            description: info.description.clone(),
                            amazon_order_number: None,
                        };
                        match store::shipments::create(&self.pool, &req).await {
                            Ok(s) => s,
                            Err(e) => {
                                log::warn!("failed to create shipment for {}: {e}", info.number);
                                continue;
                            }
                        }
                    }
                    Err(e) => {
                        log::warn!("lookup failed for tracking number {}: {e}", info.number);
                        continue;
                    }
                };

                if let Err(e) = store::links::link_email_to_shipment(
                    &self.pool,
                    row.id,
                    shipment.id,
                    "automatic",
                    &info.number,
                    "ingestor",
                )
                .await
                {
                    log::warn!("failed to link email {} to shipment {}: {e}", row.id, shipment.id);
                }
            }

            if let Err(e) = store::emails::mark_processed(&self.pool, &row.gmail_message_id, &tracking_numbers).await {
                log::error!("failed to mark {} processed: {e}", row.gmail_message_id);
            }
        }

        Ok(())
    }
}

/// Gzips the plaintext body; an empty plaintext serializes as `None`, never
/// as a valid empty gzip stream (base spec §6).
fn compress_plain_text(plain_text: &str) -> Option<Vec<u8>> {
    if plain_text.is_empty() {
        return None;
    }
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(plain_text.as_bytes()).ok()?;
    encoder.finish().ok()
}
