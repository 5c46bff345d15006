//! Tracking number extraction (component F, base spec §4.6): finds
//! tracking-number candidates in free email text, validates and scores them,
//! and optionally asks an LLM hook to enhance the result.
//!
//! The LLM API itself is out of scope (base spec §1 lists it as an external
//! collaborator); callers that want enhancement implement `LlmHook` and pass
//! it in, and tests exercise the regex-only path with `hook: None`.

use async_trait::async_trait;

use crate::carriers::validators;

pub const MIN_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    Regex,
    Llm,
    Hybrid,
}

#[derive(Debug, Clone)]
pub struct TrackingInfo {
    pub number: String,
    pub carrier: String,
    pub description: String,
    pub merchant: Option<String>,
    pub confidence: f64,
    pub source: ExtractionSource,
    pub context: String,
}

pub struct EmailContent<'a> {
    pub from: &'a str,
    pub subject: &'a str,
    pub plain_text: &'a str,
    pub html_text: &'a str,
}

/// Enhances a regex-extracted candidate list with better descriptions,
/// merchant attribution, or disambiguation. Implemented by an LLM-backed
/// adapter outside this crate's specified scope; `extract` runs correctly
/// with no hook at all.
#[async_trait]
pub trait LlmHook: Send + Sync {
    async fn enhance(&self, content: &EmailContent<'_>, candidates: Vec<TrackingInfo>) -> Vec<TrackingInfo>;
}

/// Pattern-matches candidate numbers per carrier, validates each, scores by
/// sender/subject hints, drops anything below `MIN_CONFIDENCE`, deduplicates
/// by number, and optionally runs the LLM hook over the surviving set.
pub async fn extract(content: &EmailContent<'_>, hook: Option<&dyn LlmHook>) -> Vec<TrackingInfo> {
    let combined = format!("{} {} {}", content.subject, content.plain_text, content.html_text);

    let mut seen = std::collections::HashSet::new();
    let mut candidates = Vec::new();

    for (carrier, pattern) in validators::candidate_patterns() {
        for m in pattern.find_iter(&combined) {
            let number = m.as_str().to_uppercase();
            if !validators::validate(carrier, &number) {
                continue;
            }
            if !seen.insert(number.clone()) {
                continue;
            }

            let confidence = confidence_for(carrier, content);
            if confidence < MIN_CONFIDENCE {
                continue;
            }

            let context_start = m.start().saturating_sub(40);
            let context_end = (m.end() + 40).min(combined.len());
            let context = combined
                .get(context_start..context_end)
                .unwrap_or(&combined)
                .trim()
                .to_string();

            candidates.push(TrackingInfo {
                number,
                carrier: carrier.to_string(),
                description: default_description(carrier, content),
                merchant: merchant_from_sender(content.from),
                confidence,
                source: ExtractionSource::Regex,
                context,
            });
        }
    }

    match hook {
        Some(hook) => {
            let enhanced = hook.enhance(content, candidates).await;
            enhanced.into_iter().map(mark_hybrid).collect()
        }
        None => candidates,
    }
}

fn mark_hybrid(mut info: TrackingInfo) -> TrackingInfo {
    if info.source == ExtractionSource::Regex {
        info.source = ExtractionSource::Hybrid;
    }
    info
}

/// Boosts confidence when the sender or subject independently corroborate
/// the carrier a regex pattern already points to.
fn confidence_for(carrier: &str, content: &EmailContent<'_>) -> f64 {
    let from = content.from.to_lowercase();
    let subject = content.subject.to_lowercase();

    let mut confidence = 0.6;
    if from.contains(carrier) || from.contains("amazon.com") {
        confidence += 0.2;
    }
    if subject.contains(carrier) {
        confidence += 0.1;
    }
    if subject.contains("shipped") || subject.contains("tracking") || subject.contains("delivery") {
        confidence += 0.1;
    }

    confidence.min(1.0)
}

fn default_description(carrier: &str, content: &EmailContent<'_>) -> String {
    match merchant_from_sender(content.from) {
        Some(merchant) => format!("Package from {merchant}"),
        None => format!("Package from {}", carrier.to_uppercase()),
    }
}

fn merchant_from_sender(from: &str) -> Option<String> {
    let domain = from.split('@').nth(1)?.trim_end_matches('>');
    let name = domain.split('.').next()?;
    if name.is_empty() {
        return None;
    }
    let mut chars = name.chars();
    let first = chars.next()?.to_uppercase().to_string();
    Some(format!("{first}{}", chars.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn extracts_validated_ups_number_with_carrier_hint() {
        let content = EmailContent {
            from: "ship-confirm@amazon.com",
            subject: "Your package has shipped",
            plain_text: "Tracking number: 1Z999AA10123456784 via UPS",
            html_text: "",
        };

        let results = extract(&content, None).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].number, "1Z999AA10123456784");
        assert_eq!(results[0].carrier, "ups");
        assert_eq!(results[0].source, ExtractionSource::Regex);
    }

    #[tokio::test]
    async fn drops_invalid_checksum_candidates() {
        let content = EmailContent {
            from: "someone@example.com",
            subject: "note",
            plain_text: "1Z999AA10123456780",
            html_text: "",
        };

        let results = extract(&content, None).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn deduplicates_repeated_numbers() {
        let content = EmailContent {
            from: "orders@amazon.com",
            subject: "shipped via ups",
            plain_text: "1Z999AA10123456784 ... 1Z999AA10123456784",
            html_text: "",
        };

        let results = extract(&content, None).await;
        assert_eq!(results.len(), 1);
    }
}
