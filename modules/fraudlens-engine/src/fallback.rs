//! Regex-based entity extraction and keyword classification.
//!
//! This is the always-available extractor backend. It covers the three
//! entity kinds that pattern-match reliably (phone numbers, URLs,
//! dollar amounts) and a coarse keyword classifier, so the pipeline
//! produces usable output even with no extraction service configured.

use anyhow::Result;
use async_trait::async_trait;
use fraudlens_common::types::{Classification, EntityLabel, ExtractedEntity};
use regex::Regex;

use crate::collaborators::EntityExtractor;

/// Extraction input is capped so pathological submissions cannot make
/// the regex pass arbitrarily expensive.
const MAX_TEXT_CHARS: usize = 8_000;

pub struct RegexExtractor {
    phone: Regex,
    url: Regex,
    dollar: Regex,
}

impl Default for RegexExtractor {
    fn default() -> Self {
        // Static patterns, compile failure would be a programming error.
        Self {
            phone: Regex::new(r"[\+]?[\d\-\(\)\s]{7,15}").expect("phone pattern"),
            url: Regex::new(r#"https?://[^\s<>"']+"#).expect("url pattern"),
            dollar: Regex::new(r"\$[\d,]+(?:\.\d{2})?").expect("dollar pattern"),
        }
    }
}

impl RegexExtractor {
    fn bounded(text: &str) -> &str {
        match text.char_indices().nth(MAX_TEXT_CHARS) {
            Some((idx, _)) => &text[..idx],
            None => text,
        }
    }
}

/// Keyword groups mapped to the scam classes the classifier knows.
const CLASS_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "irs_government_scam",
        &["irs", "social security", "ssn", "government", "tax refund"],
    ),
    (
        "tech_support_scam",
        &["tech support", "microsoft", "virus", "remote access"],
    ),
    (
        "phishing_email",
        &["verify your account", "password", "suspended", "click the link"],
    ),
    (
        "package_delivery_scam",
        &["package", "delivery", "ups", "fedex", "customs fee"],
    ),
    (
        "crypto_investment_scam",
        &["crypto", "bitcoin", "investment", "guaranteed returns"],
    ),
    (
        "lottery_prize_scam",
        &["lottery", "prize", "you have won", "claim your winnings"],
    ),
];

#[async_trait]
impl EntityExtractor for RegexExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<ExtractedEntity>> {
        let text = Self::bounded(text);
        let mut entities = Vec::new();

        for m in self.phone.find_iter(text) {
            // The character class is permissive, require enough digits
            // to plausibly be a phone number.
            let digits = m.as_str().chars().filter(char::is_ascii_digit).count();
            if digits >= 7 {
                entities.push(ExtractedEntity::new(
                    m.as_str().trim(),
                    EntityLabel::PhoneNumber,
                    0.8,
                ));
            }
        }
        for m in self.url.find_iter(text) {
            entities.push(ExtractedEntity::new(m.as_str(), EntityLabel::Url, 0.9));
        }
        for m in self.dollar.find_iter(text) {
            entities.push(ExtractedEntity::new(
                m.as_str(),
                EntityLabel::DollarAmount,
                0.85,
            ));
        }

        Ok(entities)
    }

    async fn classify(&self, text: &str) -> Result<Classification> {
        let haystack = Self::bounded(text).to_lowercase();
        for (class, keywords) in CLASS_KEYWORDS {
            if keywords.iter().any(|kw| haystack.contains(kw)) {
                return Ok(Classification {
                    predicted_class: (*class).to_string(),
                    confidence: 0.6,
                });
            }
        }
        Ok(Classification::default())
    }
}
