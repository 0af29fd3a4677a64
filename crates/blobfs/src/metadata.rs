//! Normalization of backend blob properties into canonical metadata
//!
//! The mapping is an explicit allow-list: each canonical key names the
//! backend property it is read from and how its value is normalized. Values
//! that fail normalization are passed through unchanged, never dropped or
//! coerced. Backend properties outside the table are dropped, except user
//! metadata (`x-ms-meta-*`) which is appended verbatim.

use crate::client::BlobProperties;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use tracing::warn;

/// Prefix of user-defined metadata properties
pub const USER_METADATA_PREFIX: &str = "x-ms-meta-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Normalizer {
    Text,
    Timestamp,
    Hash,
    Integer,
    Boolean,
}

struct PropertyRule {
    canonical: &'static str,
    backend: &'static str,
    normalizer: Normalizer,
    /// Emit an empty value when the backend does not report the property
    always: bool,
}

const fn rule(
    canonical: &'static str,
    backend: &'static str,
    normalizer: Normalizer,
    always: bool,
) -> PropertyRule {
    PropertyRule {
        canonical,
        backend,
        normalizer,
        always,
    }
}

const PROPERTY_TABLE: &[PropertyRule] = &[
    rule("Content-Type", "Content-Type", Normalizer::Text, true),
    rule("Content-Encoding", "Content-Encoding", Normalizer::Text, true),
    rule("Content-Language", "Content-Language", Normalizer::Text, true),
    rule("Content-Hash", "Content-MD5", Normalizer::Hash, true),
    rule("Content-Disposition", "Content-Disposition", Normalizer::Text, true),
    rule("Cache-Control", "Cache-Control", Normalizer::Text, true),
    rule("Last-Modified", "Last-Modified", Normalizer::Timestamp, false),
    rule("Created-On", "x-ms-creation-time", Normalizer::Timestamp, false),
    rule("Blob-Type", "x-ms-blob-type", Normalizer::Text, false),
    rule("Lease-State", "x-ms-lease-state", Normalizer::Text, false),
    rule("Lease-Status", "x-ms-lease-status", Normalizer::Text, false),
    rule("Content-Length", "Content-Length", Normalizer::Integer, false),
    rule("ETag", "ETag", Normalizer::Text, false),
    rule("IsServerEncrypted", "x-ms-server-encrypted", Normalizer::Boolean, false),
    rule("Access-Tier", "x-ms-access-tier", Normalizer::Text, false),
    rule(
        "Is-Access-Tier-Inferred",
        "x-ms-access-tier-inferred",
        Normalizer::Boolean,
        false,
    ),
    rule(
        "Access-Tier-Changed-On",
        "x-ms-access-tier-change-time",
        Normalizer::Timestamp,
        false,
    ),
    rule("Has-Legal-Hold", "x-ms-legal-hold", Normalizer::Boolean, false),
];

/// Ordered, canonical key-value metadata of one object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataRecord {
    entries: Vec<(String, String)>,
}

impl MetadataRecord {
    /// Build a record from backend properties
    pub fn from_properties(properties: &BlobProperties) -> Self {
        let mut entries = Vec::with_capacity(PROPERTY_TABLE.len());

        for rule in PROPERTY_TABLE {
            match properties.get(rule.backend) {
                Some(raw) => entries.push((rule.canonical.to_string(), normalize(rule, raw))),
                None if rule.always => entries.push((rule.canonical.to_string(), String::new())),
                None => {}
            }
        }

        for (name, value) in &properties.native {
            let is_user_metadata = name.len() > USER_METADATA_PREFIX.len()
                && name
                    .get(..USER_METADATA_PREFIX.len())
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(USER_METADATA_PREFIX));
            if is_user_metadata {
                entries.push((name.clone(), value.clone()));
            }
        }

        Self { entries }
    }

    /// Value of `key`, if present
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether `key` is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Entries in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the record is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for MetadataRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-- metadata --")?;
        for (key, value) in &self.entries {
            write!(f, "\n{}: {}", key, value)?;
        }
        Ok(())
    }
}

fn normalize(rule: &PropertyRule, raw: &str) -> String {
    let normalized = match rule.normalizer {
        Normalizer::Text => return raw.to_string(),
        Normalizer::Timestamp => normalize_timestamp(raw),
        Normalizer::Hash => normalize_hash(raw),
        Normalizer::Integer => raw.trim().parse::<u64>().ok().map(|n| n.to_string()),
        Normalizer::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "true" => Some("true".to_string()),
            "false" => Some("false".to_string()),
            _ => None,
        },
    };

    normalized.unwrap_or_else(|| {
        if !raw.is_empty() {
            warn!(key = rule.canonical, value = raw, "Passing through malformed property");
        }
        raw.to_string()
    })
}

/// Render a backend timestamp as `YYYY-MM-DDTHH:MM:SSZ`
pub fn normalize_timestamp(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let parsed = DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()?;
    Some(format_timestamp(&parsed.with_timezone(&Utc)))
}

/// Canonical rendering of a timestamp
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Decode a base64 digest and render it as upper-case hex
pub fn normalize_hash(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return Some(String::new());
    }
    STANDARD.decode(raw.trim()).ok().map(hex::encode_upper)
}
