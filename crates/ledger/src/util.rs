//! Internal helpers for validation and text normalization.
//!
//! Not part of the public API. Name matching across the ledger (wallets,
//! categories, tags) goes through `normalize_key` so uniqueness is
//! case-, accent- and whitespace-insensitive.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};
use uuid::Uuid;

use crate::{LedgerError, LedgerResult};

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> LedgerResult<Uuid> {
    Uuid::parse_str(value).map_err(|_| LedgerError::Validation(format!("invalid {label} id")))
}

/// Trim and collapse internal whitespace, keeping the user's casing.
pub(crate) fn normalize_display(input: &str, label: &str) -> LedgerResult<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::Validation(format!(
            "{label} name must not be empty"
        )));
    }
    let mut out = String::new();
    for token in trimmed.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(token);
    }
    Ok(out)
}

/// Reduce a display name to its comparison key: NFKD, combining marks
/// stripped, lowercased alphanumerics with single-space separators.
pub(crate) fn normalize_key(input: &str) -> String {
    let mut out = String::new();
    let mut prev_space = false;
    for ch in input.trim().nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
            prev_space = false;
        } else if !out.is_empty() && !prev_space {
            out.push(' ');
            prev_space = true;
        }
    }
    out.trim().to_string()
}

/// Encode a list of ids as the JSON stored in TEXT columns.
pub(crate) fn encode_id_list(ids: &[Uuid]) -> String {
    let raw: Vec<String> = ids.iter().map(Uuid::to_string).collect();
    serde_json::to_string(&raw).unwrap_or_else(|_| "[]".to_string())
}

/// Decode a JSON id list column.
pub(crate) fn decode_id_list(raw: &str, label: &str) -> LedgerResult<Vec<Uuid>> {
    let parsed: Vec<String> = serde_json::from_str(raw)
        .map_err(|_| LedgerError::Serialization(format!("invalid {label} id list")))?;
    let mut out = Vec::with_capacity(parsed.len());
    for value in parsed {
        out.push(parse_uuid(&value, label)?);
    }
    Ok(out)
}

pub(crate) fn encode_string_list(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

pub(crate) fn decode_string_list(raw: &str, label: &str) -> LedgerResult<Vec<String>> {
    serde_json::from_str(raw)
        .map_err(|_| LedgerError::Serialization(format!("invalid {label} list")))
}
