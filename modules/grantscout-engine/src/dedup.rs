//! Duplicate collapse for retrieved records.
//!
//! Records sharing an identity key (trimmed title, trimmed URL without a
//! trailing slash) denote the same program and are merged field by field.
//! Merged fields only ever gain information: the summary is replaced when a
//! strictly longer one arrives, every other field is filled only while
//! empty. Blank records (no title, no URL) all share one key and will merge
//! with each other; callers that care must filter them out first.

use std::collections::HashMap;

use grantscout_common::{AmountTier, ProgramRecord};

/// Collapse duplicates, keeping first-seen order. Order is not meaningful
/// downstream; the ranker reorders.
pub fn dedup(records: Vec<ProgramRecord>) -> Vec<ProgramRecord> {
    let mut merged: Vec<ProgramRecord> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for record in records {
        let key = record.identity_key();
        match index.get(&key) {
            Some(&i) => merge_fields(&mut merged[i], &record),
            None => {
                index.insert(key, merged.len());
                merged.push(record);
            }
        }
    }

    merged
}

/// Merge `incoming` into `existing` under the monotonic fill rules.
pub fn merge_fields(existing: &mut ProgramRecord, incoming: &ProgramRecord) {
    // Summary is the one field where longer wins over non-empty.
    if incoming.summary.len() > existing.summary.len() {
        existing.summary = incoming.summary.clone();
    }

    fill_if_empty(&mut existing.source, &incoming.source);
    fill_if_empty(&mut existing.publish_date, &incoming.publish_date);
    fill_if_empty(&mut existing.support_text, &incoming.support_text);
    fill_if_empty(&mut existing.attachment_url, &incoming.attachment_url);
    fill_if_empty(&mut existing.applicable_scope, &incoming.applicable_scope);
    fill_if_empty(&mut existing.full_text, &incoming.full_text);
    fill_if_empty(&mut existing.topic, &incoming.topic);
    fill_if_empty(&mut existing.validity, &incoming.validity);
    fill_if_empty(&mut existing.deadline, &incoming.deadline);
    fill_if_empty(&mut existing.amount_estimate, &incoming.amount_estimate);

    if existing.amount_tier == AmountTier::Unknown {
        existing.amount_tier = incoming.amount_tier;
    }
}

fn fill_if_empty(dst: &mut String, src: &str) {
    if dst.is_empty() && !src.is_empty() {
        *dst = src.to_string();
    }
}
