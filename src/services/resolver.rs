use crate::models::ProductRecord;
use crate::services::catalog::CatalogStore;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9]+").unwrap());

/// Maps a free-text product name to at most one catalog record.
///
/// Matching is a prioritized chain (exact, then substring, then
/// token-overlap) where each layer runs only if the previous one found
/// nothing. The chain favors precision: a below-threshold overlap is a miss,
/// never a guess, and semantic search is not part of it.
pub struct NameResolver<'a> {
    catalog: &'a CatalogStore,
    token_overlap_threshold: f32,
}

impl<'a> NameResolver<'a> {
    pub fn new(catalog: &'a CatalogStore, token_overlap_threshold: f32) -> Self {
        Self {
            catalog,
            token_overlap_threshold,
        }
    }

    pub fn resolve(&self, query: &str) -> Option<&'a ProductRecord> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Some(record) = self.catalog.get(trimmed) {
            debug!("Resolved '{}' by exact match", trimmed);
            return Some(record);
        }

        if let Some(record) = substring_match(self.catalog, trimmed) {
            debug!("Resolved '{}' to '{}' by substring", trimmed, record.name());
            return Some(record);
        }

        if let Some(record) =
            token_overlap_match(self.catalog, trimmed, self.token_overlap_threshold)
        {
            debug!(
                "Resolved '{}' to '{}' by token overlap",
                trimmed,
                record.name()
            );
            return Some(record);
        }

        debug!("No suitable match for '{}'", trimmed);
        None
    }
}

/// Query contained in a catalog name or vice versa. Among candidates the one
/// whose name length is closest to the query wins; ties keep catalog order.
fn substring_match<'a>(catalog: &'a CatalogStore, query: &str) -> Option<&'a ProductRecord> {
    let query_lower = query.to_lowercase();

    let mut best: Option<(&ProductRecord, usize)> = None;
    for record in catalog.records() {
        let name_lower = record.name().trim().to_lowercase();
        if name_lower.is_empty() {
            continue;
        }
        if !name_lower.contains(&query_lower) && !query_lower.contains(&name_lower) {
            continue;
        }

        let length_gap = name_lower.len().abs_diff(query_lower.len());
        match best {
            Some((_, best_gap)) if length_gap >= best_gap => {}
            _ => best = Some((record, length_gap)),
        }
    }

    best.map(|(record, _)| record)
}

/// Jaccard overlap of lowercase word tokens; the best candidate wins only if
/// it strictly exceeds the threshold. Ties keep catalog order.
fn token_overlap_match<'a>(
    catalog: &'a CatalogStore,
    query: &str,
    threshold: f32,
) -> Option<&'a ProductRecord> {
    let query_tokens = tokens(query);
    if query_tokens.is_empty() {
        return None;
    }

    let mut best: Option<(&ProductRecord, f32)> = None;
    for record in catalog.records() {
        let score = jaccard(&query_tokens, &tokens(record.name()));
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((record, score)),
        }
    }

    best.filter(|&(_, score)| score > threshold)
        .map(|(record, _)| record)
}

fn tokens(text: &str) -> HashSet<String> {
    TOKEN_PATTERN
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}
