//! Tag-overlap recommendations over the stored inventory
//!
//! Every attribute value of a liked entry becomes a preference, counted once
//! per liked entry. A candidate scores the sum of `count * weight` over its
//! matching attributes, where the weight depends on the attribute key.
//! Entries the user has already rated are never recommended.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::models::{AttributeKey, InventoryEntry};

/// Number of recommendations returned when the caller does not choose.
pub const DEFAULT_RECOMMENDATIONS: usize = 10;

const STARTER_REASON: &str = "Some popular styles to start!";
const FALLBACK_REASON: &str = "A popular style you might like";

/// How much a matching value of this key contributes to a score.
pub fn tag_weight(key: AttributeKey) -> u32 {
    match key {
        AttributeKey::Style => 5,
        AttributeKey::Occasion => 4,
        AttributeKey::GarmentType => 3,
        AttributeKey::Fitting => 2,
        AttributeKey::Color => 1,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub entry: InventoryEntry,
    pub score: u32,
    pub reason: String,
}

/// Rank `inventory` against the user's likes.
///
/// Without likes the first `limit` unrated entries are returned as starters.
/// Ties keep inventory order. Unspecified attributes never match.
pub fn recommend(
    liked: &[InventoryEntry],
    disliked: &[InventoryEntry],
    inventory: &[InventoryEntry],
    limit: usize,
) -> Vec<Recommendation> {
    let seen: HashSet<&str> = liked
        .iter()
        .chain(disliked)
        .map(|entry| entry.id.as_str())
        .collect();
    let unseen = inventory
        .iter()
        .filter(|entry| !seen.contains(entry.id.as_str()));

    if liked.is_empty() {
        return unseen
            .take(limit)
            .map(|entry| Recommendation {
                entry: entry.clone(),
                score: 0,
                reason: STARTER_REASON.to_string(),
            })
            .collect();
    }

    let mut preferences: HashMap<(AttributeKey, &str), u32> = HashMap::new();
    for entry in liked {
        for (key, value) in entry.attributes.iter() {
            if value.is_specified() {
                *preferences.entry((key, value.as_str())).or_default() += 1;
            }
        }
    }

    let mut scored: Vec<Recommendation> = unseen
        .map(|entry| {
            let mut score = 0;
            let mut highlights: Vec<&str> = Vec::new();

            for (key, value) in entry.attributes.iter() {
                let Some(count) = preferences.get(&(key, value.as_str())) else {
                    continue;
                };
                score += count * tag_weight(key);
                let highlighted = matches!(key, AttributeKey::Style | AttributeKey::Occasion);
                if highlighted && !highlights.contains(&value.as_str()) {
                    highlights.push(value.as_str());
                }
            }

            let reason = if highlights.is_empty() {
                FALLBACK_REASON.to_string()
            } else {
                format!(
                    "Because you like {}",
                    highlights.iter().take(2).copied().collect::<Vec<_>>().join(" & ")
                )
            };

            Recommendation {
                entry: entry.clone(),
                score,
                reason,
            }
        })
        .collect();

    // Stable, so equal scores keep inventory order
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(limit);
    scored
}
