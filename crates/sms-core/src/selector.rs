//! Weighted provider selection
//!
//! For every candidate (registered and not excluded):
//!
//! ```text
//! actual  = call_count / sum(call_count of candidates)   (sum treated as 1 when 0)
//! desired = call_ratio / sum(call_ratio of candidates)   (sum treated as 1 when 0)
//! ```
//!
//! The candidate with the smallest `actual - desired` is chosen, ties going
//! to the lowest provider identifier. The most underserved provider is
//! therefore always picked next, which pulls the running distribution
//! toward the configured ratios.
//!
//! Both shares have the same denominators for all candidates, so the
//! comparison is done on `call_count * R - call_ratio * C` in exact integer
//! arithmetic (`C` and `R` being the two sums). Ties are exact.
//!
//! Selection is read-only. Counters are charged by the delivery client when
//! an attempt is actually made.

use std::collections::HashSet;

use crate::model::{ProviderId, ProviderSnapshot};
use crate::registry::ProviderRegistry;

/// Pick the next provider for a dispatch attempt
///
/// Returns `None` when every registered provider is excluded (or none is
/// registered).
pub fn select(
    registry: &ProviderRegistry,
    excluded: &HashSet<ProviderId>,
) -> Option<ProviderSnapshot> {
    let candidates: Vec<ProviderSnapshot> = registry
        .snapshot()
        .into_iter()
        .filter(|provider| !excluded.contains(&provider.id))
        .collect();

    select_from(candidates)
}

/// Selection over an explicit candidate list
pub fn select_from(candidates: Vec<ProviderSnapshot>) -> Option<ProviderSnapshot> {
    let total_calls: u128 = candidates.iter().map(|p| u128::from(p.call_count)).sum();
    let total_ratio: u128 = candidates.iter().map(|p| u128::from(p.call_ratio)).sum();
    let total_calls = total_calls.max(1) as i128;
    let total_ratio = total_ratio.max(1) as i128;

    let best = candidates.into_iter().min_by(|a, b| {
        share_gap(a, total_calls, total_ratio)
            .cmp(&share_gap(b, total_calls, total_ratio))
            .then(a.id.cmp(&b.id))
    })?;

    tracing::debug!(
        "Selected {} ({}, ratio {}, calls {})",
        best.id,
        best.url,
        best.call_ratio,
        best.call_count
    );

    Some(best)
}

/// `actual - desired`, scaled by `total_calls * total_ratio`
fn share_gap(provider: &ProviderSnapshot, total_calls: i128, total_ratio: i128) -> i128 {
    i128::from(provider.call_count) * total_ratio - i128::from(provider.call_ratio) * total_calls
}
