use tracing::debug;

use crate::freshness::FreshnessPolicy;
use crate::model::{Category, ConsensusSnapshot, Item, ProviderResult, SourceLabel};
use crate::signature::content_signature;

/// Reconciles the latest per-provider results into a single snapshot.
///
/// Resolution order:
/// 1. no valid provider yields `None`; a single valid provider is returned
///    verbatim;
/// 2. the newest fresh-rounded provider wins outright unless another valid
///    provider reports clearly more items;
/// 3. otherwise gear and seed are each taken from the largest group of
///    providers reporting identical content.
///
/// Ties not covered by the rules above resolve to the provider that comes
/// first in the input, so identical input always yields identical output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsensusEngine {
    policy: FreshnessPolicy,
}

impl ConsensusEngine {
    pub fn new(policy: FreshnessPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> FreshnessPolicy {
        self.policy
    }

    /// `now_ms` stands in for the timestamp of a category no provider has
    /// data for.
    pub fn resolve<'a, I>(&self, results: I, now_ms: u64) -> Option<ConsensusSnapshot>
    where
        I: IntoIterator<Item = &'a ProviderResult>,
    {
        let valid: Vec<&ProviderResult> = results.into_iter().filter(|r| r.is_valid).collect();

        match valid.as_slice() {
            [] => return None,
            [only] => return Some(ConsensusSnapshot::from_provider(only)),
            _ => {}
        }

        if let Some(fresh) = self.decisive_fresh(&valid) {
            debug!(provider = %fresh.provider_id, "fresh provider short-circuits aggregation");
            return Some(ConsensusSnapshot::from_provider(fresh));
        }

        let (gear, gear_ts) = category_consensus(&valid, Category::Gear, now_ms);
        let (seed, seed_ts) = category_consensus(&valid, Category::Seed, now_ms);

        Some(ConsensusSnapshot {
            gear,
            seed,
            reported_at_ms: gear_ts.max(seed_ts),
            source: SourceLabel::Aggregated,
        })
    }

    fn decisive_fresh<'a>(&self, valid: &[&'a ProviderResult]) -> Option<&'a ProviderResult> {
        if !self.policy.enabled() {
            return None;
        }

        let (fresh_idx, fresh) = first_max_by_key(
            valid
                .iter()
                .copied()
                .enumerate()
                .filter(|(_, result)| self.policy.is_fresh_rounded(result.reported_at_ms)),
            |(_, result)| result.reported_at_ms,
        )?;

        let (_, rival) = first_max_by_key(
            valid
                .iter()
                .copied()
                .enumerate()
                .filter(|(idx, _)| *idx != fresh_idx),
            |(_, result)| result.total_items(),
        )?;

        let fresh_total = fresh.total_items();
        let rival_total = rival.total_items();
        let decisive = fresh_total > rival_total
            || (fresh_total == rival_total && fresh.gear.len() >= rival.gear.len());

        if !decisive {
            debug!(
                provider = %fresh.provider_id,
                fresh_total,
                rival = %rival.provider_id,
                rival_total,
                "fresh provider has poorer coverage, aggregating instead"
            );
        }

        decisive.then_some(fresh)
    }
}

struct SignatureGroup<'a> {
    signature: Vec<&'a Item>,
    members: Vec<&'a ProviderResult>,
}

impl<'a> SignatureGroup<'a> {
    fn newest(&self) -> Option<&'a ProviderResult> {
        first_max_by_key(self.members.iter().copied(), |member| member.reported_at_ms)
    }
}

fn category_consensus(
    valid: &[&ProviderResult],
    category: Category,
    now_ms: u64,
) -> (Vec<Item>, u64) {
    match plurality_winner(valid, category) {
        Some(winner) => {
            debug!(
                category = category.as_str(),
                provider = %winner.provider_id,
                "plurality winner selected"
            );
            (winner.items(category).to_vec(), winner.reported_at_ms)
        }
        None => (Vec::new(), now_ms),
    }
}

fn plurality_winner<'a>(
    valid: &[&'a ProviderResult],
    category: Category,
) -> Option<&'a ProviderResult> {
    let mut groups: Vec<SignatureGroup<'a>> = Vec::new();

    for result in valid.iter().copied() {
        let items = result.items(category);
        if items.is_empty() {
            continue;
        }

        let signature = content_signature(items);
        match groups.iter_mut().find(|group| group.signature == signature) {
            Some(group) => group.members.push(result),
            None => groups.push(SignatureGroup {
                signature,
                members: vec![result],
            }),
        }
    }

    let ranked = groups.iter().filter_map(|group| {
        group
            .newest()
            .map(|newest| (group.members.len(), newest))
    });

    first_max_by_key(ranked, |(size, newest)| (*size, newest.reported_at_ms))
        .map(|(_, newest)| newest)
}

/// Like `Iterator::max_by_key`, but keeps the earliest element on ties.
fn first_max_by_key<T, K, F>(items: impl IntoIterator<Item = T>, key: F) -> Option<T>
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut best: Option<(K, T)> = None;
    for item in items {
        let item_key = key(&item);
        match &best {
            Some((best_key, _)) if *best_key >= item_key => {}
            _ => best = Some((item_key, item)),
        }
    }
    best.map(|(_, item)| item)
}
