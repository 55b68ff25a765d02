//! Server-authoritative syllable selection under scenario constraints.
//!
//! Selection order:
//!
//! 1. `train skip` with an allowed set: candidates are the allowed set
//!    minus used syllables; an empty set means the training run is over
//!    and the caller ends the game.
//! 2. The count map for a uniformly chosen allowed length, filtered by
//!    `count > 0`, the used set, and the scenario's count ceiling. On
//!    exhaustion the used set is cleared (scenario-preserving reset) and
//!    the same filters retried -- never out-of-scenario syllables.
//! 3. Weighting: `sqrt(count)` when no count ceiling applies, so frequent
//!    syllables dominate without crushing mid-frequency ones; uniform
//!    under `sub8`/`sub50`, so rare syllables are equidistributed.
//! 4. Degradation: sample-list keys for the length, then the built-in
//!    seed list. `None` only when every fallback is empty.
//!
//! The caller inserts the returned syllable into the used set before
//! broadcasting.

use std::collections::HashSet;

use rand::Rng;
use wordbomb_dict::DictionaryIndex;
use wordbomb_protocol::Scenario;

/// Last-resort syllables when the index has nothing to offer.
pub const SEED_SYLLABLES: [&str; 12] = [
    "RE", "LA", "TI", "ON", "EN", "AN", "AR", "IN", "ER", "ES", "TE", "LE",
];

/// Default lengths when no scenario narrows them.
const DEFAULT_LENGTHS: [usize; 2] = [2, 3];

/// Chooses the next syllable for a room.
///
/// `used` is cleared in place when the in-scenario pool is exhausted.
/// Returns `None` when no candidate exists under the constraints, which
/// for `train skip` means the game must end.
pub fn choose_syllable(
    index: Option<&DictionaryIndex>,
    scenario: Option<Scenario>,
    used: &mut HashSet<String>,
    train_allowed: Option<&HashSet<String>>,
) -> Option<String> {
    let mut rng = rand::rng();

    if scenario == Some(Scenario::TrainSkip) {
        if let Some(allowed) = train_allowed {
            return choose_from_train_set(index, allowed, used, &mut rng);
        }
    }

    let lengths: &[usize] = scenario.map_or(&DEFAULT_LENGTHS, Scenario::allowed_lengths);
    let ceiling = scenario.and_then(Scenario::count_ceiling);

    // Pass 0 honors the used set; pass 1 runs after the reset.
    for attempt in 0..2 {
        if let Some(pick) = pick_from_counts(index, lengths, ceiling, used, &mut rng) {
            return Some(pick);
        }
        if attempt == 0 {
            if used.is_empty() {
                break;
            }
            tracing::debug!("syllable pool exhausted, clearing used set");
            used.clear();
        }
    }

    // Count maps were empty under the constraints: degrade to sample
    // keys, then to the seed list.
    if let Some(index) = index {
        let mut keys: Vec<String> = lengths
            .iter()
            .flat_map(|len| index.sample_keys(*len))
            .filter(|s| !used.contains(*s))
            .map(str::to_string)
            .collect();
        if !keys.is_empty() {
            let i = rng.random_range(0..keys.len());
            return Some(keys.swap_remove(i));
        }
    }

    let seeds: Vec<&str> = SEED_SYLLABLES
        .iter()
        .copied()
        .filter(|s| lengths.contains(&s.chars().count()) && !used.contains(*s))
        .collect();
    if seeds.is_empty() {
        return None;
    }
    Some(seeds[rng.random_range(0..seeds.len())].to_string())
}

/// Training mode: restricted to the allowed set, count-weighted where the
/// index knows the candidates, uniform otherwise.
fn choose_from_train_set(
    index: Option<&DictionaryIndex>,
    allowed: &HashSet<String>,
    used: &HashSet<String>,
    rng: &mut impl Rng,
) -> Option<String> {
    let candidates: Vec<&String> = allowed.iter().filter(|s| !used.contains(*s)).collect();
    if candidates.is_empty() {
        return None;
    }

    let weighted: Vec<(&String, f64)> = candidates
        .iter()
        .filter_map(|s| {
            let count = index?.count_for(s)?;
            (count > 0).then_some((*s, f64::from(count)))
        })
        .collect();

    if weighted.is_empty() {
        return Some(candidates[rng.random_range(0..candidates.len())].clone());
    }
    weighted_pick(&weighted, rng).map(|s| (*s).clone())
}

/// One pass over the count maps under the current filters.
fn pick_from_counts(
    index: Option<&DictionaryIndex>,
    lengths: &[usize],
    ceiling: Option<u32>,
    used: &HashSet<String>,
    rng: &mut impl Rng,
) -> Option<String> {
    let index = index?;

    // Uniform starting length, then the rest as backup.
    let mut order: Vec<usize> = lengths.to_vec();
    if order.len() > 1 {
        let shift = rng.random_range(0..order.len());
        order.rotate_left(shift);
    }

    for len in order {
        let counts = index.counts_for_length(len)?;
        let candidates: Vec<(&String, u32)> = counts
            .iter()
            .filter(|(s, c)| **c > 0 && !used.contains(*s))
            .filter(|(_, c)| ceiling.is_none_or(|max| **c <= max))
            .map(|(s, c)| (s, *c))
            .collect();
        if candidates.is_empty() {
            continue;
        }

        if ceiling.is_some() {
            // Uniform under a count filter.
            return Some(candidates[rng.random_range(0..candidates.len())].0.clone());
        }
        let weighted: Vec<(&String, f64)> = candidates
            .iter()
            .map(|(s, c)| (*s, f64::from(*c).sqrt()))
            .collect();
        return weighted_pick(&weighted, rng).map(|s| (*s).clone());
    }
    None
}

/// Roulette-wheel pick over positive weights.
fn weighted_pick<'a, T>(items: &'a [(T, f64)], rng: &mut impl Rng) -> Option<&'a T> {
    let total: f64 = items.iter().map(|(_, w)| w.max(0.0)).sum();
    if total <= 0.0 {
        return items.first().map(|(item, _)| item);
    }
    let mut roll = rng.random_range(0.0..total);
    for (item, weight) in items {
        roll -= weight.max(0.0);
        if roll <= 0.0 {
            return Some(item);
        }
    }
    items.last().map(|(item, _)| item)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_no_index_falls_back_to_seed_list() {
        let mut used = HashSet::new();
        let syl = choose_syllable(None, None, &mut used, None).unwrap();
        assert!(SEED_SYLLABLES.contains(&syl.as_str()));
    }

    #[test]
    fn test_seed_fallback_respects_used_set() {
        let mut used: HashSet<String> =
            SEED_SYLLABLES.iter().take(11).map(|s| s.to_string()).collect();
        let syl = choose_syllable(None, None, &mut used, None).unwrap();
        assert_eq!(syl, SEED_SYLLABLES[11]);
    }

    #[test]
    fn test_four_letters_scenario_without_index_has_no_seed() {
        // Seeds are all 2 letters; a 4-letter scenario can't use them.
        let mut used = HashSet::new();
        let result = choose_syllable(None, Some(Scenario::FourLetters), &mut used, None);
        assert!(result.is_none());
    }

    #[test]
    fn test_train_skip_exhausted_set_returns_none() {
        let allowed = set(&["AB", "CD"]);
        let mut used = set(&["AB", "CD"]);
        let result = choose_syllable(
            None,
            Some(Scenario::TrainSkip),
            &mut used,
            Some(&allowed),
        );
        assert!(result.is_none(), "exhausted training set must end the game");
    }

    #[test]
    fn test_train_skip_picks_only_from_allowed() {
        let allowed = set(&["AB", "CD", "EF"]);
        let mut used = set(&["AB"]);
        for _ in 0..50 {
            let syl = choose_syllable(
                None,
                Some(Scenario::TrainSkip),
                &mut used.clone(),
                Some(&allowed),
            )
            .unwrap();
            assert!(syl == "CD" || syl == "EF");
        }
    }

    #[test]
    fn test_weighted_pick_respects_zero_weights() {
        let items = vec![("a", 0.0), ("b", 5.0)];
        let mut rng = rand::rng();
        for _ in 0..20 {
            // "a" has zero weight; roulette never stops on it unless the
            // roll is exactly 0.0 at the boundary -- accept either but
            // require a result.
            assert!(weighted_pick(&items, &mut rng).is_some());
        }
    }

    #[test]
    fn test_weighted_pick_empty_is_none() {
        let items: Vec<(&str, f64)> = Vec::new();
        let mut rng = rand::rng();
        assert!(weighted_pick(&items, &mut rng).is_none());
    }
}
