//! Integration tests for the scenario selector against a real index.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use wordbomb_dict::DictionaryIndex;
use wordbomb_protocol::Scenario;
use wordbomb_room::choose_syllable;

static NEXT_FILE: AtomicU32 = AtomicU32::new(0);

fn dict_file(contents: &str) -> PathBuf {
    let n = NEXT_FILE.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("wordbomb-room-tests-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("dict-{n}.txt"));
    std::fs::write(&path, contents).unwrap();
    path
}

/// A dictionary where the 2-letter syllables "XY" and "ZT" are rare
/// (count 1 each) and "ON"/"AN" are common.
async fn skewed_index() -> DictionaryIndex {
    let mut words = String::from("wxyv\nwztv\n");
    for i in 0..20 {
        words.push_str(&format!("bonbon{i:02}\nbanane{i:02}\n"));
    }
    let path = dict_file(&words);
    DictionaryIndex::build_from(&path, 30).await.unwrap()
}

#[tokio::test]
async fn test_plain_selection_draws_from_index() {
    let index = skewed_index().await;
    let mut used = HashSet::new();
    let syl = choose_syllable(Some(&index), None, &mut used, None).unwrap();
    assert!(index.count_for(&syl).is_some(), "{syl} should be indexed");
    assert!(syl.chars().count() == 2 || syl.chars().count() == 3);
}

#[tokio::test]
async fn test_sub8_only_emits_rare_syllables() {
    // Only "XY", "ZT" (and the other substrings of the two rare words)
    // have count ≤ 8; the frequent ON/AN/BO/NA families all exceed it.
    let index = skewed_index().await;
    let mut used = HashSet::new();
    for _ in 0..40 {
        let syl = choose_syllable(Some(&index), Some(Scenario::Sub8), &mut used.clone(), None)
            .expect("sub8 must always produce a syllable here");
        let count = index.count_for(&syl).unwrap();
        assert!(count <= 8, "{syl} has count {count}, outside sub8");
    }
}

#[tokio::test]
async fn test_sub8_used_set_clears_within_scenario() {
    // Exhaust the whole sub8 pool, then verify selection continues
    // inside the scenario instead of hanging or escaping it.
    let index = skewed_index().await;
    let mut used = HashSet::new();

    // Collect the full sub8 pool by repeated exhaustion.
    let mut pool = HashSet::new();
    loop {
        let before = pool.len();
        let syl =
            choose_syllable(Some(&index), Some(Scenario::Sub8), &mut used, None).unwrap();
        used.insert(syl.clone());
        pool.insert(syl);
        if pool.len() == before {
            break;
        }
        // The pool in this fixture is tiny; guard against runaway.
        assert!(pool.len() < 100);
    }

    // Every further pick stays within the sub8 pool.
    for _ in 0..10 {
        let syl =
            choose_syllable(Some(&index), Some(Scenario::Sub8), &mut used, None).unwrap();
        assert!(pool.contains(&syl), "{syl} escaped the sub8 pool");
        used.insert(syl);
    }
}

#[tokio::test]
async fn test_sub8_with_no_qualifying_syllable_still_produces() {
    // Every syllable in this dictionary has count > 8: sub8 has zero
    // candidates at all, so the fallback path may leave the scenario but
    // must not loop or fail.
    let mut words = String::new();
    for i in 0..20 {
        words.push_str(&format!("bonbon{i:02}\n"));
    }
    let path = dict_file(&words);
    let index = DictionaryIndex::build_from(&path, 30).await.unwrap();

    let mut used = HashSet::new();
    let syl = choose_syllable(Some(&index), Some(Scenario::Sub8), &mut used, None);
    assert!(syl.is_some(), "fallback must still produce a syllable");
}

#[tokio::test]
async fn test_four_letters_scenario_emits_only_length_four() {
    let index = skewed_index().await;
    let mut used = HashSet::new();
    for _ in 0..20 {
        let syl = choose_syllable(
            Some(&index),
            Some(Scenario::FourLetters),
            &mut used.clone(),
            None,
        )
        .unwrap();
        assert_eq!(syl.chars().count(), 4, "{syl} is not 4 letters");
    }
}

#[tokio::test]
async fn test_sqrt_weighting_prefers_frequent_syllables() {
    // "ON" appears in 20 words, "XY" in 1. Over many unfiltered draws
    // the frequent families must dominate.
    let index = skewed_index().await;
    let mut frequent = 0u32;
    let mut rare = 0u32;
    for _ in 0..300 {
        let mut used = HashSet::new();
        let syl = choose_syllable(Some(&index), None, &mut used, None).unwrap();
        match index.count_for(&syl) {
            Some(c) if c >= 20 => frequent += 1,
            Some(1) => rare += 1,
            _ => {}
        }
    }
    assert!(
        frequent > rare,
        "sqrt weighting should favor frequent syllables ({frequent} vs {rare})"
    );
}

#[tokio::test]
async fn test_train_skip_with_index_weights_known_candidates() {
    let index = skewed_index().await;
    let allowed: HashSet<String> = ["ON", "QQ"].iter().map(|s| s.to_string()).collect();
    let mut used = HashSet::new();
    // "QQ" is not in the index; "ON" is. Known candidates win the draw.
    let syl = choose_syllable(
        Some(&index),
        Some(Scenario::TrainSkip),
        &mut used,
        Some(&allowed),
    )
    .unwrap();
    assert_eq!(syl, "ON");
}
