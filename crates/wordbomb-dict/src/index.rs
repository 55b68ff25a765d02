//! The in-memory dictionary index.
//!
//! One-shot construction from a plaintext word list. For each syllable
//! length L ∈ {2,3,4} the index maps syllable → number of *distinct*
//! words containing it, plus a bounded sample of such words. Full-word
//! membership is a set of 32-bit hashes -- compact, with collisions
//! accepted since validation is advisory at gameplay scale.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::DictError;

/// Syllable lengths the index is built for.
pub const SYLLABLE_LENGTHS: [usize; 3] = [2, 3, 4];

/// Default cap on sample words kept per syllable.
pub const DEFAULT_SAMPLE_CAP: usize = 30;

/// Result of a successful build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    /// Non-empty lines consumed from the dictionary file.
    pub lines_processed: usize,
}

/// FNV-1a, 32 bits. The membership set stores these instead of strings.
fn hash32(word: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in word.as_bytes() {
        hash ^= u32::from(*byte);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Maps a syllable length to its slot in the per-length tables.
fn slot(len: usize) -> Option<usize> {
    SYLLABLE_LENGTHS.iter().position(|l| *l == len)
}

/// Normalizes a raw dictionary line or query word: trim + uppercase.
pub fn normalize(word: &str) -> String {
    word.trim().to_uppercase()
}

/// Enumerates the distinct all-letter substrings of length `len` across
/// the hyphen parts of an already-normalized word.
fn syllables_of(word: &str, len: usize, out: &mut HashSet<String>) {
    for part in word.split('-') {
        let chars: Vec<char> = part.chars().collect();
        if chars.len() < len {
            continue;
        }
        for window in chars.windows(len) {
            if window.iter().all(|c| c.is_alphabetic()) {
                out.insert(window.iter().collect());
            }
        }
    }
}

/// An immutable syllable index over one dictionary snapshot.
///
/// Built once, then shared read-only behind an `Arc`. Rebuilds construct
/// a fresh index off to the side and swap it in (see
/// [`IndexHandle`](crate::IndexHandle)).
pub struct DictionaryIndex {
    /// 32-bit hashes of every normalized dictionary word.
    members: HashSet<u32>,
    /// Per length slot: syllable → distinct-word count.
    counts: [HashMap<String, u32>; 3],
    /// Per length slot: syllable → up to `sample_cap` sample words.
    samples: [HashMap<String, Vec<String>>; 3],
    sample_cap: usize,
    lines_processed: usize,
}

impl DictionaryIndex {
    /// Streams the dictionary file and builds a complete index.
    ///
    /// Each non-empty line is normalized, hashed into the membership set,
    /// then scanned per hyphen part for letter-only substrings of each
    /// length. A word contributes at most once to a syllable's count no
    /// matter how often the syllable occurs in it.
    pub async fn build_from(
        path: impl AsRef<Path>,
        sample_cap: usize,
    ) -> Result<Self, DictError> {
        let path = path.as_ref();
        let file = File::open(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DictError::NotFound(path.to_path_buf())
            } else {
                DictError::Io(e)
            }
        })?;

        let mut index = Self {
            members: HashSet::new(),
            counts: Default::default(),
            samples: Default::default(),
            sample_cap,
            lines_processed: 0,
        };

        let mut lines = BufReader::new(file).lines();
        // Reused per word; cleared between lengths.
        let mut seen = HashSet::new();
        while let Some(line) = lines.next_line().await.map_err(DictError::Io)? {
            let word = normalize(&line);
            if word.is_empty() {
                continue;
            }
            index.lines_processed += 1;
            index.members.insert(hash32(&word));

            for (i, len) in SYLLABLE_LENGTHS.iter().enumerate() {
                seen.clear();
                syllables_of(&word, *len, &mut seen);
                for syl in seen.drain() {
                    *index.counts[i].entry(syl.clone()).or_insert(0) += 1;
                    let bucket = index.samples[i].entry(syl).or_default();
                    if bucket.len() < index.sample_cap {
                        bucket.push(word.clone());
                    }
                }
            }
        }

        tracing::info!(
            path = %path.display(),
            words = index.lines_processed,
            syllables_2 = index.counts[0].len(),
            syllables_3 = index.counts[1].len(),
            syllables_4 = index.counts[2].len(),
            "dictionary index built"
        );

        Ok(index)
    }

    /// How many words were indexed.
    pub fn lines_processed(&self) -> usize {
        self.lines_processed
    }

    /// Membership test by 32-bit hash. Case-insensitive.
    pub fn contains(&self, word: &str) -> bool {
        self.members.contains(&hash32(&normalize(word)))
    }

    /// Distinct-word count for a syllable, dispatched by its length.
    ///
    /// Returns `None` for lengths outside {2,3,4}; `Some(0)` never occurs
    /// (absent syllables also return `None`).
    pub fn count_for(&self, syllable: &str) -> Option<u32> {
        let syl = normalize(syllable);
        let i = slot(syl.chars().count())?;
        self.counts[i].get(&syl).copied()
    }

    /// The full syllable → count map for one length.
    pub fn counts_for_length(&self, len: usize) -> Option<&HashMap<String, u32>> {
        slot(len).map(|i| &self.counts[i])
    }

    /// Up to `limit` sample words containing the syllable.
    pub fn samples_for(&self, len: usize, syllable: &str, limit: usize) -> Vec<String> {
        let syl = normalize(syllable);
        let Some(i) = slot(len) else {
            return Vec::new();
        };
        match self.samples[i].get(&syl) {
            Some(words) => words.iter().take(limit).cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Syllable keys available for one length (used by selection fallback).
    pub fn sample_keys(&self, len: usize) -> Vec<&str> {
        match slot(len) {
            Some(i) => self.samples[i].keys().map(String::as_str).collect(),
            None => Vec::new(),
        }
    }

    /// The `limit` highest-count syllables of one length, descending.
    pub fn top_syllables(&self, len: usize, limit: usize) -> Vec<(String, u32)> {
        let Some(i) = slot(len) else {
            return Vec::new();
        };
        let mut entries: Vec<(String, u32)> = self.counts[i]
            .iter()
            .map(|(s, c)| (s.clone(), *c))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        entries.truncate(limit);
        entries
    }

    /// Bounded-cost substring search over the sample lists.
    ///
    /// The membership set is hash-only and not enumerable, so this is the
    /// only way to list words. Results are deduplicated; cost is bounded
    /// by the total sample volume, not the dictionary size.
    pub fn scan_containing(&self, substr: &str, limit: usize) -> Vec<String> {
        let needle = normalize(substr);
        if needle.is_empty() || limit == 0 {
            return Vec::new();
        }
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for table in &self.samples {
            for words in table.values() {
                for word in words {
                    if word.contains(&needle) && seen.insert(word.clone()) {
                        out.push(word.clone());
                        if out.len() >= limit {
                            return out;
                        }
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash32_distinguishes_nearby_words() {
        assert_eq!(hash32("BONJOUR"), hash32("BONJOUR"));
        assert_ne!(hash32("BONJOUR"), hash32("BONSOIR"));
        assert_ne!(hash32("BONJOUR"), hash32("BONJOURS"));
        assert_ne!(hash32(""), hash32(" "));
    }

    #[test]
    fn test_normalize_trims_and_uppercases() {
        assert_eq!(normalize("  bonjour \r"), "BONJOUR");
        assert_eq!(normalize("été"), "ÉTÉ");
    }

    #[test]
    fn test_syllables_of_dedups_repeats() {
        // "ANANAS" contains "AN" twice and "NA" twice; each counts once.
        let mut out = HashSet::new();
        syllables_of("ANANAS", 2, &mut out);
        let mut syls: Vec<&str> = out.iter().map(String::as_str).collect();
        syls.sort_unstable();
        assert_eq!(syls, ["AN", "AS", "NA"]);
    }

    #[test]
    fn test_syllables_of_scans_hyphen_parts_independently() {
        // No syllable may span the hyphen: "E-T" yields nothing at L=2.
        let mut out = HashSet::new();
        syllables_of("E-T", 2, &mut out);
        assert!(out.is_empty());

        out.clear();
        syllables_of("PORTE-CLE", 3, &mut out);
        assert!(out.contains("POR"));
        assert!(out.contains("CLE"));
        assert!(!out.contains("E-C"));
        assert!(!out.contains("TEC"));
    }

    #[test]
    fn test_syllables_of_skips_non_letter_windows() {
        let mut out = HashSet::new();
        syllables_of("AUJOURD'HUI", 2, &mut out);
        assert!(!out.iter().any(|s| s.contains('\'')));
        assert!(out.contains("HU"));
    }

    #[test]
    fn test_slot_covers_supported_lengths_only() {
        assert_eq!(slot(2), Some(0));
        assert_eq!(slot(4), Some(2));
        assert_eq!(slot(1), None);
        assert_eq!(slot(5), None);
    }
}
