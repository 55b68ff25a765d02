//! Dictionary indexing engine for wordbomb.
//!
//! One-shot construction of an in-memory index that answers, per syllable
//! length L ∈ {2,3,4}: how many distinct words contain a syllable, a
//! bounded sample of those words, and full-word membership.
//!
//! # How it fits in the stack
//!
//! ```text
//! HTTP query endpoints ─┐
//! scenario selector ────┼─→ IndexHandle ─→ Arc<DictionaryIndex>
//! word validation ──────┘        ↑
//!                        admin add/remove word → rebuild → swap
//! ```
//!
//! The index is immutable once built; admin mutations edit the file and
//! rebuild, swapping the shared reference atomically so readers observe
//! either the old or the new index, never a mix.

mod error;
mod file;
mod handle;
mod index;

pub use error::DictError;
pub use file::{append_word, remove_word};
pub use handle::IndexHandle;
pub use index::{
    normalize, BuildReport, DictionaryIndex, DEFAULT_SAMPLE_CAP, SYLLABLE_LENGTHS,
};
