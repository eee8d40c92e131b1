//! Token estimation
//!
//! Every token figure in the pipeline goes through a [`TokenEstimator`], so a
//! real tokenizer can replace the character-ratio proxy without touching
//! scoring or gating.

/// Characters per token assumed by [`CharRatioEstimator`]
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimates the token count of a text
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> u64;
}

/// Crude proxy: `floor(chars / 4)`
#[derive(Debug, Clone, Copy, Default)]
pub struct CharRatioEstimator;

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> u64 {
        (text.chars().count() / CHARS_PER_TOKEN) as u64
    }
}
