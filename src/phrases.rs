//! Bigram collocation model merging frequent adjacent token pairs.
//!
//! A [`PhraseModel`] is trained from one full pass over a token stream and
//! then applied to every token list of the training pass, turning pairs such
//! as `["new", "york"]` into the single compound token `"new_york"` before
//! embedding training.  Scoring follows the original collocation formula
//! `(pair - min_count) * vocab / (a * b)`, so the transform is a pure
//! function of the counted corpus and reproducible across runs.

use rustc_hash::FxHashMap;

use crate::config::PhraseConfig;
use crate::error::Result;
use crate::tokens::TokenList;

/// Trained bigram phrase model.
#[must_use]
#[derive(Debug, Clone)]
pub struct PhraseModel {
    unigrams: FxHashMap<String, usize>,
    bigrams: FxHashMap<(String, String), usize>,
    cfg: PhraseConfig,
}

impl PhraseModel {
    /// Counts unigram and adjacent-bigram frequencies from one pass over a
    /// token stream.
    pub fn train<I>(stream: I, cfg: &PhraseConfig) -> Result<Self>
    where
        I: IntoIterator<Item = Result<TokenList>>,
    {
        cfg.validate()?;
        let mut unigrams: FxHashMap<String, usize> = FxHashMap::default();
        let mut bigrams: FxHashMap<(String, String), usize> = FxHashMap::default();

        for tokens in stream {
            let tokens = tokens?;
            for window in tokens.windows(2) {
                *bigrams
                    .entry((window[0].clone(), window[1].clone()))
                    .or_insert(0) += 1;
            }
            for token in tokens {
                *unigrams.entry(token).or_insert(0) += 1;
            }
        }

        Ok(Self {
            unigrams,
            bigrams,
            cfg: cfg.clone(),
        })
    }

    /// Number of distinct tokens observed during counting.
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.unigrams.len()
    }

    /// Collocation score for an adjacent pair, or `None` when either part or
    /// the pair itself was not observed often enough.
    fn score(&self, left: &str, right: &str) -> Option<f64> {
        let pair = self
            .bigrams
            .get(&(left.to_owned(), right.to_owned()))
            .copied()?;
        if pair < self.cfg.min_count {
            return None;
        }
        let left_count = *self.unigrams.get(left)?;
        let right_count = *self.unigrams.get(right)?;
        let numerator = (pair - self.cfg.min_count) as f64 * self.unigrams.len() as f64;
        let denominator = (left_count * right_count) as f64;
        if denominator == 0.0 {
            return None;
        }
        Some(numerator / denominator)
    }

    /// Applies the model to one token list, merging scored pairs greedily
    /// left to right.  A token consumed by a merge cannot start another one.
    #[must_use]
    pub fn transform(&self, tokens: &[String]) -> TokenList {
        let mut out = Vec::with_capacity(tokens.len());
        let mut idx = 0;
        while idx < tokens.len() {
            if idx + 1 < tokens.len() {
                let left = &tokens[idx];
                let right = &tokens[idx + 1];
                if self
                    .score(left, right)
                    .is_some_and(|score| score > self.cfg.threshold)
                {
                    out.push(format!("{left}{}{right}", self.cfg.delimiter));
                    idx += 2;
                    continue;
                }
            }
            out.push(tokens[idx].clone());
            idx += 1;
        }
        out
    }

    /// Number of merges the model would apply to a token list.
    #[must_use]
    pub fn merges_in(&self, tokens: &[String]) -> usize {
        tokens.len() - self.transform(tokens).len()
    }
}
