//! Configuration builders controlling embedding training and phrase detection.

use crate::error::{IntervecError, Result};
use serde::{Deserialize, Serialize};

/// Training algorithm used by the embedding trainer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[cfg_attr(feature = "cli", value(rename_all = "lower"))]
pub enum Algorithm {
    /// Continuous bag of words: predict the centre word from its context.
    Cbow,
    /// Skip-gram: predict context words from the centre word.
    #[default]
    SkipGram,
}

/// Number of negative samples drawn per positive pair when negative sampling
/// is enabled.
pub const NEGATIVE_SAMPLE_COUNT: usize = 5;

/// Configuration for one embedding training run.
///
/// `window` and `min_count` are clamped rather than rejected: a window of 0
/// becomes 1 and one of 15 becomes 10, matching the parameter surface the
/// surrounding pipeline exposes to users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainParams {
    /// Training algorithm.
    pub algorithm: Algorithm,
    /// Maximum distance between the centre and a predicted word, in `[1, 10]`.
    pub window: usize,
    /// Dimensionality of the word vectors, in `[50, 1000]`.
    pub dimensionality: usize,
    /// Enables negative sampling with [`NEGATIVE_SAMPLE_COUNT`] samples.
    pub negative: bool,
    /// Minimum corpus frequency for a token to enter the vocabulary, `>= 1`.
    pub min_count: usize,
    /// Number of passes over the corpus.
    pub epochs: usize,
    /// Initial learning rate, decayed linearly across epochs.
    pub learning_rate: f32,
    /// Size of the worker pool used internally by the trainer.
    pub workers: usize,
}

impl TrainParams {
    /// Returns a builder initialised with [`TrainParams::default`].
    #[must_use]
    pub fn builder() -> TrainParamsBuilder {
        TrainParamsBuilder::default()
    }

    /// Validates the invariants required for training.
    pub fn validate(&self) -> Result<()> {
        if !(50..=1000).contains(&self.dimensionality) {
            return Err(IntervecError::InvalidConfig(format!(
                "dimensionality ({}) must be within [50, 1000]",
                self.dimensionality
            )));
        }
        if self.epochs == 0 {
            return Err(IntervecError::InvalidConfig(
                "epochs must be greater than zero".into(),
            ));
        }
        if self.workers == 0 {
            return Err(IntervecError::InvalidConfig(
                "workers must be greater than zero".into(),
            ));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(IntervecError::InvalidConfig(format!(
                "learning_rate ({}) must be positive and finite",
                self.learning_rate
            )));
        }
        Ok(())
    }

    /// Effective number of negative samples per positive pair.
    #[must_use]
    pub fn negative_samples(&self) -> usize {
        if self.negative {
            NEGATIVE_SAMPLE_COUNT
        } else {
            0
        }
    }
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::SkipGram,
            window: 5,
            dimensionality: 100,
            negative: false,
            min_count: 1,
            epochs: 5,
            learning_rate: 0.025,
            workers: 3,
        }
    }
}

/// Builder for [`TrainParams`].
#[derive(Debug, Default, Clone)]
pub struct TrainParamsBuilder {
    params: TrainParams,
}

impl TrainParamsBuilder {
    /// Creates a builder with [`TrainParams::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the training algorithm.
    #[must_use]
    pub fn algorithm(mut self, value: Algorithm) -> Self {
        self.params.algorithm = value;
        self
    }

    /// Sets the context window size; clamped to `[1, 10]` on build.
    #[must_use]
    pub fn window(mut self, value: usize) -> Self {
        self.params.window = value;
        self
    }

    /// Sets the word vector dimensionality.
    #[must_use]
    pub fn dimensionality(mut self, value: usize) -> Self {
        self.params.dimensionality = value;
        self
    }

    /// Enables or disables negative sampling.
    #[must_use]
    pub fn negative(mut self, enabled: bool) -> Self {
        self.params.negative = enabled;
        self
    }

    /// Sets the minimum token frequency; clamped to `>= 1` on build.
    #[must_use]
    pub fn min_count(mut self, value: usize) -> Self {
        self.params.min_count = value;
        self
    }

    /// Sets the number of training epochs.
    #[must_use]
    pub fn epochs(mut self, value: usize) -> Self {
        self.params.epochs = value;
        self
    }

    /// Sets the initial learning rate.
    #[must_use]
    pub fn learning_rate(mut self, value: f32) -> Self {
        self.params.learning_rate = value;
        self
    }

    /// Sets the trainer worker pool size.
    #[must_use]
    pub fn workers(mut self, value: usize) -> Self {
        self.params.workers = value;
        self
    }

    /// Finalises the builder, returning validated [`TrainParams`].
    pub fn build(mut self) -> Result<TrainParams> {
        self.params.window = self.params.window.clamp(1, 10);
        self.params.min_count = self.params.min_count.max(1);
        self.params.validate()?;
        Ok(self.params)
    }
}

/// Configuration for the bigram phrase detector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhraseConfig {
    /// Minimum number of occurrences before a bigram is considered.
    pub min_count: usize,
    /// Collocation score a bigram must exceed to be merged.
    pub threshold: f64,
    /// Separator inserted between the parts of a merged compound token.
    pub delimiter: String,
}

impl PhraseConfig {
    /// Returns a builder initialised with [`PhraseConfig::default`].
    #[must_use]
    pub fn builder() -> PhraseConfigBuilder {
        PhraseConfigBuilder::default()
    }

    /// Validates the invariants required for phrase detection.
    pub fn validate(&self) -> Result<()> {
        if self.min_count == 0 {
            return Err(IntervecError::InvalidConfig(
                "phrase min_count must be greater than zero".into(),
            ));
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(IntervecError::InvalidConfig(format!(
                "phrase threshold ({}) must be positive and finite",
                self.threshold
            )));
        }
        if self.delimiter.is_empty() {
            return Err(IntervecError::InvalidConfig(
                "phrase delimiter must not be empty".into(),
            ));
        }
        Ok(())
    }
}

impl Default for PhraseConfig {
    fn default() -> Self {
        Self {
            min_count: 5,
            threshold: 10.0,
            delimiter: "_".into(),
        }
    }
}

/// Builder for [`PhraseConfig`].
#[derive(Debug, Default, Clone)]
pub struct PhraseConfigBuilder {
    cfg: PhraseConfig,
}

impl PhraseConfigBuilder {
    /// Creates a builder with [`PhraseConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the minimum bigram occurrence count.
    #[must_use]
    pub fn min_count(mut self, value: usize) -> Self {
        self.cfg.min_count = value;
        self
    }

    /// Sets the collocation score threshold.
    #[must_use]
    pub fn threshold(mut self, value: f64) -> Self {
        self.cfg.threshold = value;
        self
    }

    /// Sets the compound token delimiter.
    #[must_use]
    pub fn delimiter<S: Into<String>>(mut self, value: S) -> Self {
        self.cfg.delimiter = value.into();
        self
    }

    /// Finalises the builder, returning a validated [`PhraseConfig`].
    pub fn build(self) -> Result<PhraseConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}
