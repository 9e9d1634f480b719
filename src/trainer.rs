//! Word embedding trainer (word2vec skip-gram / CBOW).
//!
//! The trainer consumes phrase-merged token lists and produces a
//! [`KeyedVectors`] table.  Training runs on a fixed-size rayon pool: each
//! epoch the corpus is partitioned across workers, every worker computes
//! sparse gradient accumulations against the epoch-start weights, and the
//! summed deltas are applied sequentially.  From the pipeline's point of view
//! training is one atomic step; the pool is purely a throughput detail.

use std::cmp::Reverse;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use rustc_hash::FxHashMap;

use crate::config::{Algorithm, TrainParams};
use crate::error::{IntervecError, Result};
use crate::model::KeyedVectors;
use crate::tokens::TokenList;

/// Floor the learning rate decays towards over the course of a run.
const MIN_LEARNING_RATE: f32 = 1e-4;
/// Exponent applied to unigram counts when building the sampling table.
const NEGATIVE_TABLE_POWER: f64 = 0.75;
/// Base seed for embedding initialisation and worker RNG streams.
const BASE_SEED: u64 = 0x1057_ec70_4d0d_e15e;

/// Configured word2vec trainer.
#[derive(Debug, Clone)]
pub struct Word2VecTrainer {
    params: TrainParams,
}

/// Sparse per-worker gradient accumulation for one weight matrix.
type Deltas = FxHashMap<usize, Vec<f32>>;

impl Word2VecTrainer {
    /// Creates a trainer for the supplied parameters.
    pub fn new(params: TrainParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Returns an immutable reference to the underlying parameters.
    #[must_use]
    pub fn params(&self) -> &TrainParams {
        &self.params
    }

    /// Trains a model from the supplied token lists.
    ///
    /// Tokens occurring fewer than `min_count` times are excluded from the
    /// vocabulary entirely; a corpus with nothing above the cutoff yields a
    /// model with an empty vocabulary, which is a valid outcome.
    pub fn train(&self, sentences: &[TokenList]) -> Result<KeyedVectors> {
        let dim = self.params.dimensionality;
        let vocab = build_vocab(sentences, self.params.min_count);
        if vocab.tokens.is_empty() {
            return KeyedVectors::new(dim, Vec::new(), Vec::new());
        }

        let encoded = encode_sentences(sentences, &vocab.index);
        let sampling = NegativeTable::new(&vocab.counts);

        let mut init_rng = StdRng::seed_from_u64(BASE_SEED);
        let mut input: Vec<Vec<f32>> = (0..vocab.tokens.len())
            .map(|_| {
                (0..dim)
                    .map(|_| (init_rng.gen::<f32>() - 0.5) / dim as f32)
                    .collect()
            })
            .collect();
        let mut output: Vec<Vec<f32>> = vec![vec![0.0; dim]; vocab.tokens.len()];

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.params.workers)
            .build()
            .map_err(|err| IntervecError::Internal(err.to_string()))?;

        let chunk_size = encoded.len().div_ceil(self.params.workers).max(1);
        for epoch in 0..self.params.epochs {
            let progress = epoch as f32 / self.params.epochs as f32;
            let lr = (self.params.learning_rate
                - (self.params.learning_rate - MIN_LEARNING_RATE) * progress)
                .max(MIN_LEARNING_RATE);

            let (input_deltas, output_deltas) = pool.install(|| {
                encoded
                    .par_chunks(chunk_size)
                    .enumerate()
                    .map(|(chunk_idx, chunk)| {
                        let seed = BASE_SEED
                            ^ (epoch as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
                            ^ (chunk_idx as u64 + 1);
                        let mut worker = Worker {
                            params: &self.params,
                            input: &input,
                            output: &output,
                            sampling: &sampling,
                            rng: StdRng::seed_from_u64(seed),
                            lr,
                            input_deltas: Deltas::default(),
                            output_deltas: Deltas::default(),
                            dim,
                        };
                        for sentence in chunk {
                            worker.train_sentence(sentence);
                        }
                        (worker.input_deltas, worker.output_deltas)
                    })
                    .reduce(
                        || (Deltas::default(), Deltas::default()),
                        |mut acc, local| {
                            merge_deltas(&mut acc.0, local.0);
                            merge_deltas(&mut acc.1, local.1);
                            acc
                        },
                    )
            });

            apply_deltas(&mut input, input_deltas);
            apply_deltas(&mut output, output_deltas);
        }

        log::info!(
            "trained {} {}-dimensional vectors over {} sentences",
            vocab.tokens.len(),
            dim,
            encoded.len()
        );
        KeyedVectors::new(dim, vocab.tokens, input)
    }
}

struct Vocab {
    tokens: Vec<String>,
    counts: Vec<usize>,
    index: FxHashMap<String, usize>,
}

/// Counts token frequencies and keeps those at or above `min_count`, ordered
/// by descending frequency with ties broken lexically so vocabulary indices
/// are stable across runs.
fn build_vocab(sentences: &[TokenList], min_count: usize) -> Vocab {
    let mut frequencies: FxHashMap<&str, usize> = FxHashMap::default();
    for sentence in sentences {
        for token in sentence {
            *frequencies.entry(token.as_str()).or_insert(0) += 1;
        }
    }

    let mut entries: Vec<(&str, usize)> = frequencies
        .into_iter()
        .filter(|&(_, count)| count >= min_count)
        .collect();
    entries.sort_by_key(|&(token, count)| (Reverse(count), token.to_owned()));

    let tokens: Vec<String> = entries.iter().map(|(token, _)| (*token).to_owned()).collect();
    let counts: Vec<usize> = entries.iter().map(|&(_, count)| count).collect();
    let index = tokens
        .iter()
        .enumerate()
        .map(|(idx, token)| (token.clone(), idx))
        .collect();
    Vocab {
        tokens,
        counts,
        index,
    }
}

/// Rewrites sentences as vocabulary indices, dropping filtered tokens.
fn encode_sentences(sentences: &[TokenList], index: &FxHashMap<String, usize>) -> Vec<Vec<usize>> {
    sentences
        .iter()
        .map(|sentence| {
            sentence
                .iter()
                .filter_map(|token| index.get(token).copied())
                .collect()
        })
        .filter(|encoded: &Vec<usize>| !encoded.is_empty())
        .collect()
}

/// Cumulative unigram^0.75 table for drawing negative samples.
struct NegativeTable {
    cumulative: Vec<f64>,
}

impl NegativeTable {
    fn new(counts: &[usize]) -> Self {
        let mut cumulative = Vec::with_capacity(counts.len());
        let mut total = 0.0;
        for &count in counts {
            total += (count as f64).powf(NEGATIVE_TABLE_POWER);
            cumulative.push(total);
        }
        Self { cumulative }
    }

    fn draw(&self, rng: &mut StdRng) -> usize {
        let total = *self.cumulative.last().unwrap_or(&0.0);
        let target = rng.gen::<f64>() * total;
        self.cumulative.partition_point(|&value| value < target)
    }
}

struct Worker<'a> {
    params: &'a TrainParams,
    input: &'a [Vec<f32>],
    output: &'a [Vec<f32>],
    sampling: &'a NegativeTable,
    rng: StdRng,
    lr: f32,
    input_deltas: Deltas,
    output_deltas: Deltas,
    dim: usize,
}

impl Worker<'_> {
    fn train_sentence(&mut self, sentence: &[usize]) {
        if sentence.len() < 2 {
            return;
        }
        for centre in 0..sentence.len() {
            // word2vec convention: the effective window shrinks randomly per
            // centre word, weighting nearby context higher on average.
            let reduced = self.rng.gen_range(1..=self.params.window);
            let start = centre.saturating_sub(reduced);
            let end = (centre + reduced + 1).min(sentence.len());
            match self.params.algorithm {
                Algorithm::SkipGram => {
                    for context in start..end {
                        if context == centre {
                            continue;
                        }
                        self.train_pair(sentence[centre], sentence[context]);
                    }
                }
                Algorithm::Cbow => {
                    let context: Vec<usize> = (start..end)
                        .filter(|&pos| pos != centre)
                        .map(|pos| sentence[pos])
                        .collect();
                    if !context.is_empty() {
                        self.train_cbow(sentence[centre], &context);
                    }
                }
            }
        }
    }

    /// Skip-gram update for one (centre, context) pair plus negatives.
    fn train_pair(&mut self, centre: usize, context: usize) {
        let hidden = self.input[centre].clone();
        let mut hidden_err = vec![0.0f32; self.dim];

        self.train_target(&hidden, &mut hidden_err, context, 1.0);
        for _ in 0..self.params.negative_samples() {
            let sample = self.sampling.draw(&mut self.rng);
            if sample == context {
                continue;
            }
            self.train_target(&hidden, &mut hidden_err, sample, 0.0);
        }

        add_into(self.input_deltas.entry(centre), &hidden_err, self.dim);
    }

    /// CBOW update: the averaged context predicts the centre word.
    fn train_cbow(&mut self, centre: usize, context: &[usize]) {
        let mut hidden = vec![0.0f32; self.dim];
        for &word in context {
            for (h, v) in hidden.iter_mut().zip(&self.input[word]) {
                *h += v;
            }
        }
        let scale = 1.0 / context.len() as f32;
        for h in &mut hidden {
            *h *= scale;
        }

        let mut hidden_err = vec![0.0f32; self.dim];
        self.train_target(&hidden, &mut hidden_err, centre, 1.0);
        for _ in 0..self.params.negative_samples() {
            let sample = self.sampling.draw(&mut self.rng);
            if sample == centre {
                continue;
            }
            self.train_target(&hidden, &mut hidden_err, sample, 0.0);
        }

        for &word in context {
            add_into(self.input_deltas.entry(word), &hidden_err, self.dim);
        }
    }

    /// Sigmoid update against one output-layer row, accumulating the error to
    /// propagate back to the hidden layer.
    fn train_target(&mut self, hidden: &[f32], hidden_err: &mut [f32], target: usize, label: f32) {
        let row = &self.output[target];
        let dot: f32 = hidden.iter().zip(row).map(|(x, y)| x * y).sum();
        let gradient = (label - sigmoid(dot)) * self.lr;

        for (err, weight) in hidden_err.iter_mut().zip(row) {
            *err += gradient * weight;
        }
        let delta = self
            .output_deltas
            .entry(target)
            .or_insert_with(|| vec![0.0; self.dim]);
        for (d, h) in delta.iter_mut().zip(hidden) {
            *d += gradient * h;
        }
    }
}

fn add_into(
    entry: std::collections::hash_map::Entry<'_, usize, Vec<f32>>,
    values: &[f32],
    dim: usize,
) {
    let slot = entry.or_insert_with(|| vec![0.0; dim]);
    for (s, v) in slot.iter_mut().zip(values) {
        *s += v;
    }
}

fn merge_deltas(acc: &mut Deltas, local: Deltas) {
    for (idx, values) in local {
        match acc.entry(idx) {
            std::collections::hash_map::Entry::Occupied(mut slot) => {
                for (s, v) in slot.get_mut().iter_mut().zip(&values) {
                    *s += v;
                }
            }
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(values);
            }
        }
    }
}

fn apply_deltas(matrix: &mut [Vec<f32>], deltas: Deltas) {
    for (idx, values) in deltas {
        for (weight, delta) in matrix[idx].iter_mut().zip(values) {
            *weight += delta;
        }
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrainParams;

    fn sentences(raw: &[&[&str]]) -> Vec<TokenList> {
        raw.iter()
            .map(|list| list.iter().map(|s| (*s).to_owned()).collect())
            .collect()
    }

    fn small_params() -> TrainParams {
        TrainParams::builder()
            .dimensionality(50)
            .window(2)
            .workers(2)
            .epochs(2)
            .build()
            .unwrap()
    }

    #[test]
    fn trains_vectors_with_requested_dimensionality() {
        let corpus = sentences(&[&["a", "b", "c"], &["a", "c"], &["b", "a"]]);
        let trainer = Word2VecTrainer::new(small_params()).unwrap();
        let model = trainer.train(&corpus).expect("train");

        assert_eq!(model.len(), 3);
        assert_eq!(model.dimensionality(), 50);
        assert_eq!(model.vector("a").map(<[f32]>::len), Some(50));
    }

    #[test]
    fn min_count_filters_vocabulary() {
        let corpus = sentences(&[&["a", "a", "b"], &["a", "c"]]);
        let params = TrainParams::builder()
            .dimensionality(50)
            .min_count(2)
            .build()
            .unwrap();
        let trainer = Word2VecTrainer::new(params).unwrap();
        let model = trainer.train(&corpus).expect("train");

        assert!(model.contains("a"));
        assert!(!model.contains("b"));
        assert!(!model.contains("c"));
    }

    #[test]
    fn empty_corpus_yields_empty_model() {
        let trainer = Word2VecTrainer::new(small_params()).unwrap();
        let model = trainer.train(&[]).expect("train");
        assert!(model.is_empty());
        assert_eq!(model.dimensionality(), 50);
    }

    #[test]
    fn everything_below_cutoff_yields_empty_model() {
        let corpus = sentences(&[&["a", "b"], &["c", "d"]]);
        let params = TrainParams::builder()
            .dimensionality(50)
            .min_count(10)
            .build()
            .unwrap();
        let trainer = Word2VecTrainer::new(params).unwrap();
        let model = trainer.train(&corpus).expect("train");
        assert!(model.is_empty());
    }

    #[test]
    fn cbow_and_negative_sampling_produce_full_vocabulary() {
        let corpus = sentences(&[&["x", "y", "z", "x", "y"], &["z", "x", "y"]]);
        let params = TrainParams::builder()
            .algorithm(Algorithm::Cbow)
            .dimensionality(50)
            .negative(true)
            .workers(2)
            .build()
            .unwrap();
        let trainer = Word2VecTrainer::new(params).unwrap();
        let model = trainer.train(&corpus).expect("train");
        assert_eq!(model.len(), 3);
        assert!(model.vector("z").is_some());
    }

    #[test]
    fn vocabulary_order_is_stable() {
        let corpus = sentences(&[&["b", "a", "b"], &["a", "c", "b"]]);
        let trainer = Word2VecTrainer::new(small_params()).unwrap();
        let first = trainer.train(&corpus).expect("train");
        let second = trainer.train(&corpus).expect("train");
        assert_eq!(first.vocab(), second.vocab());
        // b occurs three times, a twice, c once.
        assert_eq!(first.vocab()[0], "b");
        assert_eq!(first.vocab()[1], "a");
    }
}
