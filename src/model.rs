//! Trained embedding model: the vector table kept after training.
//!
//! Only the keyed vectors survive a run; optimiser state is discarded so the
//! serialized form stays small and models cannot be re-trained downstream.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{IntervecError, Result};

/// Token-to-vector table produced by the embedding trainer.
#[must_use]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyedVectors {
    dimensionality: usize,
    vocab: Vec<String>,
    vectors: Vec<Vec<f32>>,
    #[serde(skip)]
    index: FxHashMap<String, usize>,
}

impl KeyedVectors {
    /// Constructs a model from a vocabulary and its vectors.
    ///
    /// The vocabulary and vector table must be equal in length and every
    /// vector must have `dimensionality` entries.
    pub fn new(
        dimensionality: usize,
        vocab: Vec<String>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if vocab.len() != vectors.len() {
            return Err(IntervecError::Internal(format!(
                "vocab size {} does not match vector count {}",
                vocab.len(),
                vectors.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimensionality) {
            return Err(IntervecError::Internal(format!(
                "vector of length {} does not match dimensionality {dimensionality}",
                bad.len()
            )));
        }
        let index = build_index(&vocab);
        Ok(Self {
            dimensionality,
            vocab,
            vectors,
            index,
        })
    }

    /// Number of tokens in the vocabulary.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vocab.len()
    }

    /// Returns `true` when the vocabulary is empty.  An empty model is a
    /// valid outcome for an empty or heavily filtered corpus.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vocab.is_empty()
    }

    /// Length of each vector in the table.
    #[must_use]
    pub fn dimensionality(&self) -> usize {
        self.dimensionality
    }

    /// The vocabulary in index order.
    #[must_use]
    pub fn vocab(&self) -> &[String] {
        &self.vocab
    }

    /// Returns `true` when `token` is in the vocabulary.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.index.contains_key(token)
    }

    /// The vector for `token`, if present.
    #[must_use]
    pub fn vector(&self, token: &str) -> Option<&[f32]> {
        self.index
            .get(token)
            .map(|&idx| self.vectors[idx].as_slice())
    }

    /// Cosine similarity between two in-vocabulary tokens.
    #[must_use]
    pub fn similarity(&self, a: &str, b: &str) -> Option<f32> {
        let va = self.vector(a)?;
        let vb = self.vector(b)?;
        Some(cosine(va, vb))
    }

    /// The `count` nearest vocabulary tokens to `token` by cosine similarity.
    pub fn most_similar(&self, token: &str, count: usize) -> Result<Vec<(String, f32)>> {
        let target = self
            .vector(token)
            .ok_or_else(|| IntervecError::InvalidConfig(format!("unknown token {token:?}")))?;
        let mut scored: Vec<(String, f32)> = self
            .vocab
            .iter()
            .zip(&self.vectors)
            .filter(|(other, _)| other.as_str() != token)
            .map(|(other, vector)| (other.clone(), cosine(target, vector)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(count);
        Ok(scored)
    }

    /// Serialises the vector table as JSON to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())
            .map_err(|err| IntervecError::io(err, Some(path.as_ref().to_path_buf())))?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Loads a model previously written with [`KeyedVectors::save`].
    ///
    /// The decoded table is re-validated through [`KeyedVectors::new`], so a
    /// corrupt file with mismatched lengths is rejected rather than loaded.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .map_err(|err| IntervecError::io(err, Some(path.as_ref().to_path_buf())))?;
        let raw: Self = serde_json::from_reader(BufReader::new(file))?;
        Self::new(raw.dimensionality, raw.vocab, raw.vectors)
            .map_err(|err| IntervecError::Serialization(err.to_string()))
    }
}

fn build_index(vocab: &[String]) -> FxHashMap<String, usize> {
    vocab
        .iter()
        .enumerate()
        .map(|(idx, token)| (token.clone(), idx))
        .collect()
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> KeyedVectors {
        KeyedVectors::new(
            3,
            vec!["a".into(), "b".into(), "c".into()],
            vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![1.0, 0.1, 0.0],
            ],
        )
        .expect("valid model")
    }

    #[test]
    fn lookup_and_similarity() {
        let model = sample();
        assert_eq!(model.len(), 3);
        assert_eq!(model.dimensionality(), 3);
        assert!(model.contains("a"));
        assert!(!model.contains("z"));
        assert_eq!(model.vector("b"), Some([0.0, 1.0, 0.0].as_slice()));

        let ab = model.similarity("a", "b").expect("similarity");
        let ac = model.similarity("a", "c").expect("similarity");
        assert!(ac > ab);
    }

    #[test]
    fn most_similar_orders_by_cosine() {
        let model = sample();
        let neighbours = model.most_similar("a", 2).expect("neighbours");
        assert_eq!(neighbours.len(), 2);
        assert_eq!(neighbours[0].0, "c");
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("interval.model");
        let model = sample();
        model.save(&path).expect("save");

        let loaded = KeyedVectors::load(&path).expect("load");
        assert_eq!(loaded, model);
        assert_eq!(loaded.vector("c"), model.vector("c"));
    }

    #[test]
    fn empty_model_is_valid() {
        let model = KeyedVectors::new(100, Vec::new(), Vec::new()).expect("empty model");
        assert!(model.is_empty());
        assert_eq!(model.dimensionality(), 100);
    }

    #[test]
    fn load_rejects_inconsistent_vector_lengths() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("corrupt.model");
        std::fs::write(
            &path,
            r#"{"dimensionality":3,"vocab":["a","b"],"vectors":[[1.0,0.0,0.0],[0.5]]}"#,
        )
        .expect("write corrupt model");

        let err = KeyedVectors::load(&path).expect_err("should reject corrupt model");
        assert!(matches!(err, IntervecError::Serialization(_)));
    }

    #[test]
    fn mismatched_vector_length_is_rejected() {
        let err = KeyedVectors::new(3, vec!["a".into()], vec![vec![1.0]])
            .expect_err("should reject short vector");
        assert!(matches!(err, IntervecError::Internal(_)));
    }
}
