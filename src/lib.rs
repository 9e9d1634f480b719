//! Per-interval word embedding model generation.
//!
//! The crate exposes both a library API and an `intervec` command line
//! interface for turning an archive of tokenised text corpora (one token file
//! per time interval) into an archive of trained word-embedding models.  For
//! each token file the pipeline streams the token lists once to learn a
//! bigram phrase model, streams them a second time through the phrase
//! transform, trains a word2vec model, and packs the resulting vectors into
//! the destination archive.
//!
//! ```no_run
//! use intervec::{EmbeddingProcessor, LocalJob, PhraseConfig, TrainParams};
//!
//! # fn main() -> intervec::Result<()> {
//! let params = TrainParams::builder()
//!     .dimensionality(100)
//!     .window(5)
//!     .build()?;
//! let processor = EmbeddingProcessor::new(params, PhraseConfig::default())?;
//! let job = LocalJob::new("tokens.zip", "models.zip", "/tmp");
//! let metrics = processor.run(&job)?;
//! println!("packed {} models", metrics.models);
//! # Ok(())
//! # }
//! ```
//!
//! The CLI is enabled by default through the `cli` feature.  Users targeting
//! the library portion only can disable default features:
//! `intervec = { version = "...", default-features = false }`.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    clippy::all,
    rust_2018_idioms,
    future_incompatible,
    unused_lifetimes,
    unreachable_pub
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::multiple_crate_versions
)]

pub mod archive;
pub mod cancel;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod phrases;
pub mod pipeline;
pub mod staging;
pub mod tokens;
pub mod trainer;

pub use cancel::CancelToken;
pub use config::{Algorithm, PhraseConfig, TrainParams, TrainParamsBuilder};
pub use error::{IntervecError, Result};
pub use metrics::{FileMetrics, RunMetrics};
pub use model::KeyedVectors;
pub use phrases::PhraseModel;
pub use pipeline::{EmbeddingProcessor, JobContext, LocalJob};
pub use tokens::{TokenList, TokenStream};
pub use trainer::Word2VecTrainer;
