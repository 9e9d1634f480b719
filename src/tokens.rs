//! Lazy token stream reader for staged token files.
//!
//! A token file holds one interval's corpus as a sequence of token lists.  Two
//! on-disk encodings exist: the streaming form written by the tokeniser (one
//! JSON array per line, each line terminated by a comma, with a bare `]` line
//! marking logical end of stream) and the legacy form (a single syntactically
//! complete JSON array of token lists).  The reader attempts the streaming
//! parse first and falls back to decoding the whole document on the first line
//! that does not conform, resuming after any lists the line-wise decode
//! already produced so no list is yielded twice.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::cancel::CancelToken;
use crate::error::{IntervecError, Result};

/// One unit of text, tokenised: a post or a sentence.
pub type TokenList = Vec<String>;

/// Lazy, cancellable iterator over the token lists of one staged file.
///
/// Each pass over a file opens its own `TokenStream`; the underlying handle is
/// released when the stream is dropped, so sequential passes never hold two
/// descriptors on the same file.
pub struct TokenStream {
    path: PathBuf,
    cancel: CancelToken,
    state: State,
}

enum State {
    /// Line-wise streaming decode.
    Streaming {
        reader: BufReader<File>,
        first_line: bool,
        yielded: usize,
    },
    /// Whole-document fallback over the elements not yet yielded line-wise.
    Legacy(std::vec::IntoIter<TokenList>),
    Done,
}

impl TokenStream {
    /// Opens a staged token file for one streaming pass.
    pub fn open<P: AsRef<Path>>(path: P, cancel: CancelToken) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|err| IntervecError::io(err, Some(path.clone())))?;
        Ok(Self {
            path,
            cancel,
            state: State::Streaming {
                reader: BufReader::new(file),
                first_line: true,
                yielded: 0,
            },
        })
    }

    /// Collects every token list in the file, honouring cancellation.
    pub fn read_all<P: AsRef<Path>>(path: P, cancel: CancelToken) -> Result<Vec<TokenList>> {
        Self::open(path, cancel)?.collect()
    }

    /// Decodes the entire file as one legacy JSON array of token lists.
    fn legacy_fallback(&self) -> Result<Vec<TokenList>> {
        let file =
            File::open(&self.path).map_err(|err| IntervecError::io(err, Some(self.path.clone())))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|err| IntervecError::Decode {
            path: self.path.clone(),
            source: err,
        })
    }

    fn next_inner(&mut self) -> Result<Option<TokenList>> {
        if self.cancel.is_cancelled() {
            self.state = State::Done;
            return Err(IntervecError::Interrupted("reading token lists"));
        }

        loop {
            match &mut self.state {
                State::Streaming {
                    reader,
                    first_line,
                    yielded,
                } => {
                    let mut line = String::new();
                    let read = reader
                        .read_line(&mut line)
                        .map_err(|err| IntervecError::io(err, Some(self.path.clone())))?;
                    if read == 0 {
                        // Truncated streaming files end at end-of-input; the
                        // missing `]` marker is not itself malformed.
                        self.state = State::Done;
                        return Ok(None);
                    }

                    let mut trimmed = line.trim_end();
                    if *first_line {
                        *first_line = false;
                        // The tokeniser opens the surrounding JSON array
                        // before the first dump; the bracket may sit on its
                        // own line or be fused to the first token list.
                        if trimmed == "[" {
                            continue;
                        }
                        trimmed = trimmed.strip_prefix('[').unwrap_or(trimmed);
                    }
                    if trimmed == "]" {
                        self.state = State::Done;
                        return Ok(None);
                    }

                    match decode_streaming_line(trimmed) {
                        Some(tokens) => {
                            *yielded += 1;
                            return Ok(Some(tokens));
                        }
                        None => {
                            // Old-format dumps are one complete document; the
                            // streaming approach is abandoned for this file,
                            // skipping any lists already decoded line-wise.
                            let skip = *yielded;
                            let mut all = self.legacy_fallback()?;
                            let remaining = all.split_off(skip.min(all.len()));
                            self.state = State::Legacy(remaining.into_iter());
                        }
                    }
                }
                State::Legacy(remaining) => {
                    let next = remaining.next();
                    if next.is_none() {
                        self.state = State::Done;
                    }
                    return Ok(next);
                }
                State::Done => return Ok(None),
            }
        }
    }
}

/// Parses one streaming-form line: a JSON array of strings followed by the
/// separating comma.  Returns `None` when the line does not conform.
fn decode_streaming_line(line: &str) -> Option<TokenList> {
    let body = line.strip_suffix(',')?;
    serde_json::from_str(body).ok()
}

impl Iterator for TokenStream {
    type Item = Result<TokenList>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_inner().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_streaming(dir: &Path, name: &str, lists: &[&[&str]], terminated: bool) -> PathBuf {
        let mut content = String::from("[\n");
        for list in lists {
            content.push_str(&serde_json::to_string(list).unwrap());
            content.push_str(",\n");
        }
        if terminated {
            content.push_str("]\n");
        }
        let path = dir.join(name);
        fs::write(&path, content).expect("write token file");
        path
    }

    #[test]
    fn streaming_file_yields_lists_in_order() {
        let dir = tempdir().expect("tempdir");
        let path = write_streaming(dir.path(), "a.json", &[&["a", "b"], &["a", "c"]], true);

        let lists = TokenStream::read_all(&path, CancelToken::new()).expect("read");
        assert_eq!(lists, vec![vec!["a", "b"], vec!["a", "c"]]);
    }

    #[test]
    fn streaming_file_is_rereadable_per_pass() {
        let dir = tempdir().expect("tempdir");
        let path = write_streaming(dir.path(), "a.json", &[&["x"], &["y"]], true);

        let first = TokenStream::read_all(&path, CancelToken::new()).expect("first pass");
        let second = TokenStream::read_all(&path, CancelToken::new()).expect("second pass");
        assert_eq!(first, second);
    }

    #[test]
    fn opening_bracket_fused_to_first_list_is_stripped() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("fused.json");
        fs::write(&path, "[[\"a\",\"b\"],\n[\"a\",\"c\"],\n]\n").expect("write token file");

        let lists = TokenStream::read_all(&path, CancelToken::new()).expect("read");
        assert_eq!(lists, vec![vec!["a", "b"], vec!["a", "c"]]);
    }

    #[test]
    fn fused_empty_array_yields_empty_sequence() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("fused-empty.json");
        fs::write(&path, "[]\n").expect("write token file");

        let lists = TokenStream::read_all(&path, CancelToken::new()).expect("read");
        assert!(lists.is_empty());
    }

    #[test]
    fn truncated_streaming_file_stops_cleanly() {
        let dir = tempdir().expect("tempdir");
        let path = write_streaming(dir.path(), "a.json", &[&["a"], &["b"]], false);

        let lists = TokenStream::read_all(&path, CancelToken::new()).expect("read");
        assert_eq!(lists.len(), 2);
    }

    #[test]
    fn empty_file_yields_empty_sequence() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("empty.json");
        fs::write(&path, "").expect("write empty file");

        let lists = TokenStream::read_all(&path, CancelToken::new()).expect("read");
        assert!(lists.is_empty());
    }

    #[test]
    fn legacy_file_falls_back_to_whole_document_parse() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("legacy.json");
        fs::write(&path, r#"[["a","b"],["c"]]"#).expect("write legacy file");

        let lists = TokenStream::read_all(&path, CancelToken::new()).expect("read");
        assert_eq!(lists, vec![vec!["a", "b"], vec!["c"]]);
    }

    #[test]
    fn pretty_printed_legacy_file_yields_each_list_once() {
        // Early lines of a pretty-printed legacy array coincide with the
        // streaming grammar; the fallback must not replay them.
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("pretty.json");
        fs::write(&path, "[\n[\"a\",\"b\"],\n[\"c\"]\n]\n").expect("write token file");

        let lists = TokenStream::read_all(&path, CancelToken::new()).expect("read");
        assert_eq!(lists, vec![vec!["a", "b"], vec!["c"]]);
    }

    #[test]
    fn malformed_file_fails_both_strategies() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("bad.json");
        fs::write(&path, "not json at all\n").expect("write bad file");

        let err = TokenStream::read_all(&path, CancelToken::new()).expect_err("should fail");
        assert!(matches!(err, IntervecError::Decode { .. }));
    }

    #[test]
    fn cancellation_interrupts_mid_stream() {
        let dir = tempdir().expect("tempdir");
        let path = write_streaming(dir.path(), "a.json", &[&["a"], &["b"], &["c"]], true);

        let cancel = CancelToken::new();
        let mut stream = TokenStream::open(&path, cancel.clone()).expect("open");
        assert!(stream.next().expect("first list").is_ok());
        cancel.cancel();
        let err = stream.next().expect("pending item").expect_err("interrupted");
        assert!(err.is_interrupted());
        assert!(stream.next().is_none());
    }
}
