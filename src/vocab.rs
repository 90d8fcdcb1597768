
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use log::info;
use crate::error::{EmbeddingError, Result};


/// Splits a line into whitespace delimited, case-sensitive tokens.
pub fn tokenize(line: &str) -> impl Iterator<Item = &str> {
    line.split_whitespace()
}

/// The set of distinct corpus tokens.
///
/// Tokens are kept sorted so that iteration, token ids and therefore everything seeded
/// from them are the same from one run to the next.
#[derive(Clone, Debug, PartialEq)]
pub struct Vocabulary {
    tokens: Vec<String>,
    t2i: HashMap<String, usize>,
}

impl Vocabulary {

    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = tokens.into_iter().map(Into::into).collect();
        let tokens: Vec<String> = set.into_iter().collect();
        let t2i = tokens.iter().enumerate().map(|(i, t)| (t.to_owned(), i)).collect();
        Self { tokens, t2i }
    }

    /// Reads the corpus line by line and collects every token found.
    pub fn build<P: AsRef<Path>>(corpus_path: P) -> Result<Self> {

        let path = corpus_path.as_ref();
        let f = File::open(path).map_err(|source| EmbeddingError::CorpusNotFound {
            path: path.display().to_string(),
            source,
        })?;

        // split on the raw line terminator so that invalid utf-8 is decoded the same way the scanner does
        let mut set: BTreeSet<String> = BTreeSet::new();
        for line in BufReader::new(f).split(b'\n') {
            let line = line.map_err(|e| EmbeddingError::io(path, e))?;
            for tok in tokenize(&String::from_utf8_lossy(&line)) {
                if !set.contains(tok) {
                    set.insert(tok.to_owned());
                }
            }
        }

        info!("found {} distinct tokens in {}", set.len(), path.display());
        Ok(Self::from_tokens(set))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.t2i.contains_key(token)
    }

    pub fn index_of(&self, token: &str) -> Option<usize> {
        self.t2i.get(token).copied()
    }

    pub fn token(&self, index: usize) -> Option<&str> {
        self.tokens.get(index).map(String::as_str)
    }

    /// Tokens in ascending order, position equals token id.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

}
