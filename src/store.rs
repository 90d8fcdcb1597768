
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use log::{info, warn};
use rand::Rng;
use crate::error::{EmbeddingError, Result};
use crate::vector::EmbeddingVector;
use crate::vocab::Vocabulary;

const QUOTES: [char; 2] = ['"', '\''];


/// Token to vector table.
///
/// Keys are fixed when the store is created. Every vector sits behind its own lock so
/// concurrent workers only contend when they touch the same token.
#[derive(Debug)]
pub struct EmbeddingStore {
    tokens: Vec<String>,
    t2i: HashMap<String, usize>,
    vectors: Vec<Mutex<EmbeddingVector>>,
}

impl EmbeddingStore {

    /// One random vector of `dimension` coordinates per vocabulary token, drawn in token order.
    pub fn initialize<R: Rng + ?Sized>(vocab: &Vocabulary, dimension: usize, rng: &mut R) -> Self {
        let vectors = vocab.tokens().iter()
            .map(|_| Mutex::new(EmbeddingVector::random(dimension, rng)))
            .collect();

        Self {
            tokens: vocab.tokens().to_vec(),
            t2i: vocab.tokens().iter().enumerate().map(|(i, t)| (t.to_owned(), i)).collect(),
            vectors,
        }
    }

    /// Builds a store keeping the order of `entries`, a repeated token is a corrupt record.
    pub fn from_entries(entries: Vec<(String, EmbeddingVector)>) -> Result<Self> {
        let mut tokens = Vec::with_capacity(entries.len());
        let mut t2i = HashMap::with_capacity(entries.len());
        let mut vectors = Vec::with_capacity(entries.len());

        for (i, (token, vector)) in entries.into_iter().enumerate() {
            if t2i.insert(token.clone(), i).is_some() {
                return Err(EmbeddingError::corrupt(i + 1, format!("duplicate token '{}'", token)));
            }
            tokens.push(token);
            vectors.push(Mutex::new(vector));
        }

        Ok(Self { tokens, t2i, vectors })
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Vector length shared by every entry, `None` for an empty store.
    pub fn dimension(&self) -> Option<usize> {
        self.vectors.first().map(|v| lock(v).len())
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn contains(&self, token: &str) -> bool {
        self.t2i.contains_key(token)
    }

    pub fn index_of(&self, token: &str) -> Option<usize> {
        self.t2i.get(token).copied()
    }

    /// True when the store holds exactly the vocabulary tokens under the same ids.
    pub fn covers(&self, vocab: &Vocabulary) -> bool {
        self.tokens.as_slice() == vocab.tokens()
    }

    /// Copy of the vector stored for `token`.
    pub fn get(&self, token: &str) -> Result<EmbeddingVector> {
        Ok(self.get_mut(token)?.clone())
    }

    /// Exclusive access to the vector stored for `token`.
    pub fn get_mut(&self, token: &str) -> Result<MutexGuard<'_, EmbeddingVector>> {
        let i = self.index_of(token).ok_or_else(|| EmbeddingError::UnknownToken(token.to_owned()))?;
        self.entry(i)
    }

    /// Exclusive access to the vector of token id `index`.
    pub fn entry(&self, index: usize) -> Result<MutexGuard<'_, EmbeddingVector>> {
        self.vectors.get(index)
            .map(lock)
            .ok_or(EmbeddingError::IndexOutOfRange { index, len: self.len() })
    }

    /// Snapshot of every entry, in store order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, EmbeddingVector)> + '_ {
        self.tokens.iter().zip(self.vectors.iter()).map(|(t, v)| (t.as_str(), lock(v).clone()))
    }

    /// Writes one `token: [v0, v1, ...]` line per entry.
    ///
    /// The file is written next to `path` and renamed over it once complete, so an
    /// interrupted write never leaves a truncated snapshot behind.
    pub fn serialize<P: AsRef<Path>>(&self, path: P) -> Result<()> {

        let path = path.as_ref();
        if self.is_empty() {
            warn!("saving an empty embedding table to {}", path.display());
        }

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = Path::new(&tmp);

        let f = File::create(tmp).map_err(|e| EmbeddingError::io(tmp, e))?;
        let mut wrt = BufWriter::new(f);
        for (token, vector) in self.iter() {
            writeln!(wrt, "{}: {}", quote_token(token), vector).map_err(|e| EmbeddingError::io(tmp, e))?;
        }
        wrt.flush().map_err(|e| EmbeddingError::io(tmp, e))?;
        drop(wrt);

        fs::rename(tmp, path).map_err(|e| EmbeddingError::io(path, e))?;
        info!("saved {} vectors to {}", self.len(), path.display());
        Ok(())
    }

    /// Parses a file written by `serialize`. Any malformed record fails the whole load.
    pub fn deserialize<P: AsRef<Path>>(path: P) -> Result<Self> {

        let path = path.as_ref();
        let f = File::open(path).map_err(|e| EmbeddingError::io(path, e))?;

        let mut entries: Vec<(String, EmbeddingVector)> = Vec::new();
        for (i, line) in BufReader::new(f).lines().enumerate() {
            let line = line.map_err(|e| EmbeddingError::io(path, e))?;
            let line_no = i + 1;
            if line.trim().is_empty() {
                continue;
            }

            let (token, values) = parse_record(&line, line_no)?;
            if let Some((_, first)) = entries.first() {
                if first.len() != values.len() {
                    return Err(EmbeddingError::corrupt(line_no, format!(
                        "vector of length {} where {} was expected", values.len(), first.len())));
                }
            }
            entries.push((token, EmbeddingVector::from(values)));
        }

        Self::from_entries(entries)
    }

}

fn lock(m: &Mutex<EmbeddingVector>) -> MutexGuard<'_, EmbeddingVector> {
    // a panicked worker leaves a vector that is still a valid vector
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn is_quoted(token: &str) -> bool {
    let mut chars = token.chars();
    match (chars.next(), chars.next_back()) {
        (Some(a), Some(b)) => a == b && QUOTES.contains(&a),
        _ => false,
    }
}

// a token that already looks quoted gets an extra pair, the reader strips exactly one
fn quote_token(token: &str) -> String {
    if is_quoted(token) {
        format!("\"{}\"", token)
    } else {
        token.to_owned()
    }
}

fn parse_record(line: &str, line_no: usize) -> Result<(String, Vec<f64>)> {

    let line = line.trim();

    // values never contain brackets, so the last '[' opens them whatever the token holds
    let open = line.rfind('[').ok_or_else(|| EmbeddingError::corrupt(line_no, "missing '['"))?;
    if !line.ends_with(']') {
        return Err(EmbeddingError::corrupt(line_no, "unterminated bracket"));
    }
    let body = &line[open + 1..line.len() - 1];

    let key = line[..open].trim_end();
    let key = key.strip_suffix(':').ok_or_else(|| EmbeddingError::corrupt(line_no, "missing ':' delimiter"))?;
    let mut token = key.trim();
    if is_quoted(token) {
        token = token[1..token.len() - 1].trim();
    }
    if token.is_empty() {
        return Err(EmbeddingError::corrupt(line_no, "empty token"));
    }
    // tokens come from whitespace splitting, and two records run together always have one
    if token.contains(char::is_whitespace) {
        return Err(EmbeddingError::corrupt(line_no, format!("whitespace inside token '{}'", token)));
    }

    let mut values = Vec::new();
    if !body.trim().is_empty() {
        for v in body.split(',') {
            let v = v.trim();
            let x: f64 = v.parse().map_err(|_| EmbeddingError::corrupt(line_no, format!("bad number '{}'", v)))?;
            values.push(x);
        }
    }

    Ok((token.to_owned(), values))
}


#[cfg(test)]
mod tests {

    use super::{parse_record, EmbeddingStore};
    use crate::error::EmbeddingError;
    use crate::vector::EmbeddingVector;
    use crate::vocab::Vocabulary;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::fs;

    fn small_store() -> EmbeddingStore {
        let vocab = Vocabulary::from_tokens(["the", "cat", "sat", "dog"]);
        EmbeddingStore::initialize(&vocab, 4, &mut StdRng::seed_from_u64(1))
    }

    #[test]
    fn initialize_gives_one_vector_per_token() {
        let store = small_store();
        assert_eq!(store.len(), 4);
        assert_eq!(store.dimension(), Some(4));
        for (_, v) in store.iter() {
            assert_eq!(v.len(), 4);
        }
        assert_eq!(store.tokens(), &["cat", "dog", "sat", "the"]);
    }

    #[test]
    fn unknown_token_is_an_error() {
        let store = small_store();
        assert!(matches!(store.get("bird"), Err(EmbeddingError::UnknownToken(t)) if t == "bird"));
        assert!(store.get_mut("bird").is_err());
        assert!(store.entry(4).is_err());
    }

    #[test]
    fn get_mut_writes_through() {
        let store = small_store();
        *store.get_mut("cat").unwrap().get_mut(0).unwrap() = 42.0;
        assert_eq!(store.get("cat").unwrap().get(0).unwrap(), 42.0);
    }

    #[test]
    fn serialize_then_deserialize_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.txt");

        let store = small_store();
        store.serialize(&path).unwrap();
        let loaded = EmbeddingStore::deserialize(&path).unwrap();

        assert_eq!(loaded.tokens(), store.tokens());
        for ((t1, v1), (t2, v2)) in store.iter().zip(loaded.iter()) {
            assert_eq!(t1, t2);
            assert_eq!(v1, v2);
        }
        assert!(!dir.path().join("vectors.txt.tmp").exists());
    }

    #[test]
    fn quoted_looking_tokens_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.txt");

        let entries = vec![
            ("\"hi\"".to_string(), EmbeddingVector::from(vec![1.0])),
            ("a:b[c]".to_string(), EmbeddingVector::from(vec![2.0])),
            ("'".to_string(), EmbeddingVector::from(vec![3.0])),
        ];
        EmbeddingStore::from_entries(entries).unwrap().serialize(&path).unwrap();

        let loaded = EmbeddingStore::deserialize(&path).unwrap();
        assert_eq!(loaded.tokens(), &["\"hi\"", "a:b[c]", "'"]);
        assert_eq!(loaded.get("a:b[c]").unwrap(), EmbeddingVector::from(vec![2.0]));
    }

    #[test]
    fn reader_tolerates_whitespace_and_quotes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.txt");
        fs::write(&path, "  \"cat\"  :  [ 1.5 ,2,  -3e-2 ]  \n\n'dog':[0.5,0.25,1]\n").unwrap();

        let loaded = EmbeddingStore::deserialize(&path).unwrap();
        assert_eq!(loaded.tokens(), &["cat", "dog"]);
        assert_eq!(loaded.get("cat").unwrap(), EmbeddingVector::from(vec![1.5, 2.0, -0.03]));
        assert_eq!(loaded.dimension(), Some(3));
    }

    #[test]
    fn malformed_bracket_fails_whole_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.txt");
        fs::write(&path, "good: [1.0, 2.0]\ntoken: [1.0, 2.0\n").unwrap();

        match EmbeddingStore::deserialize(&path) {
            Err(EmbeddingError::CorruptRecord { line: 2, .. }) => {},
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn record_errors() {
        let corrupt = |line: &str| matches!(parse_record(line, 1), Err(EmbeddingError::CorruptRecord { .. }));
        assert!(corrupt("token [1.0]"));
        assert!(corrupt("token: 1.0, 2.0]"));
        assert!(corrupt(": [1.0]"));
        assert!(corrupt("\"\": [1.0]"));
        assert!(corrupt("token: [1.0, x]"));
        assert!(corrupt("token: [1.0, ]"));
        assert!(corrupt("token: ]"));

        assert_eq!(parse_record("empty: []", 1).unwrap(), ("empty".to_string(), vec![]));
    }

    #[test]
    fn merged_records_fail_whole_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.txt");
        fs::write(&path, "a: [1.0]b: [2.0]\nc: [3.0]\n").unwrap();

        match EmbeddingStore::deserialize(&path) {
            Err(EmbeddingError::CorruptRecord { line: 1, .. }) => {},
            other => panic!("unexpected result {:?}", other),
        }
        assert!(matches!(parse_record("\"two words\": [1.0]", 1), Err(EmbeddingError::CorruptRecord { .. })));
    }

    #[test]
    fn duplicate_and_ragged_records_are_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.txt");

        fs::write(&path, "a: [1.0]\na: [2.0]\n").unwrap();
        assert!(matches!(EmbeddingStore::deserialize(&path), Err(EmbeddingError::CorruptRecord { .. })));

        fs::write(&path, "a: [1.0]\nb: [2.0, 3.0]\n").unwrap();
        assert!(matches!(EmbeddingStore::deserialize(&path), Err(EmbeddingError::CorruptRecord { line: 2, .. })));
    }

    #[test]
    fn empty_store_writes_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.txt");

        let store = EmbeddingStore::from_entries(Vec::new()).unwrap();
        store.serialize(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
        assert!(EmbeddingStore::deserialize(&path).unwrap().is_empty());
    }

    #[test]
    fn covers_checks_vocabulary() {
        let store = small_store();
        assert!(store.covers(&Vocabulary::from_tokens(["dog", "cat", "the", "sat"])));
        assert!(!store.covers(&Vocabulary::from_tokens(["dog", "cat", "the"])));
    }
}
