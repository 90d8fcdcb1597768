
use serde_json::Value;
use std::{fs::File, io::BufReader, fmt::Display, path::PathBuf};
use crate::error::{EmbeddingError, Result};


#[derive(Clone, Debug, PartialEq)]
pub struct TrainParams {
    pub corpus_file: String,
    pub output_dir: String,
    pub window_size: usize,
    pub embedding_dim: usize,
    pub learning_rate: f64,
    pub epochs: usize,
    pub negative_samples: usize,
    pub num_threads: usize,
    pub seed: u64,
    pub deterministic: bool,
    pub snapshot_name: String,
}

impl TrainParams {

    /// Parameters with every optional value at its default.
    pub fn new(corpus_file: &str, output_dir: &str) -> Self {
        Self {
            corpus_file: corpus_file.to_owned(),
            output_dir: output_dir.to_owned(),
            window_size: 2,
            embedding_dim: 100,
            learning_rate: 0.025,
            epochs: 10,
            negative_samples: 5,
            num_threads: num_cpus::get(),
            seed: 42,
            deterministic: true,
            snapshot_name: "vectors.txt".to_owned(),
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        PathBuf::from(&self.output_dir).join(&self.snapshot_name)
    }

}

impl Display for TrainParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "using hyper-params:
        corpus_file: {}
        output_dir: {}
        window_size: {}
        embedding_dim: {}
        learning_rate: {}
        epochs: {}
        negative_samples: {}
        num_threads: {}
        seed: {}
        deterministic: {}
        snapshot_name: {}",
        self.corpus_file, self.output_dir, self.window_size, self.embedding_dim, self.learning_rate, self.epochs,
        self.negative_samples, self.num_threads, self.seed, self.deterministic, self.snapshot_name)
    }
}

pub struct Config {
    params: TrainParams
}

impl Config {

    pub fn get_params(&self) -> TrainParams {
        self.params.clone()
    }

    /// Expects the program name followed by the path to a json file.
    pub fn new(args: &[String]) -> Result<Config> {

        if args.len() != 2 {
            return Err(EmbeddingError::Config("input should be a path to json file only".into()));
        }

        // parse input json
        let f = File::open(&args[1]).map_err(|e| EmbeddingError::io(&args[1], e))?;
        let json: Value = serde_json::from_reader(BufReader::new(f))
            .map_err(|e| EmbeddingError::Config(format!("cannot read json file {}: {}", args[1], e)))?;

        Config::from_json(&json)
    }

    pub fn from_json(json: &Value) -> Result<Config> {

        // validate input and output in json
        let corpus_file = required_str(json, "corpus_file")?;
        let output_dir = required_str(json, "output_dir")?;
        let mut params = TrainParams::new(corpus_file, output_dir);

        // handle default vs input parameters
        if let Some(v) = optional_usize(json, "window_size")? { params.window_size = v }
        if let Some(v) = optional_usize(json, "embedding_dim")? { params.embedding_dim = v }
        if let Some(v) = optional_usize(json, "epochs")? { params.epochs = v }
        if let Some(v) = optional_usize(json, "negative_samples")? { params.negative_samples = v }
        if let Some(v) = optional_usize(json, "num_threads")? { params.num_threads = v }
        if let Some(v) = optional_usize(json, "seed")? { params.seed = v as u64 }

        params.learning_rate = match json.get("learning_rate") {
            Some(lr) => lr.as_f64().ok_or_else(|| not_a("learning_rate", "number"))?,
            None => params.learning_rate
        };
        params.deterministic = match json.get("deterministic") {
            Some(d) => d.as_bool().ok_or_else(|| not_a("deterministic", "boolean"))?,
            None => params.deterministic
        };
        params.snapshot_name = match json.get("snapshot_name") {
            Some(s) => s.as_str().ok_or_else(|| not_a("snapshot_name", "string"))?.to_owned(),
            None => params.snapshot_name
        };

        if params.embedding_dim == 0 {
            return Err(EmbeddingError::Config("embedding_dim must be positive".into()));
        }
        if params.num_threads == 0 {
            return Err(EmbeddingError::Config("num_threads must be positive".into()));
        }

        Ok(Self { params })
    }

}

fn not_a(key: &str, kind: &str) -> EmbeddingError {
    EmbeddingError::Config(format!("given {} is not a {}", key, kind))
}

fn required_str<'a>(json: &'a Value, key: &str) -> Result<&'a str> {
    json.get(key)
        .ok_or_else(|| EmbeddingError::Config(format!("{} was not supplied through json", key)))?
        .as_str()
        .ok_or_else(|| not_a(key, "string"))
}

fn optional_usize(json: &Value, key: &str) -> Result<Option<usize>> {
    match json.get(key) {
        Some(v) => v.as_u64().map(|n| Some(n as usize)).ok_or_else(|| not_a(key, "non-negative integer")),
        None => Ok(None)
    }
}


pub mod files_handling {

    use std::fs;
    use std::path::Path;
    use crate::error::{EmbeddingError, Result};
    use crate::store::EmbeddingStore;

    pub fn read_input<R: ReadFile>(file_path: &str) -> Result<R> {
        R::read_file(file_path)
    }

    /// Creates `output_dir` if needed and saves `item` as `output_dir/file_name`.
    pub fn save_output<S: SaveFile>(output_dir: &str, file_name: &str, item: &S) -> Result<()> {
        fs::create_dir_all(output_dir).map_err(|e| EmbeddingError::io(output_dir, e))?;
        item.save_file(output_dir, file_name)
    }

    pub trait ReadFile: Sized {
        fn read_file(file_path: &str) -> Result<Self>;
    }

    pub trait SaveFile {
        fn save_file(&self, output_dir: &str, file_name: &str) -> Result<()>;
    }

    impl ReadFile for EmbeddingStore {
        fn read_file(file_path: &str) -> Result<Self> {
            EmbeddingStore::deserialize(file_path)
        }
    }

    impl SaveFile for EmbeddingStore {
        fn save_file(&self, output_dir: &str, file_name: &str) -> Result<()> {
            self.serialize(Path::new(output_dir).join(file_name))
        }
    }

}
