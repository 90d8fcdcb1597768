
use std::fs;
use std::path::Path;
use std::sync::mpsc::{self, Receiver};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Instant;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use crate::config::{files_handling, TrainParams};
use crate::error::{EmbeddingError, Result};
use crate::progress::{ProgressFiles, TrainingProgress};
use crate::sampler::NegativeSampler;
use crate::scanner::{CorpusScanner, ScanSummary};
use crate::store::EmbeddingStore;
use crate::update::UpdateRule;
use crate::vocab::Vocabulary;


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrainingState {
    NotStarted,
    EpochInProgress(usize),
    EpochComplete(usize),
    Done,
}

/// What a call to `train` did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrainingSummary {
    pub resumed_from: usize,
    pub epochs_run: usize,
    pub lines: usize,
    pub pairs: usize,
}

/// Owns the embedding table for one training run and drives it epoch by epoch.
pub struct TrainingController {
    params: TrainParams,
    progress: ProgressFiles,
    state: TrainingState,
    store: Option<EmbeddingStore>,
}

/// Pairs each partition may have in flight before its worker waits for the update loop.
const PAIR_BUFFER: usize = 4096;

// every (epoch, partition) gets its own stream so a resumed run replays the same draws
fn sampler_seed(seed: u64, epoch: usize, partition: usize) -> u64 {
    seed.wrapping_add(((epoch as u64) << 32) | partition as u64)
}

fn draw(sampler: &mut NegativeSampler, vocab: &Vocabulary, target: usize, count: usize) -> Result<Vec<usize>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    sampler.sample(vocab, target, count)
}

impl TrainingController {

    pub fn new(params: TrainParams) -> Self {
        let progress = ProgressFiles::new(&params.output_dir);
        Self { params, progress, state: TrainingState::NotStarted, store: None }
    }

    /// Builds a controller and trains it to completion.
    pub fn run(params: &TrainParams) -> Result<TrainingController> {
        let mut controller = TrainingController::new(params.clone());
        controller.train()?;
        Ok(controller)
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    /// The trained table, available once `train` has returned.
    pub fn store(&self) -> Option<&EmbeddingStore> {
        self.store.as_ref()
    }

    pub fn into_store(self) -> Option<EmbeddingStore> {
        self.store
    }

    /// Trains from the last checkpoint up to the configured number of epochs.
    ///
    /// After every epoch the snapshot is written and then the checkpoint, so a checkpoint
    /// never points past the snapshot on disk. Both progress files are removed at the end.
    pub fn train(&mut self) -> Result<TrainingSummary> {

        let timer = Instant::now();
        let params = self.params.clone();
        info!("{}", params);

        let vocab = Vocabulary::build(&params.corpus_file)?;
        if params.negative_samples > 0 && vocab.len() < 2 {
            return Err(EmbeddingError::VocabularyTooSmall(vocab.len()));
        }
        fs::create_dir_all(&params.output_dir).map_err(|e| EmbeddingError::io(&params.output_dir, e))?;

        let progress = self.progress.load();
        let resumed_from = progress.resume_epoch();
        if resumed_from > 0 {
            info!("resuming after {} completed epochs, last one scanned {} lines",
                resumed_from, progress.line.map_or("an unknown number of".to_string(), |l| l.to_string()));
        }

        let store = self.initial_store(&vocab, resumed_from);
        let scanner = CorpusScanner::new(&vocab, params.window_size, params.num_threads)?;
        let rule = UpdateRule::new(params.learning_rate);

        let mut summary = TrainingSummary { resumed_from, ..Default::default() };
        for epoch in resumed_from..params.epochs {

            let epoch_timer = Instant::now();
            self.state = TrainingState::EpochInProgress(epoch);

            let scanned = if params.deterministic {
                self.run_epoch_serialized(&scanner, &vocab, &store, &rule, epoch)?
            } else {
                self.run_epoch_locked(&scanner, &vocab, &store, &rule, epoch)?
            };

            files_handling::save_output(&params.output_dir, &params.snapshot_name, &store)?;
            self.progress.save(&TrainingProgress { epoch: Some(epoch + 1), line: Some(scanned.lines) })?;
            self.state = TrainingState::EpochComplete(epoch);

            summary.epochs_run += 1;
            summary.lines += scanned.lines;
            summary.pairs += scanned.pairs;
            info!("epoch {}/{} completed, {} pairs, took {} seconds ...",
                epoch + 1, params.epochs, scanned.pairs, epoch_timer.elapsed().as_secs());
        }

        self.progress.clear()?;
        self.state = TrainingState::Done;
        self.store = Some(store);

        info!("finished training, ran {} epochs, took {} seconds ...", summary.epochs_run, timer.elapsed().as_secs());
        Ok(summary)
    }

    // a resumed run continues from the snapshot when it matches the vocabulary
    fn initial_store(&self, vocab: &Vocabulary, resumed_from: usize) -> EmbeddingStore {

        let snapshot = self.params.snapshot_path();
        if resumed_from > 0 && Path::new(&snapshot).exists() {
            match EmbeddingStore::deserialize(&snapshot) {
                Ok(store) if store.covers(vocab) && (vocab.is_empty() || store.dimension() == Some(self.params.embedding_dim)) => {
                    info!("continuing from snapshot {}", snapshot.display());
                    return store;
                },
                Ok(_) => warn!("snapshot {} does not match the corpus vocabulary, starting from fresh vectors", snapshot.display()),
                Err(e) => warn!("cannot load snapshot {}: {}, starting from fresh vectors", snapshot.display(), e),
            }
        }

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        EmbeddingStore::initialize(vocab, self.params.embedding_dim, &mut rng)
    }

    // workers stream the pairs they find through one bounded channel per partition while
    // this thread drains the channels in partition order with a single sampler, so the
    // result does not depend on timing and at most PAIR_BUFFER pairs per partition wait
    fn run_epoch_serialized(&self,
        scanner: &CorpusScanner,
        vocab: &Vocabulary,
        store: &EmbeddingStore,
        rule: &UpdateRule,
        epoch: usize) -> Result<ScanSummary> {

        let (senders, receivers): (Vec<_>, Vec<_>) = (0..scanner.num_workers())
            .map(|_| mpsc::sync_channel::<(usize, usize)>(PAIR_BUFFER))
            .unzip();
        let corpus = self.params.corpus_file.as_str();

        thread::scope(|s| -> Result<ScanSummary> {
            let scan = s.spawn(move || {
                // senders are dropped on return, which ends every channel
                scanner.scan(corpus, epoch, |partition, target, context| {
                    senders[partition].send((target, context))
                        .map_err(|_| EmbeddingError::ThreadPool("update loop stopped before the scan finished".into()))
                })
            });

            let applied = self.apply_in_order(receivers, vocab, store, rule, epoch);
            let scanned = scan.join().map_err(|_| EmbeddingError::ThreadPool("corpus scan panicked".into()))?;
            let applied = applied?;
            let scanned = scanned?;
            debug_assert_eq!(applied, scanned.pairs);
            Ok(scanned)
        })
    }

    // dropping the remaining receivers on error makes every blocked worker fail its send
    fn apply_in_order(&self,
        receivers: Vec<Receiver<(usize, usize)>>,
        vocab: &Vocabulary,
        store: &EmbeddingStore,
        rule: &UpdateRule,
        epoch: usize) -> Result<usize> {

        let mut sampler = NegativeSampler::new(sampler_seed(self.params.seed, epoch, 0));
        let mut applied = 0;
        for rx in receivers {
            for (target, context) in rx {
                let negatives = draw(&mut sampler, vocab, target, self.params.negative_samples)?;
                rule.apply(store, target, context, &negatives)?;
                applied += 1;
            }
        }
        Ok(applied)
    }

    // updates happen on the workers as pairs are found, serialized per token by the store's
    // locks; the order in which workers interleave is not fixed, so neither is the result
    fn run_epoch_locked(&self,
        scanner: &CorpusScanner,
        vocab: &Vocabulary,
        store: &EmbeddingStore,
        rule: &UpdateRule,
        epoch: usize) -> Result<ScanSummary> {

        let samplers: Vec<Mutex<NegativeSampler>> = (0..scanner.num_workers())
            .map(|p| Mutex::new(NegativeSampler::new(sampler_seed(self.params.seed, epoch, p))))
            .collect();

        scanner.scan(&self.params.corpus_file, epoch, |partition, target, context| {
            let negatives = {
                let mut sampler = samplers[partition].lock().unwrap_or_else(PoisonError::into_inner);
                draw(&mut sampler, vocab, target, self.params.negative_samples)?
            };
            rule.apply(store, target, context, &negatives)
        })
    }

}
