
use std::fs::File;
use std::ops::{Add, Range};
use std::path::Path;
use std::time::Instant;
use log::{debug, info};
use memmap2::Mmap;
use rayon::{prelude::*, ThreadPool, ThreadPoolBuilder};
use crate::error::{EmbeddingError, Result};
use crate::vocab::{tokenize, Vocabulary};


/// Counts gathered by one pass over the corpus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub lines: usize,
    pub pairs: usize,
}

impl Add for ScanSummary {
    type Output = ScanSummary;
    fn add(self, other: ScanSummary) -> ScanSummary {
        ScanSummary { lines: self.lines + other.lines, pairs: self.pairs + other.pairs }
    }
}

/// Splits `total` bytes into `workers` contiguous ranges, the last one takes the remainder.
pub fn partitions(total: usize, workers: usize) -> Vec<Range<usize>> {
    let workers = workers.max(1);
    let chunk = total / workers;
    (0..workers).map(|i| {
        let start = i * chunk;
        let end = if i + 1 == workers { total } else { start + chunk };
        start..end
    }).collect()
}

// first position >= `from` that begins a line
fn next_line_start(data: &[u8], from: usize) -> usize {
    if from == 0 || from >= data.len() {
        return from.min(data.len());
    }
    if data[from - 1] == b'\n' {
        return from;
    }
    match data[from..].iter().position(|b| *b == b'\n') {
        Some(p) => from + p + 1,
        None => data.len(),
    }
}

/// Widens or narrows a byte range to the lines that start inside it.
///
/// A line crossing a partition boundary belongs to the partition it starts in, which
/// reads past its end to finish it. The next partition skips the remainder.
pub fn line_aligned(data: &[u8], range: &Range<usize>) -> Range<usize> {
    let start = next_line_start(data, range.start);
    let end = next_line_start(data, range.end);
    if start >= end {
        return start..start;
    }
    start..end
}


/// Parallel sliding-window pass over a memory mapped corpus.
pub struct CorpusScanner<'v> {
    vocab: &'v Vocabulary,
    window_size: usize,
    num_workers: usize,
    pool: ThreadPool,
}

impl<'v> CorpusScanner<'v> {

    pub fn new(vocab: &'v Vocabulary, window_size: usize, num_workers: usize) -> Result<Self> {
        let num_workers = num_workers.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_workers)
            .build()
            .map_err(|e| EmbeddingError::ThreadPool(e.to_string()))?;
        Ok(Self { vocab, window_size, num_workers, pool })
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Runs one pass, calling `on_pair(partition, target, context)` for every in-vocabulary
    /// pair within the window. Workers call `on_pair` concurrently without any synchronization
    /// of their own, and all of them have finished when this returns.
    pub fn scan<P, F>(&self, corpus_path: P, epoch: usize, on_pair: F) -> Result<ScanSummary>
    where
        P: AsRef<Path>,
        F: Fn(usize, usize, usize) -> Result<()> + Sync,
    {
        let path = corpus_path.as_ref();
        let corpus_err = |source| EmbeddingError::CorpusNotFound { path: path.display().to_string(), source };

        let f = File::open(path).map_err(corpus_err)?;
        let total = f.metadata().map_err(corpus_err)?.len() as usize;
        if total == 0 {
            return Ok(ScanSummary::default());
        }

        // SAFETY: the corpus is opened read-only and is not modified while training runs
        let mmap = unsafe { Mmap::map(&f) }.map_err(|e| EmbeddingError::io(path, e))?;
        let data: &[u8] = &mmap;

        let timer = Instant::now();
        let parts = partitions(total, self.num_workers);
        let summaries: Vec<ScanSummary> = self.pool.install(|| {
            parts.par_iter().enumerate().map(|(i, range)| {
                let bounds = line_aligned(data, range);
                debug!("epoch {}, worker {} scanning bytes {:?}", epoch, i, bounds);
                self.scan_partition(&data[bounds], i, &on_pair)
            }).collect::<Result<Vec<ScanSummary>>>()
        })?;

        let summary = summaries.into_iter().fold(ScanSummary::default(), |acc, s| acc + s);
        info!("epoch {}, scanned {} lines and {} pairs in {} partitions, took {} seconds ...",
            epoch, summary.lines, summary.pairs, parts.len(), timer.elapsed().as_secs());
        Ok(summary)
    }

    fn scan_partition<F>(&self, data: &[u8], partition: usize, on_pair: &F) -> Result<ScanSummary>
    where
        F: Fn(usize, usize, usize) -> Result<()> + Sync,
    {
        let mut summary = ScanSummary::default();
        let mut rest = data;
        while !rest.is_empty() {
            let (line, tail) = match rest.iter().position(|b| *b == b'\n') {
                Some(p) => (&rest[..p], &rest[p + 1..]),
                None => (rest, &rest[rest.len()..]),
            };
            summary.lines += 1;
            summary.pairs += self.scan_line(line, partition, on_pair)?;
            rest = tail;
        }
        Ok(summary)
    }

    fn scan_line<F>(&self, line: &[u8], partition: usize, on_pair: &F) -> Result<usize>
    where
        F: Fn(usize, usize, usize) -> Result<()> + Sync,
    {
        // positions count every token, out of vocabulary ones included
        let line = String::from_utf8_lossy(line);
        let ids: Vec<Option<usize>> = tokenize(&line).map(|t| self.vocab.index_of(t)).collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let last = ids.len() - 1;
        let mut pairs = 0;
        for (i, target) in ids.iter().enumerate() {
            let Some(target) = *target else { continue };
            let lo = i.saturating_sub(self.window_size);
            let hi = last.min(i.saturating_add(self.window_size));
            for j in lo..=hi {
                if j == i {
                    continue;
                }
                if let Some(context) = ids[j] {
                    on_pair(partition, target, context)?;
                    pairs += 1;
                }
            }
        }
        Ok(pairs)
    }

}
