
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use log::warn;
use crate::error::{EmbeddingError, Result};

pub const EPOCH_FILE: &str = "epoch_progress.txt";
pub const LINE_FILE: &str = "sentence_progress.txt";


/// How far training got: the number of completed epochs, and optionally the number of
/// corpus lines scanned in the last of them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrainingProgress {
    pub epoch: Option<usize>,
    pub line: Option<usize>,
}

impl TrainingProgress {
    /// Epoch index training resumes at.
    pub fn resume_epoch(&self) -> usize {
        self.epoch.unwrap_or(0)
    }
}

/// Checkpoint files kept in the output directory, one integer per file.
pub struct ProgressFiles {
    epoch_file: PathBuf,
    line_file: PathBuf,
}

impl ProgressFiles {

    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            epoch_file: dir.as_ref().join(EPOCH_FILE),
            line_file: dir.as_ref().join(LINE_FILE),
        }
    }

    /// Missing or unreadable files mean no progress, they never fail.
    pub fn load(&self) -> TrainingProgress {
        TrainingProgress {
            epoch: read_counter(&self.epoch_file),
            line: read_counter(&self.line_file),
        }
    }

    pub fn save(&self, progress: &TrainingProgress) -> Result<()> {
        if let Some(epoch) = progress.epoch {
            fs::write(&self.epoch_file, epoch.to_string()).map_err(|e| EmbeddingError::io(&self.epoch_file, e))?;
        }
        if let Some(line) = progress.line {
            fs::write(&self.line_file, line.to_string()).map_err(|e| EmbeddingError::io(&self.line_file, e))?;
        }
        Ok(())
    }

    /// Deletes both files, absent files are fine.
    pub fn clear(&self) -> Result<()> {
        for path in [&self.epoch_file, &self.line_file] {
            match fs::remove_file(path) {
                Ok(()) => {},
                Err(e) if e.kind() == ErrorKind::NotFound => {},
                Err(e) => return Err(EmbeddingError::io(path, e)),
            }
        }
        Ok(())
    }

}

fn read_counter(path: &Path) -> Option<usize> {
    let text = fs::read_to_string(path).ok()?;
    match text.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!("ignoring unreadable checkpoint {}", path.display());
            None
        }
    }
}


#[cfg(test)]
mod tests {

    use super::{ProgressFiles, TrainingProgress, EPOCH_FILE, LINE_FILE};
    use std::fs;

    #[test]
    fn missing_files_mean_fresh_start() {
        let dir = tempfile::tempdir().unwrap();
        let progress = ProgressFiles::new(dir.path()).load();
        assert_eq!(progress, TrainingProgress::default());
        assert_eq!(progress.resume_epoch(), 0);
    }

    #[test]
    fn save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let files = ProgressFiles::new(dir.path());

        files.save(&TrainingProgress { epoch: Some(3), line: Some(120) }).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join(EPOCH_FILE)).unwrap(), "3");
        assert_eq!(files.load(), TrainingProgress { epoch: Some(3), line: Some(120) });

        files.clear().unwrap();
        assert!(!dir.path().join(EPOCH_FILE).exists());
        assert!(!dir.path().join(LINE_FILE).exists());
        // clearing twice is fine
        files.clear().unwrap();
    }

    #[test]
    fn garbage_is_treated_as_no_progress() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(EPOCH_FILE), "two").unwrap();
        fs::write(dir.path().join(LINE_FILE), " 17\n").unwrap();
        let progress = ProgressFiles::new(dir.path()).load();
        assert_eq!(progress, TrainingProgress { epoch: None, line: Some(17) });
    }
}
