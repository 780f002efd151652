//! Folder source
//!
//! Finite, sorted enumeration of image files. Optionally loops back to the
//! first file once the last one has been read.

use std::path::{Path, PathBuf};

use contracts::{ContractError, Frame, FrameSource, ReadOutcome, SourceType};
use tracing::{debug, info, warn};

use crate::decode::decode_image;
use crate::error::IngestionError;

/// Image folder source
pub struct FolderSource {
    source_id: String,
    root: PathBuf,
    extensions: Vec<String>,
    looping: bool,
    files: Vec<PathBuf>,
    /// Index of the next file to read
    position: usize,
    sequence: u64,
    opened: bool,
}

impl FolderSource {
    pub fn new(root: impl Into<PathBuf>, extensions: &[String], looping: bool) -> Self {
        let root = root.into();
        Self {
            source_id: root.display().to_string(),
            root,
            extensions: extensions.iter().map(|e| normalize_extension(e)).collect(),
            looping,
            files: Vec::new(),
            position: 0,
            sequence: 0,
            opened: false,
        }
    }

    /// Number of files found at `open`
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.contains(&normalize_extension(e)))
            .unwrap_or(false)
    }

    fn scan(&self) -> Result<Vec<PathBuf>, ContractError> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| {
            ContractError::source_open(&self.source_id, format!("cannot list folder: {e}"))
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && self.matches_extension(path))
            .collect();
        files.sort();
        Ok(files)
    }

    fn load(&self, path: &Path) -> Result<Frame, IngestionError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bytes = std::fs::read(path).map_err(|e| IngestionError::io(name.clone(), e))?;
        let image = decode_image(&bytes, &name)?;
        Ok(Frame::new(image, self.sequence, &self.source_id)
            .with_meta("file", name)
            .with_meta("index", self.position - 1))
    }
}

/// `.JPG`, `jpg` and `.jpg` all become `.jpg`
fn normalize_extension(ext: &str) -> String {
    let lower = ext.trim().to_ascii_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{lower}")
    }
}

impl FrameSource for FolderSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn kind(&self) -> SourceType {
        SourceType::Folder
    }

    fn open(&mut self) -> Result<(), ContractError> {
        if !self.root.exists() {
            return Err(ContractError::source_open(
                &self.source_id,
                "folder does not exist",
            ));
        }
        if !self.root.is_dir() {
            return Err(ContractError::source_open(
                &self.source_id,
                "path is not a directory",
            ));
        }

        let files = self.scan()?;
        if files.is_empty() {
            return Err(ContractError::source_open(
                &self.source_id,
                format!("no images with extensions {:?}", self.extensions),
            ));
        }

        info!(
            source = %self.source_id,
            files = files.len(),
            looping = self.looping,
            "Folder source opened"
        );
        self.files = files;
        self.position = 0;
        self.opened = true;
        Ok(())
    }

    fn read(&mut self) -> Result<ReadOutcome, ContractError> {
        if !self.opened {
            return Err(ContractError::source_fatal(
                &self.source_id,
                "read on a closed source",
            ));
        }

        let mut failures = 0usize;
        loop {
            if self.position >= self.files.len() {
                if !self.looping {
                    return Ok(ReadOutcome::EndOfStream);
                }
                debug!(source = %self.source_id, "Folder source wrapped to first file");
                self.position = 0;
            }

            let path = self.files[self.position].clone();
            self.position += 1;

            match self.load(&path) {
                Ok(frame) => {
                    self.sequence += 1;
                    return Ok(ReadOutcome::Frame(frame));
                }
                Err(e) => {
                    warn!(source = %self.source_id, error = %e, "Skipping unreadable image");
                    failures += 1;
                    if self.looping && failures >= self.files.len() {
                        return Err(ContractError::source_fatal(
                            &self.source_id,
                            "no decodable image in folder",
                        ));
                    }
                }
            }
        }
    }

    fn close(&mut self) {
        if self.opened {
            debug!(source = %self.source_id, "Folder source closed");
        }
        self.opened = false;
    }

    fn progress(&self) -> Option<f64> {
        if self.looping || self.files.is_empty() {
            return None;
        }
        Some(self.position.min(self.files.len()) as f64 / self.files.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::fixtures;

    fn folder_with(names: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (i, name) in names.iter().enumerate() {
            std::fs::write(dir.path().join(name), fixtures::png(4, 4, i as u8 * 40)).unwrap();
        }
        dir
    }

    fn exts() -> Vec<String> {
        vec![".png".to_string(), ".jpg".to_string()]
    }

    fn read_files(source: &mut FolderSource, n: usize) -> Vec<String> {
        (0..n)
            .map(|_| match source.read().unwrap() {
                ReadOutcome::Frame(frame) => frame.metadata["file"].clone(),
                ReadOutcome::EndOfStream => "<eos>".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_sorted_then_end_of_stream() {
        let dir = folder_with(&["c.png", "a.png", "b.png"]);
        let mut source = FolderSource::new(dir.path(), &exts(), false);
        source.open().unwrap();

        assert_eq!(read_files(&mut source, 3), ["a.png", "b.png", "c.png"]);
        assert!(matches!(source.read().unwrap(), ReadOutcome::EndOfStream));
        assert!(matches!(source.read().unwrap(), ReadOutcome::EndOfStream));
        assert_eq!(source.progress(), Some(1.0));
    }

    #[test]
    fn test_loop_wraps_without_gap() {
        let dir = folder_with(&["a.png", "b.png", "c.png"]);
        let mut source = FolderSource::new(dir.path(), &exts(), true);
        source.open().unwrap();

        assert_eq!(
            read_files(&mut source, 7),
            ["a.png", "b.png", "c.png", "a.png", "b.png", "c.png", "a.png"]
        );
        assert_eq!(source.progress(), None);
    }

    #[test]
    fn test_sequence_strictly_increases() {
        let dir = folder_with(&["a.png", "b.png"]);
        let mut source = FolderSource::new(dir.path(), &exts(), true);
        source.open().unwrap();

        let mut last = None;
        for _ in 0..5 {
            let ReadOutcome::Frame(frame) = source.read().unwrap() else {
                panic!("looping source ended");
            };
            if let Some(prev) = last {
                assert!(frame.sequence > prev);
            }
            last = Some(frame.sequence);
        }
    }

    #[test]
    fn test_extension_filter_case_insensitive() {
        let dir = folder_with(&["a.PNG", "b.png"]);
        std::fs::write(dir.path().join("notes.txt"), b"hello").unwrap();
        let mut source = FolderSource::new(dir.path(), &["png".to_string()], false);
        source.open().unwrap();
        assert_eq!(source.file_count(), 2);
    }

    #[test]
    fn test_unreadable_image_skipped() {
        let dir = folder_with(&["a.png", "c.png"]);
        std::fs::write(dir.path().join("b.png"), b"corrupt").unwrap();
        let mut source = FolderSource::new(dir.path(), &exts(), false);
        source.open().unwrap();

        assert_eq!(read_files(&mut source, 3), ["a.png", "c.png", "<eos>"]);
    }

    #[test]
    fn test_progress_non_decreasing() {
        let dir = folder_with(&["a.png", "b.png", "c.png", "d.png"]);
        let mut source = FolderSource::new(dir.path(), &exts(), false);
        source.open().unwrap();

        let mut last = source.progress().unwrap();
        assert_eq!(last, 0.0);
        while let ReadOutcome::Frame(_) = source.read().unwrap() {
            let now = source.progress().unwrap();
            assert!(now >= last);
            last = now;
        }
        assert_eq!(last, 1.0);
    }

    #[test]
    fn test_open_errors_are_configuration() {
        let missing = FolderSource::new("/definitely/not/here", &exts(), false).open();
        assert!(missing.unwrap_err().is_configuration());

        let empty = tempfile::tempdir().unwrap();
        let err = FolderSource::new(empty.path(), &exts(), false).open().unwrap_err();
        assert!(err.is_configuration());

        let file = tempfile::NamedTempFile::new().unwrap();
        let err = FolderSource::new(file.path(), &exts(), false).open().unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_close_idempotent() {
        let dir = folder_with(&["a.png"]);
        let mut source = FolderSource::new(dir.path(), &exts(), false);
        source.open().unwrap();
        source.close();
        source.close();
        assert!(source.read().is_err());
    }
}
