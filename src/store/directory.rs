use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use super::{IndexInput, IndexOutput, OutputSink};
use crate::error::Result;

/// Flat namespace of write-once files.
pub trait Directory: Send + Sync {
    fn create_output(&self, name: &str) -> Result<IndexOutput>;

    fn open_input(&self, name: &str) -> Result<IndexInput>;

    fn file_names(&self) -> Result<Vec<String>>;
}

/// `{segment}_{suffix}.{ext}`, or `{segment}.{ext}` without a suffix.
pub fn segment_file_name(segment: &str, suffix: &str, ext: &str) -> String {
    let mut name = String::from(segment);
    if !suffix.is_empty() {
        name.push('_');
        name.push_str(suffix);
    }
    if !ext.is_empty() {
        name.push('.');
        name.push_str(ext);
    }
    name
}

type FileMap = Arc<RwLock<BTreeMap<String, Arc<[u8]>>>>;

#[derive(Clone, Default)]
pub struct RamDirectory {
    files: FileMap,
}

impl RamDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the content of a published file.
    pub fn overwrite(&self, name: &str, data: Vec<u8>) {
        self.files.write().insert(name.to_string(), Arc::from(data));
    }
}

impl Directory for RamDirectory {
    fn create_output(&self, name: &str) -> Result<IndexOutput> {
        if self.files.read().contains_key(name) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("file {} already exists", name),
            )
            .into());
        }
        let sink = RamSink {
            files: self.files.clone(),
            name: name.to_string(),
            buf: Vec::new(),
        };
        Ok(IndexOutput::new(name, Box::new(sink)))
    }

    fn open_input(&self, name: &str) -> Result<IndexInput> {
        let files = self.files.read();
        let Some(data) = files.get(name) else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("file {} not found", name),
            )
            .into());
        };
        Ok(IndexInput::new(name, data.clone()))
    }

    fn file_names(&self) -> Result<Vec<String>> {
        Ok(self.files.read().keys().cloned().collect())
    }
}

struct RamSink {
    files: FileMap,
    name: String,
    buf: Vec<u8>,
}

impl Write for RamSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl OutputSink for RamSink {
    fn finish(self: Box<Self>) -> std::io::Result<()> {
        let RamSink { files, name, buf } = *self;
        files.write().insert(name, Arc::from(buf));
        Ok(())
    }
}

pub struct FsDirectory {
    path: PathBuf,
}

impl FsDirectory {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        std::fs::create_dir_all(path.as_ref())?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
        })
    }
}

impl Directory for FsDirectory {
    fn create_output(&self, name: &str) -> Result<IndexOutput> {
        let file = File::create_new(self.path.join(name))?;
        let sink = FsSink {
            writer: BufWriter::new(file),
        };
        Ok(IndexOutput::new(name, Box::new(sink)))
    }

    fn open_input(&self, name: &str) -> Result<IndexInput> {
        let data = std::fs::read(self.path.join(name))?;
        Ok(IndexInput::new(name, Arc::from(data)))
    }

    fn file_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

struct FsSink {
    writer: BufWriter<File>,
}

impl Write for FsSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl OutputSink for FsSink {
    fn finish(mut self: Box<Self>) -> std::io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }
}
