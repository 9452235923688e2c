//! Optional protocol transcript (`-> {json}` / `<- {json}` lines).

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::warn;

#[derive(Debug)]
pub struct ProtocolLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl ProtocolLog {
    /// Opens `path` for appending.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn outgoing(&self, payload: &str) {
        self.write("->", payload);
    }

    pub fn incoming(&self, payload: &str) {
        self.write("<-", payload);
    }

    fn write(&self, direction: &str, payload: &str) {
        let mut writer = self.writer.lock();
        let result = writeln!(writer, "{direction} {payload}").and_then(|()| writer.flush());
        if let Err(err) = result {
            warn!(path = %self.path.display(), %err, "protocol log write failed");
        }
    }
}
