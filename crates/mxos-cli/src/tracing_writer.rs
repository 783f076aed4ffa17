//! Log file writer for the optional file layer.
//!
//! The terminal layer writes to stderr directly. stdout is not available
//! for logs: it carries the terminal display in `run` and the JSON line
//! protocol in `worker`.

use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

/// [`MakeWriter`](tracing_subscriber::fmt::MakeWriter) appending to a log file.
///
/// Each event is buffered and written with a single locked `write_all`,
/// so lines from the render loop and worker threads never interleave.
#[derive(Clone)]
pub struct LogFile {
    file: Arc<Mutex<File>>,
}

impl LogFile {
    /// Opens `path` for appending, creating it and its parent directory.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogFile {
    type Writer = LogLine;

    fn make_writer(&'a self) -> Self::Writer {
        LogLine {
            file: Arc::clone(&self.file),
            buf: Vec::with_capacity(256),
        }
    }
}

/// One event's bytes, flushed to the file on drop.
pub struct LogLine {
    file: Arc<Mutex<File>>,
    buf: Vec<u8>,
}

impl Write for LogLine {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for LogLine {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let mut file = self.file.lock();
        let _ = file.write_all(&self.buf);
        let _ = file.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::fmt::MakeWriter;

    #[test]
    fn lines_are_appended() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("logs").join("mxos.log");
        let log = LogFile::open(&path).expect("open");

        {
            let mut line = log.make_writer();
            line.write_all(b"first\n").expect("write");
        }
        {
            let mut line = log.make_writer();
            line.write_all(b"second\n").expect("write");
        }
        drop(LogFile::open(&path).expect("reopen"));

        let text = std::fs::read_to_string(&path).expect("read");
        assert_eq!(text, "first\nsecond\n");
    }
}
