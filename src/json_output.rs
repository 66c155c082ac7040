use crate::err::{EvtTxtError, Result};
use crate::event_record::EventRecord;

use log::{trace, warn};
use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Single-line JSON objects with a space after every `,` and `:` between members.
///
/// This is the layout existing consumers of the converted logs expect, e.g.
/// `{"Event number": "12", "Number of strings": "0"}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    #[inline]
    fn begin_object_key<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    #[inline]
    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }
}

/// Writes `record` as a single JSON object (no trailing newline).
///
/// Members appear in the record's field order; non-ASCII text is written as-is.
pub fn write_record<W: Write>(writer: W, record: &EventRecord) -> Result<()> {
    let mut serializer = Serializer::with_formatter(writer, SpacedFormatter);
    record.serialize(&mut serializer)?;
    Ok(())
}

pub fn serialize(record: &EventRecord) -> Result<String> {
    let mut buffer = Vec::with_capacity(256);
    write_record(&mut buffer, record)?;

    String::from_utf8(buffer)
        .map_err(|e| EvtTxtError::write(io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// Line-delimited JSON output.
///
/// The sink may be closed (or never opened); writes to a closed sink are dropped with a
/// warning, and closing it again is a no-op. The underlying writer is flushed and released
/// when the sink is closed or dropped.
pub struct JsonLinesSink<W: Write = BufWriter<File>> {
    writer: Option<W>,
    path: Option<PathBuf>,
    lines_written: u64,
}

impl JsonLinesSink<BufWriter<File>> {
    /// Creates (or truncates) the file at `path`, creating its parent directory if needed.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let mut sink = Self::closed();
        sink.open(path)?;
        Ok(sink)
    }

    /// Opens `path` as the new output, closing the previous one first.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.close()?;

        let file = create_output_file(path).map_err(|source| EvtTxtError::FailedToCreateOutput {
            path: path.to_path_buf(),
            source,
        })?;

        trace!("Opened output file {}", path.display());
        self.writer = Some(BufWriter::new(file));
        self.path = Some(path.to_path_buf());
        self.lines_written = 0;
        Ok(())
    }
}

impl<W: Write> JsonLinesSink<W> {
    pub fn closed() -> Self {
        JsonLinesSink {
            writer: None,
            path: None,
            lines_written: 0,
        }
    }

    pub fn from_writer(writer: W) -> Self {
        JsonLinesSink {
            writer: Some(writer),
            path: None,
            lines_written: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// Path of the currently opened output file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Appends `line` and a newline.
    pub fn emit(&mut self, line: &str) -> Result<()> {
        match self.writer.as_mut() {
            Some(writer) => {
                writer
                    .write_all(line.as_bytes())
                    .and_then(|_| writer.write_all(b"\n"))
                    .map_err(EvtTxtError::write)?;
                self.lines_written += 1;
            }
            None => warn!("output file not opened, dropping record"),
        }
        Ok(())
    }

    pub fn write_record(&mut self, record: &EventRecord) -> Result<()> {
        let line = serialize(record)?;
        self.emit(&line)
    }

    /// Flushes and releases the writer.
    pub fn close(&mut self) -> Result<()> {
        match self.writer.take() {
            Some(mut writer) => {
                self.path = None;
                writer
                    .flush()
                    .map_err(EvtTxtError::write)
            }
            None => {
                warn!("output file already closed or not existed");
                Ok(())
            }
        }
    }

    /// Releases the writer without flushing it again.
    pub fn into_inner(mut self) -> Option<W> {
        self.writer.take()
    }
}

impl<W: Write> Drop for JsonLinesSink<W> {
    fn drop(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                warn!("failed to flush output on drop: {}", e);
            }
        }
    }
}

fn create_output_file(path: &Path) -> io::Result<File> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            fs::create_dir_all(parent)?;
            File::create(path)
        }
        _ => File::create(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensure_env_logger_initialized;
    use pretty_assertions::assert_eq;

    fn hello_world() -> EventRecord {
        [
            ("Event number", "12"),
            ("Number of strings", "2"),
            ("String #0", "Hello"),
            ("String #1", "World"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_serializes_in_field_order() {
        assert_eq!(
            serialize(&hello_world()).unwrap(),
            r#"{"Event number": "12", "Number of strings": "2", "String #0": "Hello", "String #1": "World"}"#
        );
    }

    #[test]
    fn test_serializes_reverse_alphabetical_keys_unsorted() {
        let record: EventRecord = [("z", "1"), ("m", "2"), ("a", "3")].into_iter().collect();

        assert_eq!(
            serialize(&record).unwrap(),
            r#"{"z": "1", "m": "2", "a": "3"}"#
        );
    }

    #[test]
    fn test_non_ascii_is_not_escaped() {
        let record: EventRecord = [("String #0", "Größe 日本語 🚀")].into_iter().collect();

        assert_eq!(
            serialize(&record).unwrap(),
            r#"{"String #0": "Größe 日本語 🚀"}"#
        );
    }

    #[test]
    fn test_control_characters_and_quotes_are_escaped() {
        let record: EventRecord = [("Path", "C:\\temp\t\"x\"")].into_iter().collect();

        assert_eq!(
            serialize(&record).unwrap(),
            r#"{"Path": "C:\\temp\t\"x\""}"#
        );
    }

    #[test]
    fn test_empty_record() {
        assert_eq!(serialize(&EventRecord::new()).unwrap(), "{}");
    }

    #[test]
    fn test_sink_appends_lines() {
        let mut sink = JsonLinesSink::from_writer(Vec::new());
        sink.write_record(&hello_world()).unwrap();
        sink.emit("{}").unwrap();

        assert_eq!(sink.lines_written(), 2);
        let out = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        assert_eq!(
            out,
            "{\"Event number\": \"12\", \"Number of strings\": \"2\", \"String #0\": \"Hello\", \"String #1\": \"World\"}\n{}\n"
        );
    }

    #[test]
    fn test_closing_twice_is_not_an_error() {
        ensure_env_logger_initialized();
        let mut sink = JsonLinesSink::from_writer(Vec::new());

        sink.close().unwrap();
        sink.close().unwrap();
        assert!(!sink.is_open());
    }

    #[test]
    fn test_writing_to_closed_sink_drops_line() {
        let mut sink: JsonLinesSink<Vec<u8>> = JsonLinesSink::closed();

        sink.write_record(&hello_world()).unwrap();

        assert_eq!(sink.lines_written(), 0);
        assert!(sink.into_inner().is_none());
    }

    #[test]
    fn test_create_truncates_and_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out_result.txt");

        let mut sink = JsonLinesSink::create(&path).unwrap();
        sink.emit("first").unwrap();
        sink.close().unwrap();

        let mut sink = JsonLinesSink::create(&path).unwrap();
        assert_eq!(sink.path(), Some(path.as_path()));
        sink.emit("second").unwrap();
        drop(sink);

        assert_eq!(fs::read_to_string(&path).unwrap(), "second\n");
    }
}
