use crate::err::{EvtTxtError, Result};
use crate::evt_txt_parser::{EvtTxtParser, ParserSettings, ParserStats};
use crate::json_output::JsonLinesSink;

use glob::{MatchOptions, Pattern};
use log::{debug, info, warn};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Extension of the files picked up by [`find_log_files`] (matched case-insensitively).
pub const INPUT_FILE_EXTENSION: &str = "log";
pub const OUTPUT_FILE_EXTENSION: &str = "txt";
pub const DEFAULT_OUTPUT_POSTFIX: &str = "_result";

/// An opened text event log.
#[derive(Debug)]
pub struct LogSource {
    path: PathBuf,
    reader: Option<BufReader<File>>,
}

impl LogSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|source| EvtTxtError::FailedToOpenFile {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(LogSource {
            path: path.to_path_buf(),
            reader: Some(BufReader::new(f)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    pub fn reader(&mut self) -> Option<&mut BufReader<File>> {
        self.reader.as_mut()
    }

    /// Releases the file handle. Closing twice only logs a warning.
    pub fn close(&mut self) {
        if self.reader.take().is_none() {
            warn!(
                "log file {} already closed or not existed",
                self.path.display()
            );
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterSettings {
    output_folder: Option<PathBuf>,
    postfix: String,
    parser_settings: ParserSettings,
}

impl Default for ConverterSettings {
    fn default() -> Self {
        ConverterSettings {
            output_folder: None,
            postfix: DEFAULT_OUTPUT_POSTFIX.to_owned(),
            parser_settings: ParserSettings::default(),
        }
    }
}

impl ConverterSettings {
    pub fn new() -> Self {
        ConverterSettings::default()
    }

    /// Writes every output into `folder` instead of next to its input.
    pub fn output_folder(mut self, folder: Option<PathBuf>) -> Self {
        self.output_folder = folder;
        self
    }

    /// Inserted between the input file stem and the output extension.
    pub fn postfix(mut self, postfix: impl Into<String>) -> Self {
        self.postfix = postfix.into();
        self
    }

    pub fn parser_settings(mut self, settings: ParserSettings) -> Self {
        self.parser_settings = settings;
        self
    }

    pub fn get_output_folder(&self) -> Option<&Path> {
        self.output_folder.as_deref()
    }

    pub fn get_postfix(&self) -> &str {
        &self.postfix
    }

    pub fn get_parser_settings(&self) -> &ParserSettings {
        &self.parser_settings
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionSummary {
    pub input: PathBuf,
    pub output: PathBuf,
    pub records_written: u64,
    pub stats: ParserStats,
}

/// Converts text event logs into JSON lines files, one file at a time.
///
/// Every file gets its own [`EvtTxtParser`], so nothing carries over between files.
#[derive(Debug, Clone, Default)]
pub struct EvtTxtConverter {
    settings: ConverterSettings,
}

impl EvtTxtConverter {
    pub fn new(settings: ConverterSettings) -> Self {
        EvtTxtConverter { settings }
    }

    pub fn settings(&self) -> &ConverterSettings {
        &self.settings
    }

    /// `D/name.log` -> `D/name_result.txt` (or `<output folder>/name_result.txt`).
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        let mut name = input.file_stem().unwrap_or_default().to_os_string();
        name.push(&self.settings.postfix);
        name.push(".");
        name.push(OUTPUT_FILE_EXTENSION);

        let folder = match &self.settings.output_folder {
            Some(folder) => folder.as_path(),
            None => input.parent().unwrap_or_else(|| Path::new("")),
        };

        folder.join(name)
    }

    /// Converts `input` into the file returned by [`Self::output_path_for`].
    ///
    /// The output is truncated first. Both files are closed on every path out of this
    /// function; a parse error leaves the records converted so far in the output.
    pub fn convert_file(&self, input: impl AsRef<Path>) -> Result<ConversionSummary> {
        let input = input.as_ref();
        let output = self.output_path_for(input);

        info!("Converting {} into {}", input.display(), output.display());

        let mut source = LogSource::open(input)?;
        let mut sink = match JsonLinesSink::create(&output) {
            Ok(sink) => sink,
            Err(e) => {
                source.close();
                return Err(e);
            }
        };

        let converted = match source.reader() {
            Some(reader) => self.convert_reader(reader, &mut sink),
            None => Ok(ParserStats::default()),
        };

        let records_written = sink.lines_written();
        let closed = sink.close();
        source.close();

        let stats = converted.map_err(|e| e.in_file(input))?;
        closed.map_err(|e| e.in_file(input))?;

        debug!(
            "{}: {} lines, {} records written, {} discarded",
            input.display(),
            stats.lines,
            records_written,
            stats.records_discarded
        );

        Ok(ConversionSummary {
            input: input.to_path_buf(),
            output,
            records_written,
            stats,
        })
    }

    /// Parses all events from `reader` and writes them to `sink`.
    pub fn convert_reader<R: BufRead, W: Write>(
        &self,
        reader: R,
        sink: &mut JsonLinesSink<W>,
    ) -> Result<ParserStats> {
        let mut parser =
            EvtTxtParser::new().with_configuration(self.settings.parser_settings.clone());

        for record in parser.records_from_reader(reader) {
            sink.write_record(&record?)?;
        }

        Ok(parser.stats())
    }
}

/// Recursively collects the `.log` files under `root`, sorted by path.
pub fn find_log_files(root: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();

    if !root.is_dir() {
        return Err(EvtTxtError::Traversal {
            path: root.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotFound, "not a directory"),
        });
    }

    let pattern = format!(
        "{}/**/*.{}",
        Pattern::escape(&root.to_string_lossy()),
        INPUT_FILE_EXTENSION
    );
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    let entries = glob::glob_with(&pattern, options).map_err(|source| {
        EvtTxtError::InvalidGlobPattern {
            pattern: pattern.clone(),
            source,
        }
    })?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => warn!("skipping {}: {}", e.path().display(), e.error()),
        }
    }

    files.sort();
    Ok(files)
}
