use anyhow::{Context, Result, format_err};
use clap::{Arg, ArgAction, ArgMatches, Command};
use indoc::indoc;
use log::{Level, error, info, warn};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use evtxt::evt_txt_file::{DEFAULT_OUTPUT_POSTFIX, INPUT_FILE_EXTENSION};
use evtxt::{
    ConverterSettings, EvtTxtConverter, JsonLinesSink, LogSource, MalformedLinePolicy,
    ParserSettings, find_log_files,
};

use std::env;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

struct EvtxtDump {
    converter: EvtTxtConverter,
    root: PathBuf,
    to_stdout: bool,
    verbosity_level: Level,
}

impl EvtxtDump {
    pub fn from_cli_matches(matches: &ArgMatches) -> Result<Self> {
        let root = match matches.get_one::<PathBuf>("ROOT") {
            Some(root) => root.clone(),
            None => env::current_dir().context("failed to determine the current directory")?,
        };

        let policy = if matches.get_flag("resync-on-malformed") {
            MalformedLinePolicy::Resync
        } else {
            MalformedLinePolicy::Strict
        };

        let postfix = matches
            .get_one::<String>("postfix")
            .map(String::as_str)
            .unwrap_or(DEFAULT_OUTPUT_POSTFIX);

        let settings = ConverterSettings::new()
            .output_folder(matches.get_one::<PathBuf>("output-dir").cloned())
            .postfix(postfix)
            .parser_settings(ParserSettings::new().malformed_line_policy(policy));

        // Warnings (resyncs, lifecycle diagnostics) are always shown.
        let verbosity_level = match matches.get_count("verbose") {
            0 => Level::Warn,
            1 => Level::Info,
            2 => Level::Debug,
            3 => Level::Trace,
            _ => {
                eprintln!("using more than  -vvv does not affect verbosity level");
                Level::Trace
            }
        };

        Ok(EvtxtDump {
            converter: EvtTxtConverter::new(settings),
            root,
            to_stdout: matches.get_flag("stdout"),
            verbosity_level,
        })
    }

    /// Main entry point for `EvtxtDump`, returns the number of files that failed to convert.
    pub fn run(&self) -> Result<usize> {
        self.try_to_initialize_logging();

        let files = find_log_files(&self.root)
            .with_context(|| format!("failed to search {}", self.root.display()))?;

        if files.is_empty() {
            error!(
                "no .{} file found under {}",
                INPUT_FILE_EXTENSION,
                self.root.display()
            );
            return Ok(0);
        }

        info!("Found {} file(s) under {}", files.len(), self.root.display());

        if self.to_stdout {
            self.dump_to_stdout(&files)
        } else {
            Ok(self.dump_to_files(&files))
        }
    }

    fn dump_to_files(&self, files: &[PathBuf]) -> usize {
        let mut failed = 0;

        for path in files {
            match self.converter.convert_file(path) {
                Ok(summary) => {
                    info!(
                        "{} -> {} ({} records, {} discarded)",
                        summary.input.display(),
                        summary.output.display(),
                        summary.records_written,
                        summary.stats.records_discarded
                    );
                }
                Err(e) => {
                    failed += 1;
                    eprintln!("{}", e);
                }
            }
        }

        failed
    }

    fn dump_to_stdout(&self, files: &[PathBuf]) -> Result<usize> {
        let mut sink = JsonLinesSink::from_writer(BufWriter::new(io::stdout().lock()));
        let mut failed = 0;

        for path in files {
            if let Err(e) = self.dump_file_to(path, &mut sink) {
                failed += 1;
                eprintln!("{:#}", e);
            }
        }

        sink.close().context("failed to flush stdout")?;
        Ok(failed)
    }

    fn dump_file_to<W: Write>(&self, path: &Path, sink: &mut JsonLinesSink<W>) -> Result<()> {
        let mut source = LogSource::open(path)?;
        let reader = source
            .reader()
            .ok_or_else(|| format_err!("{} is not open", path.display()))?;

        let stats = self
            .converter
            .convert_reader(reader, sink)
            .map_err(|e| e.in_file(path));
        source.close();

        let stats = stats?;
        if stats.records_discarded > 0 {
            warn!(
                "{}: {} incomplete event(s) discarded",
                path.display(),
                stats.records_discarded
            );
        }
        Ok(())
    }

    fn try_to_initialize_logging(&self) {
        if let Err(e) = TermLogger::init(
            self.verbosity_level.to_level_filter(),
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ) {
            eprintln!("Failed to initialize logging: {:?}", e);
        }
    }
}

fn main() {
    let matches = Command::new("EVT text log converter")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Converts text event log exports (*.log) into JSON lines")
        .arg(
            Arg::new("ROOT")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Directory searched recursively for .log files, defaults to the current directory."),
        )
        .arg(
            Arg::new("output-dir")
                .short('o')
                .long("output-dir")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Writes all output files into this directory instead of next to their input. \
                       Will be created if needed."),
        )
        .arg(
            Arg::new("postfix")
                .long("postfix")
                .default_value(DEFAULT_OUTPUT_POSTFIX)
                .help("Inserted between the input file name and the `.txt` extension of the output."),
        )
        .arg(
            Arg::new("resync-on-malformed")
                .long("resync-on-malformed")
                .action(ArgAction::SetTrue)
                .help("Skip to the next event on malformed lines instead of failing the file.")
                .long_help(indoc!(
                    "
                    By default, a line that cannot be split into `key: value` (or
                    `String: index: value`) fields fails the whole file, keeping the
                    events converted before it.
                    When set, the event containing the line is discarded instead and
                    parsing continues at the next `Event number` line.
                    "
                )),
        )
        .arg(
            Arg::new("stdout")
                .long("stdout")
                .action(ArgAction::SetTrue)
                .help("Writes the records of all files to stdout instead of `<name>_result.txt` files."),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("-v - info, -vv - debug, -vvv - trace. \
                       trace output is only available in debug builds, as it is extremely verbose"),
        )
        .get_matches();

    let app = match EvtxtDump::from_cli_matches(&matches) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("{:#}", e);
            exit(1)
        }
    };

    match app.run() {
        Ok(0) => {}
        Ok(failed) => {
            eprintln!("{} file(s) failed to convert", failed);
            exit(1)
        }
        Err(e) => {
            eprintln!("{:#}", e);
            exit(1)
        }
    }
}
