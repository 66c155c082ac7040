#![deny(unused_must_use)]
#![forbid(unsafe_code)]
//! Converts plain-text event log exports into JSON lines.
//!
//! The input is a sequence of events, each introduced by an `Event number` line, followed by
//! `Key: value` fields, a `Number of strings: N` field and `N` indexed `String: i: value` lines.
//! [`EvtTxtParser`] rebuilds those events as ordered [`EventRecord`]s, and
//! [`JsonLinesSink`] writes them out one JSON object per line.
//!
//! ```
//! use evtxt::{EvtTxtParser, serialize};
//!
//! let log = "Event number: 12\nNumber of strings: 2\nString: 0: Hello\nString: 1: World\n";
//! let mut parser = EvtTxtParser::new();
//!
//! let records = parser
//!     .records_from_reader(log.as_bytes())
//!     .collect::<Result<Vec<_>, _>>()
//!     .unwrap();
//!
//! assert_eq!(
//!     serialize(&records[0]).unwrap(),
//!     r#"{"Event number": "12", "Number of strings": "2", "String #0": "Hello", "String #1": "World"}"#
//! );
//! ```

pub use event_record::EventRecord;
pub use evt_txt_file::{
    ConversionSummary, ConverterSettings, EvtTxtConverter, LogSource, find_log_files,
};
pub use evt_txt_parser::{
    EvtTxtParser, IterRecords, MalformedLinePolicy, ParserSettings, ParserState, ParserStats,
};
pub use json_output::{JsonLinesSink, SpacedFormatter, serialize};

pub mod err;
pub mod event_record;
pub mod evt_txt_file;
pub mod evt_txt_parser;
pub mod json_output;

// For tests, we only initialize logging once.
#[cfg(test)]
use std::sync::Once;

#[cfg(test)]
static LOGGER_INIT: Once = Once::new();

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
#[cfg(test)]
pub fn ensure_env_logger_initialized() {
    use std::io::Write;

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .init();
    });
}
