use crate::err::{EvtTxtError, ParseError, ParseResult, Result};
use crate::event_record::EventRecord;

use log::{debug, trace, warn};
use std::io::{self, BufRead};

/// A line containing this starts a new event.
pub const EVENT_NUMBER_MARKER: &str = "Event number";
/// A line containing this is an indexed string field (`String: <index>: <value>`).
pub const STRING_FIELD_MARKER: &str = "String:";
/// A field whose key contains this declares how many string fields the event has.
pub const STRING_COUNT_MARKER: &str = "Number of strings";

/// What the parser does with a line that does not split into the expected fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedLinePolicy {
    /// Return the error from [`EvtTxtParser::feed`] and drop the current event.
    #[default]
    Strict,
    /// Drop the current event and wait for the next `Event number` line.
    Resync,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParserSettings {
    malformed_line_policy: MalformedLinePolicy,
}

impl ParserSettings {
    pub fn new() -> Self {
        ParserSettings::default()
    }

    /// Sets how malformed lines are handled, see [`MalformedLinePolicy`].
    pub fn malformed_line_policy(mut self, policy: MalformedLinePolicy) -> Self {
        self.malformed_line_policy = policy;
        self
    }

    pub fn get_malformed_line_policy(&self) -> MalformedLinePolicy {
        self.malformed_line_policy
    }
}

/// The event currently being accumulated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParserState {
    /// `None` until a `Number of strings` field was seen.
    expected_string_count: Option<i64>,
    seen_string_count: u64,
    in_event: bool,
    current_record: EventRecord,
}

impl ParserState {
    pub fn expected_string_count(&self) -> Option<i64> {
        self.expected_string_count
    }

    pub fn seen_string_count(&self) -> u64 {
        self.seen_string_count
    }

    pub fn in_event(&self) -> bool {
        self.in_event
    }

    pub fn current_record(&self) -> &EventRecord {
        &self.current_record
    }

    fn reset(&mut self) {
        *self = ParserState::default();
    }

    fn is_complete(&self) -> bool {
        match self.expected_string_count {
            Some(expected) => u64::try_from(expected).is_ok_and(|n| n == self.seen_string_count),
            None => false,
        }
    }

    fn take_record(&mut self) -> EventRecord {
        let record = std::mem::take(&mut self.current_record);
        self.reset();
        record
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    /// Number of lines fed so far.
    pub lines: u64,
    pub records_emitted: u64,
    /// Events that were started but never completed (resync, malformed line, or end of input).
    pub records_discarded: u64,
}

/// Line-oriented state machine reconstructing events from a text event log.
///
/// Events have no end marker. An event starts at a line containing
/// [`EVENT_NUMBER_MARKER`] and is complete once as many [`STRING_FIELD_MARKER`]
/// lines were seen as its [`STRING_COUNT_MARKER`] field declared. A new
/// `Event number` line always wins: any partially built event is discarded.
///
/// ```
/// use evtxt::EvtTxtParser;
///
/// let mut parser = EvtTxtParser::new();
/// assert!(parser.feed("Event number: 12").unwrap().is_none());
/// let record = parser.feed("Number of strings: 0").unwrap().unwrap();
///
/// assert_eq!(record.get("Event number"), Some("12"));
/// ```
#[derive(Debug, Default)]
pub struct EvtTxtParser {
    state: ParserState,
    stats: ParserStats,
    config: ParserSettings,
}

impl EvtTxtParser {
    pub fn new() -> Self {
        EvtTxtParser::default()
    }

    pub fn with_configuration(mut self, configuration: ParserSettings) -> Self {
        self.config = configuration;
        self
    }

    pub fn state(&self) -> &ParserState {
        &self.state
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Consumes a single line, returning an event if this line completed one.
    ///
    /// A trailing `\n` or `\r\n` is ignored, so lines can be fed with or without their terminator.
    pub fn feed(&mut self, line: &str) -> ParseResult<Option<EventRecord>> {
        self.stats.lines += 1;
        let line_number = self.stats.lines;
        let line = strip_line_terminator(line);

        trace!("Line {}: `{}`", line_number, line);

        if line.contains(EVENT_NUMBER_MARKER) {
            if self.state.in_event {
                self.discard(line_number, "a new event started before it was complete");
            }
            self.state.reset();
            self.state.in_event = true;
        }

        if !self.state.in_event {
            return Ok(None);
        }

        if let Err(e) = self.read_field(line, line_number) {
            self.discard(line_number, "the line is malformed");
            self.state.reset();

            return match self.config.malformed_line_policy {
                MalformedLinePolicy::Strict => Err(e),
                MalformedLinePolicy::Resync => {
                    warn!("{}, waiting for the next event", e);
                    Ok(None)
                }
            };
        }

        if self.state.is_complete() {
            let record = self.state.take_record();
            self.stats.records_emitted += 1;
            debug!(
                "Line {}: completed event with {} fields",
                line_number,
                record.len()
            );
            return Ok(Some(record));
        }

        Ok(None)
    }

    /// Signals end of input. An event still in progress is truncated and discarded.
    pub fn finish(&mut self) {
        if self.state.in_event {
            let line_number = self.stats.lines;
            self.discard(line_number, "input ended before it was complete");
            self.state.reset();
        }
    }

    /// Lazily parses events out of a sequence of lines.
    ///
    /// With [`MalformedLinePolicy::Strict`], iteration stops after the first error.
    pub fn records<I>(&mut self, lines: I) -> IterRecords<'_, I::IntoIter>
    where
        I: IntoIterator<Item = io::Result<String>>,
    {
        IterRecords {
            parser: self,
            lines: lines.into_iter(),
            done: false,
        }
    }

    pub fn records_from_reader<R: BufRead>(&mut self, reader: R) -> IterRecords<'_, io::Lines<R>> {
        self.records(reader.lines())
    }

    fn read_field(&mut self, line: &str, line_number: u64) -> ParseResult<()> {
        if line.contains(STRING_FIELD_MARKER) {
            let [label, index, value] = split_fields::<3>(line, line_number)?;

            let label = label.trim_matches('\t');
            let index = skip_separator(index).trim_matches('\t');
            let value = trim_line_terminator(skip_separator(value));

            self.state
                .current_record
                .insert(format!("{} #{}", label, index), value);
            self.state.seen_string_count += 1;
        } else {
            let [key, value] = split_fields::<2>(line, line_number)?;
            let key = key.trim_matches('\t');

            if key.contains(STRING_COUNT_MARKER) {
                let count = value.trim().parse::<i64>().map_err(|source| {
                    ParseError::InvalidStringCount {
                        line_number,
                        value: value.trim().to_owned(),
                        source,
                    }
                })?;
                self.state.expected_string_count = Some(count);
            }

            self.state
                .current_record
                .insert(key, trim_line_terminator(skip_separator(value)));
        }

        Ok(())
    }

    fn discard(&mut self, line_number: u64, reason: &str) {
        self.stats.records_discarded += 1;
        warn!(
            "Line {}: discarding incomplete event ({} of {} strings seen), {}",
            line_number,
            self.state.seen_string_count,
            self.state
                .expected_string_count
                .map_or_else(|| "unknown".to_owned(), |n| n.to_string()),
            reason
        );
    }
}

pub struct IterRecords<'p, I> {
    parser: &'p mut EvtTxtParser,
    lines: I,
    done: bool,
}

impl<I> Iterator for IterRecords<'_, I>
where
    I: Iterator<Item = io::Result<String>>,
{
    type Item = Result<EventRecord>;

    fn next(&mut self) -> Option<<Self as Iterator>::Item> {
        if self.done {
            return None;
        }

        loop {
            let line = match self.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(source)) => {
                    self.done = true;
                    return Some(Err(EvtTxtError::FailedToRead {
                        path: None,
                        line_number: self.parser.stats.lines + 1,
                        source,
                    }));
                }
                None => {
                    self.parser.finish();
                    self.done = true;
                    return None;
                }
            };

            match self.parser.feed(&line) {
                Ok(Some(record)) => return Some(Ok(record)),
                Ok(None) => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

/// Splits `line` on the first `N - 1` colons into exactly `N` parts.
fn split_fields<const N: usize>(line: &str, line_number: u64) -> ParseResult<[&str; N]> {
    let mut parts = [""; N];
    let mut found = 0;

    for (slot, part) in parts.iter_mut().zip(line.splitn(N, ':')) {
        *slot = part;
        found += 1;
    }

    if found != N {
        return Err(ParseError::MalformedLine {
            line_number,
            expected: N,
            found,
            line: line.to_owned(),
        });
    }

    Ok(parts)
}

/// Drops the single separator character following a `:`.
fn skip_separator(s: &str) -> &str {
    let mut chars = s.chars();
    chars.next();
    chars.as_str()
}

fn strip_line_terminator(line: &str) -> &str {
    match line.strip_suffix('\n') {
        Some(line) => line.strip_suffix('\r').unwrap_or(line),
        None => line,
    }
}

fn trim_line_terminator(s: &str) -> &str {
    s.trim_matches(|c| c == '\n' || c == '\r')
}
