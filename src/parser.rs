use crate::error::{ParseAnomaly, TimestampError};
use crate::sanitiser::sanitise;
use crate::srt::{SubtitleRecord, SubtitleTrack};

use std::iter::{Enumerate, Peekable};
use std::str;

use log::{debug, warn};

const RANGE_SEPARATOR: &str = "-->";
const LINE_BREAK: &str = "<br>";

/// Line-oriented SRT scanner.
///
/// Parsing never fails. Anything that does not look like a cue is reported as
/// a [`ParseAnomaly`] and skipped, so one broken cue does not cost the rest of
/// the file.
pub struct Parser {
    expected_index: u64,
    anomalies: Vec<ParseAnomaly>,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            expected_index: 1,
            anomalies: Vec::new(),
        }
    }

    pub fn parse(&mut self, input: &str) -> SubtitleTrack {
        self.expected_index = 1;
        self.anomalies.clear();

        let input = input.strip_prefix('\u{FEFF}').unwrap_or(input);
        let mut lines = Lines::new(input);
        let mut records = Vec::new();

        loop {
            lines.skip_blank();
            let (index_no, index_line) = match lines.next() {
                Some(line) => line,
                None => break,
            };

            let range = if self.check_index(index_no, index_line) {
                lines.next()
            } else if index_line.contains(RANGE_SEPARATOR) {
                // No index at all, the line is already the timestamp range.
                Some((index_no, index_line))
            } else {
                lines.next()
            };

            let (range_no, range_line) = match range {
                Some(line) => line,
                None => {
                    self.report(ParseAnomaly::UnexpectedEof { line: index_no + 1 });
                    break;
                }
            };

            let (from, to) = match self.read_range(range_no, range_line) {
                Some(times) => times,
                None => {
                    lines.skip_orphaned_text();
                    continue;
                }
            };

            let text = lines.read_block().join(LINE_BREAK);
            records.push(SubtitleRecord::new(from, to, text));
        }

        debug!(
            "Parsed {} cues with {} anomalies",
            records.len(),
            self.anomalies.len()
        );
        SubtitleTrack::new(records)
    }

    /// Problems found by the last call to [`Parser::parse`].
    pub fn anomalies(&self) -> &[ParseAnomaly] {
        &self.anomalies
    }

    /// Returns whether the line held a cue index at all.
    fn check_index(&mut self, line: usize, content: &str) -> bool {
        match content.parse::<u64>() {
            Ok(found) if found == self.expected_index => {
                self.expected_index = found.saturating_add(1);
            }
            Ok(found) => {
                self.report(ParseAnomaly::IndexMismatch {
                    line,
                    expected: self.expected_index,
                    found,
                });
                self.expected_index = found.saturating_add(1);
            }
            Err(_) => {
                self.report(ParseAnomaly::MissingIndex {
                    line,
                    content: content.to_string(),
                });
                return false;
            }
        }
        true
    }

    fn read_range(&mut self, line: usize, content: &str) -> Option<(f64, f64)> {
        let parts: Vec<&str> = content.split(RANGE_SEPARATOR).collect();
        if parts.len() != 2 {
            self.report(ParseAnomaly::MalformedRange {
                line,
                content: content.to_string(),
            });
            return None;
        }

        let times = parse_timestamp(parts[0].trim())
            .and_then(|from| Ok((from, parse_timestamp(parts[1].trim())?)));
        match times {
            Ok(times) => Some(times),
            Err(reason) => {
                self.report(ParseAnomaly::MalformedTimestamp {
                    line,
                    content: content.to_string(),
                    reason,
                });
                None
            }
        }
    }

    fn report(&mut self, anomaly: ParseAnomaly) {
        warn!("{}", anomaly);
        self.anomalies.push(anomaly);
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Trimmed lines paired with their 1-based line number.
struct Lines<'a> {
    inner: Peekable<Enumerate<str::Lines<'a>>>,
}

impl<'a> Lines<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            inner: input.lines().enumerate().peekable(),
        }
    }

    fn next(&mut self) -> Option<(usize, &'a str)> {
        self.inner.next().map(|(idx, line)| (idx + 1, line.trim()))
    }

    fn skip_blank(&mut self) {
        while self
            .inner
            .next_if(|(_, line)| line.trim().is_empty())
            .is_some()
        {}
    }

    /// Sanitised text lines up to the next blank line, which is consumed.
    fn read_block(&mut self) -> Vec<String> {
        let mut text = Vec::new();
        while let Some((_, line)) = self.next() {
            if line.is_empty() {
                break;
            }
            text.push(sanitise(line));
        }
        text
    }

    /// Drops the text of an abandoned cue, stopping before a blank line or
    /// anything that could start the next cue.
    fn skip_orphaned_text(&mut self) {
        while self
            .inner
            .next_if(|(_, line)| !could_start_cue(line.trim()))
            .is_some()
        {}
    }
}

fn could_start_cue(line: &str) -> bool {
    line.is_empty() || line.parse::<u64>().is_ok() || line.contains(RANGE_SEPARATOR)
}

/// Reads `H:MM:SS,mmm` into seconds.
///
/// Any number of `:` separated fields is accepted, the rightmost being
/// seconds. The millisecond part after the comma is optional.
pub fn parse_timestamp(input: &str) -> Result<f64, TimestampError> {
    let mut parts = input.split(',');
    let clock = parts.next().unwrap_or_default();
    let millis = parts.next();
    if parts.next().is_some() {
        return Err(TimestampError::TooManyCommas(input.to_string()));
    }

    let mut seconds = 0.0;
    let mut multiplier = 1.0;
    for component in clock.rsplit(':') {
        seconds += integer(component)? as f64 * multiplier;
        multiplier *= 60.0;
    }
    if let Some(millis) = millis {
        seconds += integer(millis)? as f64 / 1000.0;
    }
    Ok(seconds)
}

fn integer(component: &str) -> Result<u64, TimestampError> {
    let component = component.trim();
    component
        .parse()
        .map_err(|_| TimestampError::InvalidComponent(component.to_string()))
}
