use std::cmp::Ordering;
use std::slice;

/// A single cue. Times are in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleRecord {
    pub from: f64,
    pub to: f64,
    pub text: String,
}

impl SubtitleRecord {
    pub fn new(from: f64, to: f64, text: impl Into<String>) -> Self {
        Self {
            from,
            to,
            text: text.into(),
        }
    }

    pub fn is_active_at(&self, time: f64) -> bool {
        self.from <= time && time <= self.to
    }
}

/// All cues of one subtitle file, kept sorted by end time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubtitleTrack {
    records: Vec<SubtitleRecord>,
}

impl SubtitleTrack {
    pub fn new(mut records: Vec<SubtitleRecord>) -> Self {
        // Stable, so cues ending together keep their file order.
        records.sort_by(|a, b| by_end_time(a, b));
        Self { records }
    }

    pub fn records(&self) -> &[SubtitleRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, SubtitleRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a SubtitleTrack {
    type Item = &'a SubtitleRecord;
    type IntoIter = slice::Iter<'a, SubtitleRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn by_end_time(a: &SubtitleRecord, b: &SubtitleRecord) -> Ordering {
    a.to.total_cmp(&b.to)
}
