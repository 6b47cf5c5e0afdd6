use crate::srt::SubtitleTrack;

const LINE_BREAK: &str = "<br>";

/// Index of the first cue that has not ended yet at `time`.
///
/// Every cue before it ends strictly before `time`, so a lookup never has to
/// look further back, however far playback has progressed.
pub fn scan_start(track: &SubtitleTrack, time: f64) -> usize {
    track.records().partition_point(|record| record.to < time)
}

/// Markup for all cues showing at `time`, or an empty string if none are.
///
/// Overlapping cues are each wrapped in a `<span>` and joined with line
/// breaks, in track order.
pub fn active_text(track: &SubtitleTrack, time: f64) -> String {
    if time.is_nan() {
        return String::new();
    }

    let records = track.records();
    let mut text = String::new();
    for record in &records[scan_start(track, time)..] {
        // Only reachable on a track that is not sorted by end time.
        if record.to < time {
            break;
        }
        if record.is_active_at(time) {
            if !text.is_empty() {
                text.push_str(LINE_BREAK);
            }
            text.push_str("<span>");
            text.push_str(&record.text);
            text.push_str("</span>");
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::srt::SubtitleRecord;

    fn track(records: &[(f64, f64, &str)]) -> SubtitleTrack {
        SubtitleTrack::new(
            records
                .iter()
                .map(|&(from, to, text)| SubtitleRecord::new(from, to, text))
                .collect(),
        )
    }

    macro_rules! test_active_text {
        ($($name:ident: $value:expr,)*) => {
        $(
            #[test]
            fn $name() {
                let (time, expected) = $value;
                let track = track(&[
                    (1.0, 2.0, "x"),
                    (10.0, 15.0, "A"),
                    (12.0, 17.0, "B"),
                    (20.0, 21.0, "y"),
                ]);

                assert_eq!(active_text(&track, time), expected);
            }
        )*
        }
    }

    test_active_text! {
        test_active_text_before_first: (0.5, ""),
        test_active_text_touching_start: (1.0, "<span>x</span>"),
        test_active_text_inside: (1.5, "<span>x</span>"),
        test_active_text_touching_end: (2.0, "<span>x</span>"),
        test_active_text_just_before: (0.999, ""),
        test_active_text_just_after: (2.001, ""),
        test_active_text_gap: (5.0, ""),
        test_active_text_first_of_overlap: (11.0, "<span>A</span>"),
        test_active_text_overlap: (13.0, "<span>A</span><br><span>B</span>"),
        test_active_text_second_of_overlap: (16.0, "<span>B</span>"),
        test_active_text_last: (21.0, "<span>y</span>"),
        test_active_text_after_last: (99.0, ""),
        test_active_text_negative: (-3.0, ""),
        test_active_text_nan: (f64::NAN, ""),
    }

    #[test]
    fn empty_track_shows_nothing() {
        assert_eq!(active_text(&SubtitleTrack::default(), 1.0), "");
        assert_eq!(scan_start(&SubtitleTrack::default(), 1.0), 0);
    }

    #[test]
    fn overlapping_cues_keep_track_order() {
        let track = track(&[(0.0, 5.0, "A"), (2.0, 7.0, "B")]);
        assert_eq!(active_text(&track, 3.0), "<span>A</span><br><span>B</span>");
    }

    #[test]
    fn long_cue_ending_late_is_found() {
        // Sorted by end time, the long cue comes after the short ones.
        let track = track(&[(0.0, 100.0, "long"), (1.0, 2.0, "a"), (3.0, 4.0, "b")]);
        assert_eq!(active_text(&track, 3.5), "<span>b</span><br><span>long</span>");
        assert_eq!(active_text(&track, 50.0), "<span>long</span>");
    }

    #[test]
    fn scan_start_never_decreases_during_playback() {
        let track = track(&[
            (0.0, 1.0, "a"),
            (0.5, 3.0, "b"),
            (2.0, 3.0, "c"),
            (4.0, 8.0, "d"),
            (5.0, 6.0, "e"),
        ]);

        let mut previous = 0;
        for tick in 0..100 {
            let start = scan_start(&track, tick as f64 * 0.1);
            assert!(start >= previous);
            previous = start;
        }
        assert_eq!(scan_start(&track, 100.0), track.len());
    }

    #[test]
    fn seeking_backwards_finds_earlier_cues() {
        let track = track(&[(1.0, 2.0, "first"), (8.0, 9.0, "second")]);
        assert_eq!(active_text(&track, 8.5), "<span>second</span>");
        assert_eq!(active_text(&track, 1.5), "<span>first</span>");
    }

    #[test]
    fn scan_start_lands_on_cues_ending_at_time() {
        let track = track(&[(0.0, 1.0, "a"), (0.0, 2.0, "b"), (1.0, 2.0, "c"), (2.0, 3.0, "d")]);
        assert_eq!(scan_start(&track, 2.0), 1);
        assert_eq!(
            active_text(&track, 2.0),
            "<span>b</span><br><span>c</span><br><span>d</span>"
        );
    }
}
