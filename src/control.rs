/// HEC-HMS control file patching.
///
/// The control file is a line-oriented text format:
///
/// ```text
/// Control: Control_1
///      Start Date: 01 January 2000
///      Start Time: 00:00
///      End Date: 02 January 2000
///      End Time: 00:00
///      Time Interval: 60
/// End:
/// ```
///
/// Only the values after the five timing keys are replaced; every other line
/// is written back byte for byte.

use chrono::NaiveDateTime;
use std::fs;
use std::path::Path;

use crate::logging::{self, Source};
use crate::model::PipelineError;
use crate::output::rain_csv::RainCsv;

/// Timing values written into a control file.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlTimes {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub interval_minutes: u32,
}

impl ControlTimes {
    /// Takes the first and last data row timestamps of a rain CSV.
    pub fn from_rain_csv(csv: &RainCsv, interval_minutes: u32) -> Result<Self, PipelineError> {
        match (csv.first_time(), csv.last_time()) {
            (Some(start), Some(end)) => Ok(Self {
                start,
                end,
                interval_minutes,
            }),
            _ => Err(PipelineError::ControlFile("rain CSV has no data rows".to_string())),
        }
    }

    /// Key/value pairs in the order lines are tested against them.
    fn entries(&self) -> [(&'static str, String); 5] {
        [
            ("Start Date:", self.start.format("%d %B %Y").to_string()),
            ("Start Time:", self.start.format("%H:%M").to_string()),
            ("End Date:", self.end.format("%d %B %Y").to_string()),
            ("End Time:", self.end.format("%H:%M").to_string()),
            ("Time Interval:", self.interval_minutes.to_string()),
        ]
    }
}

/// Rewrites the timing lines of control file text.
///
/// A line containing one of the keys is cut right after the key's last
/// occurrence and gets `" <value>\n"` appended. The first matching key wins.
pub fn patch_control_text(text: &str, times: &ControlTimes) -> String {
    let entries = times.entries();
    let mut patched = String::with_capacity(text.len());

    for line in text.split_inclusive('\n') {
        let hit = entries
            .iter()
            .find_map(|(key, value)| line.rfind(key).map(|pos| (pos + key.len(), value)));
        match hit {
            Some((cut, value)) => {
                patched.push_str(&line[..cut]);
                patched.push(' ');
                patched.push_str(value);
                patched.push('\n');
            }
            None => patched.push_str(line),
        }
    }

    patched
}

/// Patches the control file at `path` in place.
pub fn patch_control_file(path: &Path, times: &ControlTimes) -> Result<(), PipelineError> {
    let text = fs::read_to_string(path)
        .map_err(|e| PipelineError::ControlFile(format!("{}: {}", path.display(), e)))?;
    let patched = patch_control_text(&text, times);
    fs::write(path, patched)
        .map_err(|e| PipelineError::ControlFile(format!("{}: {}", path.display(), e)))?;

    logging::info(
        Source::ControlFile,
        None,
        &format!(
            "Updated HEC-HMS control file {} ({} .. {})",
            path.display(),
            times.start,
            times.end
        ),
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TIMESTAMP_FORMAT;
    use crate::output::rain_csv::RainRow;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).unwrap()
    }

    fn times() -> ControlTimes {
        ControlTimes {
            start: ts("2018-05-20 21:00:00"),
            end: ts("2018-05-25 21:00:00"),
            interval_minutes: 60,
        }
    }

    const CONTROL: &str = concat!(
        "Control: Control_1\n",
        "IN01  Start Date: 01 January 2000\n",
        "     Start Time: 00:00\n",
        "     End Date: 02 January 2000\n",
        "     End Time: 00:00\n",
        "     Time Interval: 15\n",
        "     Description: spring event\r\n",
        "End:\n",
        "\n",
    );

    #[test]
    fn test_start_date_line_is_patched() {
        let patched = patch_control_text(CONTROL, &times());
        let lines: Vec<&str> = patched.lines().collect();
        assert_eq!(lines[1], "IN01  Start Date: 20 May 2018");
    }

    #[test]
    fn test_all_timing_lines_are_patched() {
        let patched = patch_control_text(CONTROL, &times());
        let lines: Vec<&str> = patched.lines().collect();
        assert_eq!(lines[2], "     Start Time: 21:00");
        assert_eq!(lines[3], "     End Date: 25 May 2018");
        assert_eq!(lines[4], "     End Time: 21:00");
        assert_eq!(lines[5], "     Time Interval: 60");
    }

    #[test]
    fn test_other_lines_are_untouched_byte_for_byte() {
        let patched = patch_control_text(CONTROL, &times());
        assert!(patched.starts_with("Control: Control_1\n"));
        assert!(patched.contains("     Description: spring event\r\n"));
        assert!(patched.ends_with("End:\n\n"));
    }

    #[test]
    fn test_last_line_without_newline_gains_one_when_patched() {
        let patched = patch_control_text("     End Time: 00:00", &times());
        assert_eq!(patched, "     End Time: 21:00\n");
        assert_eq!(patch_control_text("End:", &times()), "End:");
    }

    #[test]
    fn test_value_is_cut_after_last_occurrence_of_key() {
        let patched = patch_control_text("Start Date: x Start Date: y\n", &times());
        assert_eq!(patched, "Start Date: x Start Date: 20 May 2018\n");
    }

    #[test]
    fn test_times_come_from_first_and_last_csv_rows() {
        let csv = RainCsv {
            locations: vec!["Awissawella".to_string(), "Colombo".to_string()],
            rows: vec![
                RainRow { time: ts("2018-05-20 21:00:00"), values: vec![] },
                RainRow { time: ts("2018-05-21 21:00:00"), values: vec![] },
                RainRow { time: ts("2018-05-25 21:00:00"), values: vec![] },
            ],
        };
        assert_eq!(ControlTimes::from_rain_csv(&csv, 60).unwrap(), times());
    }

    #[test]
    fn test_empty_csv_cannot_time_a_control_file() {
        let csv = RainCsv { locations: vec![], rows: vec![] };
        assert!(matches!(
            ControlTimes::from_rain_csv(&csv, 60),
            Err(PipelineError::ControlFile(_))
        ));
    }

    #[test]
    fn test_patch_control_file_rewrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Control_1.control");
        fs::write(&path, CONTROL).unwrap();

        patch_control_file(&path, &times()).unwrap();

        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, patch_control_text(CONTROL, &times()));
    }

    #[test]
    fn test_missing_control_file_is_an_error() {
        let result = patch_control_file(Path::new("/nonexistent/Control_1.control"), &times());
        assert!(matches!(result, Err(PipelineError::ControlFile(_))));
    }
}
