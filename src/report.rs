//! Report output: CSV and JSON renderings of a run's decisions

use crate::decision::{compute_status, AgreementValue, Decision, Significance, Status};
use std::collections::BTreeMap;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use thiserror::Error;

const SUFFIX: &str = "-Groundtruth";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Files written by [`write_report`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub csv: PathBuf,
    pub json: PathBuf,
}

/// Order for presentation: category, then significance (most critical first).
pub fn sort_decisions(decisions: &mut [Decision]) {
    decisions.sort_by(|a, b| {
        a.category
            .cmp(&b.category)
            .then(a.significance.cmp(&b.significance))
    });
}

pub fn csv_header(participants: &[String]) -> Vec<String> {
    let mut header: Vec<String> = ["Category", "Significance", "Status", "Title", "Description", "Decision"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend(participants.iter().map(|p| format!("{} Agreed", p)));
    header.extend(["Notes", "Meeting Date", "Meeting Reference"].iter().map(|s| s.to_string()));
    header
}

pub fn csv_row(decision: &Decision, participants: &[String]) -> Vec<String> {
    let mut row = vec![
        decision.category.clone(),
        decision.significance.to_string(),
        decision.status.label().to_string(),
        decision.title.clone(),
        decision.description.clone(),
        decision.decision_text.clone(),
    ];
    row.extend(participants.iter().map(|p| {
        decision
            .agreements
            .get(p)
            .map(|v| v.label().to_string())
            .unwrap_or_default()
    }));
    row.push(decision.notes.clone());
    row.push(decision.meeting_date.clone());
    row.push(decision.meeting_reference.clone());
    row
}

/// Quote a field when it holds a comma, quote or line break.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn csv_line(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn render_csv(decisions: &[Decision], participants: &[String]) -> String {
    let mut out = csv_line(&csv_header(participants));
    out.push('\n');
    for decision in decisions {
        out.push_str(&csv_line(&csv_row(decision, participants)));
        out.push('\n');
    }
    out
}

/// Split CSV text into records. Quoted fields may hold commas, doubled
/// quotes and line breaks. A trailing newline does not add a record.
pub fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if quoted {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => quoted = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' => quoted = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' | '\r' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

/// Header-only CSV for hand-filled reports.
pub fn csv_template(participants: &[String]) -> String {
    csv_line(&csv_header(participants))
}

/// Outcome of [`check_csv`]. Errors fail the report, warnings do not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvCheck {
    pub rows: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl CsvCheck {
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check a report CSV against the layout written by [`render_csv`].
///
/// Significance, status and agreement cells must be valid values. Unknown
/// categories, short rows and a status its agreements contradict are
/// warnings.
pub fn check_csv(text: &str, participants: &[String], categories: &[String]) -> CsvCheck {
    let mut check = CsvCheck::default();
    let mut records = parse_csv(text).into_iter();
    let expected = csv_header(participants);

    let Some(header) = records.next() else {
        check.errors.push("CSV file is empty".to_string());
        return check;
    };
    if header != expected {
        check.errors.push(format!(
            "Header mismatch. Expected {} columns, got {}",
            expected.len(),
            header.len()
        ));
        for (i, (want, got)) in expected.iter().zip(&header).enumerate() {
            if want != got {
                check
                    .errors
                    .push(format!("  Column {}: expected '{}', got '{}'", i + 1, want, got));
            }
        }
    }

    let first_agreement = 6;
    for (index, row) in records.enumerate() {
        let line = index + 2;
        check.rows += 1;
        if row.len() < expected.len() {
            check.warnings.push(format!(
                "Row {}: Missing columns ({}/{})",
                line,
                row.len(),
                expected.len()
            ));
            continue;
        }

        let (category, significance, status) = (&row[0], &row[1], &row[2]);
        if !categories.is_empty() && !categories.contains(category) {
            check.warnings.push(format!("Row {}: Unknown category '{}'", line, category));
        }
        let level_ok = significance
            .parse::<u8>()
            .ok()
            .and_then(Significance::new)
            .is_some();
        if !level_ok {
            check.errors.push(format!(
                "Row {}: Invalid significance '{}' (must be 1-5)",
                line, significance
            ));
        }
        let parsed_status = Status::from_label(status);
        if parsed_status.is_none() {
            check.errors.push(format!("Row {}: Invalid status '{}'", line, status));
        }

        let mut agreements = BTreeMap::new();
        for (offset, participant) in participants.iter().enumerate() {
            let cell = &row[first_agreement + offset];
            if cell.is_empty() {
                continue;
            }
            match AgreementValue::from_label(cell) {
                Some(value) => {
                    agreements.insert(participant.clone(), value);
                }
                None => check.errors.push(format!(
                    "Row {}: Invalid agreement '{}' for {}",
                    line, cell, participant
                )),
            }
        }

        if let (Some(stated), Some(derived)) = (parsed_status, compute_status(&agreements)) {
            if stated != derived {
                check.warnings.push(format!(
                    "Row {}: Status '{}' but agreements imply '{}'",
                    line, stated, derived
                ));
            }
        }
    }
    check
}

pub fn render_json(decisions: &[Decision]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(decisions)
}

/// Base name (no extension) for a report about `input`.
///
/// `<YYYY-MM-DD>-<name>-Groundtruth`, where name is `output_name` or the
/// input's stem. The date prefix is skipped when disabled or already there.
pub fn output_base_name(input: &Path, output_name: Option<&str>, date_prefix: bool, today: NaiveDate) -> String {
    let mut base = match output_name {
        Some(name) => name.to_string(),
        None => {
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "report".to_string());
            stem.strip_suffix(SUFFIX).map(str::to_string).unwrap_or(stem)
        }
    };
    if !base.ends_with(SUFFIX) {
        base.push_str(SUFFIX);
    }
    if date_prefix && !has_date_prefix(&base) {
        base = format!("{}-{}", today.format("%Y-%m-%d"), base);
    }
    base
}

fn has_date_prefix(name: &str) -> bool {
    name.get(..10)
        .map(|p| NaiveDate::parse_from_str(p, "%Y-%m-%d").is_ok())
        .unwrap_or(false)
}

/// Write `<base>.csv` and `<base>.json` into `dir`. Decisions are sorted first.
pub fn write_report(
    dir: &Path,
    base_name: &str,
    decisions: &[Decision],
    participants: &[String],
) -> Result<ReportPaths, ReportError> {
    let mut sorted = decisions.to_vec();
    sort_decisions(&mut sorted);

    let paths = ReportPaths {
        csv: dir.join(format!("{}.csv", base_name)),
        json: dir.join(format!("{}.json", base_name)),
    };
    std::fs::write(&paths.csv, render_csv(&sorted, participants))?;
    std::fs::write(&paths.json, render_json(&sorted)?)?;
    tracing::info!(csv = %paths.csv.display(), decisions = sorted.len(), "Wrote report");
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{AgreementValue, Significance, Status};

    fn decision(category: &str, level: u8, title: &str) -> Decision {
        Decision::new(category, Significance::new(level).unwrap(), Status::Agreed, title)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn sorts_by_category_then_significance() {
        let mut decisions = vec![
            decision("Security", 2, "b"),
            decision("Process", 3, "c"),
            decision("Security", 1, "a"),
        ];
        sort_decisions(&mut decisions);
        let titles: Vec<_> = decisions.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["c", "a", "b"]);
    }

    #[test]
    fn header_has_one_column_per_participant() {
        assert_eq!(
            csv_header(&names(&["Ryan", "Ajit"])).join(","),
            "Category,Significance,Status,Title,Description,Decision,Ryan Agreed,Ajit Agreed,Notes,Meeting Date,Meeting Reference"
        );
    }

    #[test]
    fn missing_agreement_is_an_empty_cell() {
        let mut d = decision("Process", 4, "Standups")
            .with_agreement("Ryan", AgreementValue::NotPresent);
        d.status = Status::NeedsClarification;
        let row = csv_row(&d, &names(&["Ryan", "Ajit"]));
        assert_eq!(row[1], "4");
        assert_eq!(row[2], "Needs Clarification");
        assert_eq!(row[6], "Not Present");
        assert_eq!(row[7], "");
    }

    #[test]
    fn fields_are_quoted_when_needed() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a, b"), "\"a, b\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn output_names() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let folder = Path::new("meetings/q2");
        assert_eq!(output_base_name(folder, None, true, today), "2025-06-01-q2-Groundtruth");
        assert_eq!(output_base_name(folder, None, false, today), "q2-Groundtruth");
        assert_eq!(
            output_base_name(folder, Some("2025-05-30-board"), true, today),
            "2025-05-30-board-Groundtruth"
        );
        assert_eq!(
            output_base_name(Path::new("x/team-Groundtruth.csv"), None, false, today),
            "team-Groundtruth"
        );
    }

    #[test]
    fn parses_quoted_fields_and_line_breaks() {
        let records = parse_csv("a,\"b, c\",\"say \"\"hi\"\"\"\r\n\"two\nlines\",,x\n");
        assert_eq!(
            records,
            vec![
                names(&["a", "b, c", "say \"hi\""]),
                names(&["two\nlines", "", "x"]),
            ]
        );
        assert!(parse_csv("").is_empty());
    }

    #[test]
    fn rendered_report_passes_its_own_check() {
        let people = names(&["Ryan", "Ajit"]);
        let decisions = vec![
            decision("Security", 2, "Rotate keys, quarterly")
                .with_agreement("Ryan", AgreementValue::Yes)
                .with_agreement("Ajit", AgreementValue::Yes),
            decision("Process", 5, "Keep \"standups\"\nshort"),
        ];
        let check = check_csv(&render_csv(&decisions, &people), &people, &names(&["Security", "Process"]));
        assert!(check.passed(), "{:?}", check.errors);
        assert!(check.warnings.is_empty(), "{:?}", check.warnings);
        assert_eq!(check.rows, 2);
    }

    #[test]
    fn check_flags_bad_cells() {
        let people = names(&["Ryan"]);
        let mut text = csv_template(&people);
        text.push_str("\nSecurity,7,Agreed,t,d,x,Yes,,,\n");
        text.push_str("Security,1,Done,t,d,x,Maybe,,,\n");
        text.push_str("Gardening,2,Agreed,t,d,x,No,,,\n");
        text.push_str("Security,2\n");

        let check = check_csv(&text, &people, &names(&["Security"]));

        assert!(!check.passed());
        assert_eq!(
            check.errors,
            vec![
                "Row 2: Invalid significance '7' (must be 1-5)",
                "Row 3: Invalid status 'Done'",
                "Row 3: Invalid agreement 'Maybe' for Ryan",
            ]
        );
        assert_eq!(
            check.warnings,
            vec![
                "Row 4: Unknown category 'Gardening'",
                "Row 4: Status 'Agreed' but agreements imply 'Unresolved'",
                "Row 5: Missing columns (2/10)",
            ]
        );
    }

    #[test]
    fn check_reports_header_mismatch() {
        let check = check_csv("Category,Significance\n", &names(&["Ryan"]), &[]);
        assert_eq!(check.errors[0], "Header mismatch. Expected 10 columns, got 2");
        assert!(check_csv("", &[], &[]).errors[0].contains("empty"));
    }

    #[test]
    fn writes_csv_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let decisions = vec![decision("Security", 2, "later"), decision("Process", 1, "first")];

        let paths = write_report(dir.path(), "out", &decisions, &names(&["Ryan"])).unwrap();

        let csv = std::fs::read_to_string(&paths.csv).unwrap();
        assert_eq!(csv.lines().count(), 3);
        assert!(csv.lines().nth(1).unwrap().starts_with("Process,1,Agreed,first"));
        let json: Vec<Decision> =
            serde_json::from_str(&std::fs::read_to_string(&paths.json).unwrap()).unwrap();
        assert_eq!(json[0].title, "first");
    }
}
