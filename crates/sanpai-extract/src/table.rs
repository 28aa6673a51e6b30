//! Heuristic locator for waste-category tables in spreadsheets.
//!
//! Each worksheet is read as an untyped grid of text cells. The first row
//! containing [`HEADER_MARKER`] anchors the table; its cells are matched
//! against [`COLUMN_RULES`] to find the category and amount columns, and every
//! row below it with a numeric amount becomes one record.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use sanpai_core::{ExtractedRecord, ReportField};

use crate::error::ExtractError;

/// Text identifying the header row ("type of waste"). Also matches
/// "産業廃棄物の種類".
pub const HEADER_MARKER: &str = "廃棄物の種類";

/// Category text of summary rows.
pub const TOTAL_ROW_LABEL: &str = "合計";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnRole {
    Category,
    /// `strict` roles win over loose ones regardless of column position.
    Amount { strict: bool },
}

/// Header-cell markers in evaluation order. A cell takes the role of the
/// first rule it matches.
const COLUMN_RULES: [(&str, ColumnRole); 3] = [
    ("種類", ColumnRole::Category),
    ("全処理委託量", ColumnRole::Amount { strict: true }),
    ("委託量", ColumnRole::Amount { strict: false }),
];

/// One worksheet as a grid of cell text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worksheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

/// Reads every worksheet of an `.xlsx`/`.xls` file.
///
/// Sheets that fail to load are logged and skipped.
///
/// # Errors
///
/// Returns [`ExtractError::Workbook`] if the file cannot be opened as a workbook.
pub fn read_workbook(path: &Path) -> Result<Vec<Worksheet>, ExtractError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| ExtractError::Workbook {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        match workbook.worksheet_range(&name) {
            Ok(range) => {
                let rows = range
                    .rows()
                    .map(|row| row.iter().map(cell_text).collect())
                    .collect();
                sheets.push(Worksheet { name, rows });
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), sheet = %name, error = %e, "skipping unreadable worksheet");
            }
        }
    }
    Ok(sheets)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        other => other.to_string(),
    }
}

/// Runs the locator over every worksheet of the file at `path`.
///
/// # Errors
///
/// Returns [`ExtractError::Workbook`] if the file cannot be opened.
pub fn locate_tables(path: &Path) -> Result<Vec<ExtractedRecord>, ExtractError> {
    let sheets = read_workbook(path)?;
    Ok(locate_in_sheets(&sheets))
}

/// Concatenates the records located in each sheet, in sheet order.
#[must_use]
pub fn locate_in_sheets(sheets: &[Worksheet]) -> Vec<ExtractedRecord> {
    sheets
        .iter()
        .flat_map(|sheet| locate_in_grid(&sheet.name, &sheet.rows))
        .collect()
}

/// Locates the waste-category table in one grid.
///
/// Yields nothing when the grid has no header row, or the header row lacks a
/// category or amount column.
#[must_use]
pub fn locate_in_grid(sheet_name: &str, grid: &[Vec<String>]) -> Vec<ExtractedRecord> {
    let Some(header_index) = grid
        .iter()
        .position(|row| row.iter().any(|cell| cell.contains(HEADER_MARKER)))
    else {
        return Vec::new();
    };

    let Some((category_col, amount_col)) = classify_header(&grid[header_index]) else {
        tracing::debug!(sheet = sheet_name, row = header_index, "header row lacks category or amount column");
        return Vec::new();
    };

    let remark = format!("シート「{sheet_name}」から自動抽出");

    grid[header_index + 1..]
        .iter()
        .filter_map(|row| {
            let category = row.get(category_col)?.trim();
            let amount = row.get(amount_col)?.trim();
            if category.is_empty() || amount.is_empty() || category == TOTAL_ROW_LABEL {
                return None;
            }
            let amount = parse_amount(amount)?;
            Some(
                ExtractedRecord::new()
                    .with(ReportField::WasteCategory, category)
                    .with(ReportField::TotalConsigned, amount)
                    .with(ReportField::Remarks, remark.as_str()),
            )
        })
        .collect()
}

/// Returns `(category_column, amount_column)` for a header row.
fn classify_header(header: &[String]) -> Option<(usize, usize)> {
    let mut category = None;
    let mut strict_amount = None;
    let mut loose_amount = None;

    for (index, cell) in header.iter().enumerate() {
        let Some(role) = COLUMN_RULES
            .iter()
            .find(|(marker, _)| cell.contains(marker))
            .map(|(_, role)| *role)
        else {
            continue;
        };
        let slot = match role {
            ColumnRole::Category => &mut category,
            ColumnRole::Amount { strict: true } => &mut strict_amount,
            ColumnRole::Amount { strict: false } => &mut loose_amount,
        };
        if slot.is_none() {
            *slot = Some(index);
        }
    }

    Some((category?, strict_amount.or(loose_amount)?))
}

/// Parses an amount cell, ignoring thousands separators.
fn parse_amount(raw: &str) -> Option<f64> {
    raw.replace(',', "")
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Renders sheets as plain text for the remote fallback, truncated to
/// `max_chars` characters.
#[must_use]
pub fn render_sheets_text(sheets: &[Worksheet], max_chars: usize) -> String {
    let mut out = String::new();
    for sheet in sheets {
        out.push_str("### シート: ");
        out.push_str(&sheet.name);
        out.push('\n');
        for row in &sheet.rows {
            let used = row
                .iter()
                .rposition(|cell| !cell.trim().is_empty())
                .map_or(0, |last| last + 1);
            if used == 0 {
                continue;
            }
            out.push_str(&row[..used].join("\t"));
            out.push('\n');
        }
        out.push('\n');
    }

    if out.chars().count() > max_chars {
        let mut truncated: String = out.chars().take(max_chars).collect();
        truncated.push_str("\n…(以下省略)");
        return truncated;
    }
    out
}

#[cfg(test)]
mod tests {
    use sanpai_core::Scalar;

    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|c| (*c).to_string()).collect())
            .collect()
    }

    #[test]
    fn header_row_anchors_table_and_total_row_is_skipped() {
        let rows = grid(&[
            &["産業廃棄物処理計画実施状況報告書"],
            &[""],
            &["", "廃棄物の種類", "⑩全処理委託量"],
            &["", "がれき類", "100.5"],
            &["", "合計", "100.5"],
        ]);
        let records = locate_in_grid("別紙", &rows);
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].get(ReportField::WasteCategory),
            Some(&Scalar::Text("がれき類".into()))
        );
        assert_eq!(
            records[0].get(ReportField::TotalConsigned),
            Some(&Scalar::Number(100.5))
        );
        assert_eq!(
            records[0].get(ReportField::Remarks).and_then(Scalar::as_text),
            Some("シート「別紙」から自動抽出")
        );
        assert!(!records[0].contains(ReportField::FileName));
    }

    #[test]
    fn thousands_separators_are_stripped() {
        let rows = grid(&[
            &["廃棄物の種類", "全処理委託量(t)"],
            &["汚泥", "1,299.99"],
        ]);
        let records = locate_in_grid("Sheet1", &rows);
        assert_eq!(
            records[0].get(ReportField::TotalConsigned),
            Some(&Scalar::Number(1299.99))
        );
    }

    #[test]
    fn non_numeric_empty_and_blank_category_rows_are_skipped() {
        let rows = grid(&[
            &["産業廃棄物の種類", "⑩全処理委託量"],
            &["汚泥", "12"],
            &["※ 単位はトン", "注記"],
            &["廃油", ""],
            &["  ", "3"],
            &[" 合計 ", "15"],
            &["廃プラスチック類", " 3 "],
            &["金属くず"],
        ]);
        let records = locate_in_grid("Sheet1", &rows);
        let categories: Vec<&str> = records
            .iter()
            .filter_map(|r| r.get(ReportField::WasteCategory).and_then(Scalar::as_text))
            .collect();
        assert_eq!(categories, vec!["汚泥", "廃プラスチック類"]);
    }

    #[test]
    fn strict_amount_column_beats_earlier_loose_match() {
        let rows = grid(&[
            &["廃棄物の種類", "⑪優良認定処理業者への処理委託量", "⑩全処理委託量"],
            &["がれき類", "1", "7"],
        ]);
        let records = locate_in_grid("s", &rows);
        assert_eq!(
            records[0].get(ReportField::TotalConsigned),
            Some(&Scalar::Number(7.0))
        );
    }

    #[test]
    fn loose_amount_column_used_when_no_strict_match() {
        let rows = grid(&[
            &["廃棄物の種類", "備考", "処理委託量"],
            &["がれき類", "", "4"],
        ]);
        let records = locate_in_grid("s", &rows);
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].get(ReportField::TotalConsigned),
            Some(&Scalar::Number(4.0))
        );
    }

    #[test]
    fn first_header_row_wins_even_if_it_lacks_columns() {
        let rows = grid(&[
            &["廃棄物の種類について"],
            &["廃棄物の種類", "⑩全処理委託量"],
            &["がれき類", "5"],
        ]);
        assert!(locate_in_grid("s", &rows).is_empty());
    }

    #[test]
    fn grid_without_header_yields_nothing() {
        let rows = grid(&[&["品目", "数量"], &["がれき類", "5"]]);
        assert!(locate_in_grid("s", &rows).is_empty());
    }

    #[test]
    fn locating_twice_gives_identical_records() {
        let rows = grid(&[
            &["廃棄物の種類", "⑩全処理委託量"],
            &["がれき類", "5"],
            &["汚泥", "2,000"],
        ]);
        assert_eq!(locate_in_grid("s", &rows), locate_in_grid("s", &rows));
    }

    #[test]
    fn infinite_amounts_are_rejected() {
        assert_eq!(parse_amount("inf"), None);
        assert_eq!(parse_amount("NaN"), None);
        assert_eq!(parse_amount("1,000"), Some(1000.0));
    }

    #[test]
    fn render_skips_blank_rows_and_trailing_cells() {
        let sheets = vec![Worksheet {
            name: "Sheet1".into(),
            rows: grid(&[&["a", "b", ""], &["", ""], &["c", "", "d"]]),
        }];
        assert_eq!(
            render_sheets_text(&sheets, 1_000),
            "### シート: Sheet1\na\tb\nc\t\td\n\n"
        );
    }

    #[test]
    fn render_truncates_to_char_budget() {
        let sheets = vec![Worksheet {
            name: "表".into(),
            rows: grid(&[&["廃棄物の種類がれき類汚泥廃油"]]),
        }];
        let text = render_sheets_text(&sheets, 10);
        assert!(text.starts_with("### シート: 表"));
        assert!(text.ends_with("…(以下省略)"));
        assert_eq!(text.chars().count(), 10 + "\n…(以下省略)".chars().count());
    }
}
