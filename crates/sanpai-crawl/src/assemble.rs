//! Projection of extracted records onto the fixed ledger columns.

use std::fmt::Write as _;
use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use sanpai_core::{ExtractedRecord, ReportField, Scalar};

use crate::error::CrawlError;
use crate::session::HistoryEntry;

const SHEET_NAME: &str = "実績データ";

/// A flat table whose columns are a canonical-order subset of
/// [`ReportField::ALL`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerTable {
    columns: Vec<ReportField>,
    rows: Vec<Vec<Scalar>>,
}

impl LedgerTable {
    /// One row per record. Only fields present in at least one record
    /// become columns; a record lacking a kept field gets `Null` there.
    #[must_use]
    pub fn from_records(records: &[ExtractedRecord]) -> Self {
        let columns: Vec<ReportField> = ReportField::ALL
            .into_iter()
            .filter(|field| records.iter().any(|r| r.contains(*field)))
            .collect();
        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|field| record.get(*field).cloned().unwrap_or(Scalar::Null))
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    /// Concatenates tables, aligning on field. The result has the union of
    /// the input columns; cells a table did not carry are `Null`.
    #[must_use]
    pub fn stack(tables: &[LedgerTable]) -> Self {
        let columns: Vec<ReportField> = ReportField::ALL
            .into_iter()
            .filter(|field| tables.iter().any(|t| t.columns.contains(field)))
            .collect();

        let mut rows = Vec::new();
        for table in tables {
            let positions: Vec<Option<usize>> = columns
                .iter()
                .map(|field| table.columns.iter().position(|c| c == field))
                .collect();
            rows.extend(table.rows.iter().map(|row| {
                positions
                    .iter()
                    .map(|pos| pos.map_or(Scalar::Null, |i| row[i].clone()))
                    .collect::<Vec<_>>()
            }));
        }
        Self { columns, rows }
    }

    /// One table per history entry, stacked in history order.
    #[must_use]
    pub fn from_history(history: &[HistoryEntry]) -> Self {
        let tables: Vec<LedgerTable> = history
            .iter()
            .map(|entry| Self::from_records(&entry.records))
            .collect();
        Self::stack(&tables)
    }

    #[must_use]
    pub fn columns(&self) -> &[ReportField] {
        &self.columns
    }

    #[must_use]
    pub fn labels(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.label()).collect()
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Scalar>] {
        &self.rows
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Writes the table as a single worksheet: labels in row 0, no index
    /// column. Numbers stay numeric; `Null` cells are left blank.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Xlsx`] if the workbook cannot be built or saved.
    pub fn write_xlsx(&self, path: &Path) -> Result<(), CrawlError> {
        self.build_workbook()
            .and_then(|mut workbook| workbook.save(path))
            .map_err(|source| CrawlError::Xlsx {
                path: path.display().to_string(),
                source,
            })?;
        tracing::info!(path = %path.display(), rows = self.rows.len(), "wrote ledger");
        Ok(())
    }

    fn build_workbook(&self) -> Result<Workbook, XlsxError> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME)?;

        let bold = Format::new().set_bold();
        for (c, field) in self.columns.iter().enumerate() {
            sheet.write_string_with_format(0, col_index(c)?, field.label(), &bold)?;
        }
        for (r, row) in self.rows.iter().enumerate() {
            let r = u32::try_from(r + 1).map_err(|_| XlsxError::RowColumnLimitError)?;
            for (c, cell) in row.iter().enumerate() {
                let c = col_index(c)?;
                match cell {
                    Scalar::Number(n) => {
                        sheet.write_number(r, c, *n)?;
                    }
                    Scalar::Text(s) => {
                        sheet.write_string(r, c, s)?;
                    }
                    Scalar::Null => {}
                }
            }
        }
        Ok(workbook)
    }

    /// Tab-separated preview of the header and the first `max_rows` rows.
    #[must_use]
    pub fn render_preview(&self, max_rows: usize) -> String {
        let mut out = self.labels().join("\t");
        out.push('\n');
        for row in self.rows.iter().take(max_rows) {
            let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
            out.push_str(&cells.join("\t"));
            out.push('\n');
        }
        if self.rows.len() > max_rows {
            let _ = writeln!(out, "… (他 {} 行)", self.rows.len() - max_rows);
        }
        out
    }
}

fn col_index(c: usize) -> Result<u16, XlsxError> {
    u16::try_from(c).map_err(|_| XlsxError::RowColumnLimitError)
}
