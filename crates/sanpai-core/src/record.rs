//! The record shape shared by every extraction path.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical ledger fields. Declaration order is export column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReportField {
    FileName,
    Municipality,
    SubmissionDate,
    FiscalYear,
    DocumentType,
    BusinessType,
    /// Business operator / site name.
    OperatorName,
    Address,
    WasteCategory,
    /// ⑩ total quantity consigned for disposal, in tonnes.
    TotalConsigned,
    /// ⑪ consigned to certified ("優良認定") operators.
    CertifiedOperator,
    /// ⑫ consigned to recycling operators.
    Recycling,
    /// ⑬ consigned to certified heat-recovery operators.
    HeatRecoveryCertified,
    /// ⑭ consigned to other heat-recovery operators.
    HeatRecoveryOther,
    Remarks,
}

impl ReportField {
    pub const ALL: [ReportField; 15] = [
        ReportField::FileName,
        ReportField::Municipality,
        ReportField::SubmissionDate,
        ReportField::FiscalYear,
        ReportField::DocumentType,
        ReportField::BusinessType,
        ReportField::OperatorName,
        ReportField::Address,
        ReportField::WasteCategory,
        ReportField::TotalConsigned,
        ReportField::CertifiedOperator,
        ReportField::Recycling,
        ReportField::HeatRecoveryCertified,
        ReportField::HeatRecoveryOther,
        ReportField::Remarks,
    ];

    /// Key used in extraction responses and in the session file.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            ReportField::FileName => "ファイル名",
            ReportField::Municipality => "自治体名",
            ReportField::SubmissionDate => "提出日",
            ReportField::FiscalYear => "対象年度",
            ReportField::DocumentType => "文書種類",
            ReportField::BusinessType => "業種",
            ReportField::OperatorName => "排出事業者名",
            ReportField::Address => "住所",
            ReportField::WasteCategory => "廃棄物の種類",
            ReportField::TotalConsigned => "⑩全処理委託量_ton",
            ReportField::CertifiedOperator => "⑪優良認定処理業者への処理委託量_ton",
            ReportField::Recycling => "⑫再生利用業者への処理委託量_ton",
            ReportField::HeatRecoveryCertified => "⑬熱回収認定業者への処理委託量_ton",
            ReportField::HeatRecoveryOther => {
                "⑭熱回収認定業者以外の熱回収を行う業者への処理委託量_ton"
            }
            ReportField::Remarks => "備考",
        }
    }

    /// Column header used in exported tables.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            ReportField::DocumentType => "種類",
            ReportField::TotalConsigned => "⑩全処理委託量(t)",
            ReportField::CertifiedOperator => "⑪優良認定(t)",
            ReportField::Recycling => "⑫再生利用(t)",
            ReportField::HeatRecoveryCertified => "⑬熱回収認定(t)",
            ReportField::HeatRecoveryOther => "⑭熱回収その他(t)",
            other => other.key(),
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
    Null,
}

impl Scalar {
    /// Converts a JSON value into a scalar. Arrays and objects have no scalar
    /// form and yield `None`.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Scalar::Null),
            Value::Bool(b) => Some(Scalar::Text(b.to_string())),
            Value::Number(n) => n.as_f64().map(Scalar::Number),
            Value::String(s) => Some(Scalar::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) => write!(f, "{n}"),
            Scalar::Text(s) => f.write_str(s),
            Scalar::Null => Ok(()),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

/// One row of waste-report data, keyed by [`ReportField`].
///
/// A field stored as [`Scalar::Null`] still counts as present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, Scalar>",
    into = "BTreeMap<String, Scalar>"
)]
pub struct ExtractedRecord {
    fields: BTreeMap<ReportField, Scalar>,
}

impl ExtractedRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a record from a JSON object, keeping only known keys with
    /// scalar values.
    #[must_use]
    pub fn from_json_object(object: &serde_json::Map<String, Value>) -> Self {
        let fields = object
            .iter()
            .filter_map(|(key, value)| {
                let field = ReportField::from_key(key)?;
                let scalar = Scalar::from_json(value)?;
                Some((field, scalar))
            })
            .collect();
        Self { fields }
    }

    #[must_use]
    pub fn with(mut self, field: ReportField, value: impl Into<Scalar>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: ReportField, value: impl Into<Scalar>) {
        self.fields.insert(field, value.into());
    }

    /// Sets `field` only when it is missing or `Null`.
    pub fn set_if_missing(&mut self, field: ReportField, value: impl Into<Scalar>) {
        match self.fields.get(&field) {
            Some(existing) if !existing.is_null() => {}
            _ => {
                self.fields.insert(field, value.into());
            }
        }
    }

    #[must_use]
    pub fn get(&self, field: ReportField) -> Option<&Scalar> {
        self.fields.get(&field)
    }

    #[must_use]
    pub fn contains(&self, field: ReportField) -> bool {
        self.fields.contains_key(&field)
    }

    /// The source filename, when stamped.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.get(ReportField::FileName).and_then(Scalar::as_text)
    }

    pub fn fields(&self) -> impl Iterator<Item = (ReportField, &Scalar)> {
        self.fields.iter().map(|(field, value)| (*field, value))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<BTreeMap<String, Scalar>> for ExtractedRecord {
    fn from(raw: BTreeMap<String, Scalar>) -> Self {
        let fields = raw
            .into_iter()
            .filter_map(|(key, value)| ReportField::from_key(&key).map(|field| (field, value)))
            .collect();
        Self { fields }
    }
}

impl From<ExtractedRecord> for BTreeMap<String, Scalar> {
    fn from(record: ExtractedRecord) -> Self {
        record
            .fields
            .into_iter()
            .map(|(field, value)| (field.key().to_string(), value))
            .collect()
    }
}
