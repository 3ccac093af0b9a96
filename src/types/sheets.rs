use crate::config::SheetConfig;
use crate::types::record::FormRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Spreadsheet coordinates rows are appended to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTarget {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub column_range: String,
}

impl DeliveryTarget {
    /// A1 notation for the append call, e.g. `Lista!A:F`.
    pub fn range(&self) -> String {
        format!("{}!{}", self.sheet_name, self.column_range)
    }
}

impl From<&SheetConfig> for DeliveryTarget {
    fn from(cfg: &SheetConfig) -> Self {
        Self {
            spreadsheet_id: cfg.spreadsheet_id.clone(),
            sheet_name: cfg.sheet_name.clone(),
            column_range: cfg.column_range.clone(),
        }
    }
}

/// Request body of `spreadsheets.values.append`.
#[derive(Debug, Serialize)]
pub struct ValueRange<'a> {
    pub values: Vec<[&'a str; 6]>,
}

impl<'a> ValueRange<'a> {
    pub fn single(record: &'a FormRecord) -> Self {
        Self {
            values: vec![record.as_row()],
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendValuesResponse {
    pub spreadsheet_id: Option<String>,
    pub table_range: Option<String>,
    pub updates: Option<UpdateValuesResponse>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateValuesResponse {
    pub updated_range: Option<String>,
    pub updated_rows: Option<u32>,
    pub updated_cells: Option<u32>,
}

impl AppendValuesResponse {
    pub fn row_locator(&self) -> RowLocator {
        self.updates
            .as_ref()
            .and_then(|u| u.updated_range.as_deref())
            .map(RowLocator::from_updated_range)
            .unwrap_or(RowLocator::Unknown)
    }
}

/// Row number of a freshly appended record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLocator {
    Row(u32),
    Unknown,
}

impl RowLocator {
    /// Parse the trailing row number of a range such as `Lista!A12:F12`.
    pub fn from_updated_range(range: &str) -> Self {
        let range = range.trim_end();
        let digits_start = range
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_ascii_digit())
            .last()
            .map(|(i, _)| i);
        digits_start
            .and_then(|i| range[i..].parse().ok())
            .map(RowLocator::Row)
            .unwrap_or(RowLocator::Unknown)
    }
}

impl fmt::Display for RowLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowLocator::Row(n) => write!(f, "{n}"),
            RowLocator::Unknown => f.write_str("unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trailing_row_number() {
        assert_eq!(
            RowLocator::from_updated_range("Lista!A12:F12"),
            RowLocator::Row(12)
        );
        assert_eq!(
            RowLocator::from_updated_range("'Hoja 1'!A3:F7"),
            RowLocator::Row(7)
        );
    }

    #[test]
    fn unparsable_range_is_unknown() {
        assert_eq!(RowLocator::from_updated_range("Lista!A:F"), RowLocator::Unknown);
        assert_eq!(RowLocator::from_updated_range(""), RowLocator::Unknown);
        assert_eq!(AppendValuesResponse::default().row_locator(), RowLocator::Unknown);
    }

    #[test]
    fn append_response_is_read_from_camel_case() {
        let resp: AppendValuesResponse = serde_json::from_str(
            r#"{"spreadsheetId":"s","tableRange":"Lista!A1:F4",
                "updates":{"updatedRange":"Lista!A5:F5","updatedRows":1,"updatedCells":6}}"#,
        )
        .unwrap();
        assert_eq!(resp.row_locator(), RowLocator::Row(5));
    }

    #[test]
    fn range_uses_sheet_and_columns() {
        let target = DeliveryTarget::from(&SheetConfig::default());
        assert_eq!(target.range(), "Lista!A:F");
    }
}
