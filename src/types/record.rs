use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Column names written as the first row of the backup and pending files.
pub const RECORD_HEADER: [&str; 6] = ["Timestamp", "Email", "Nombre", "Campo2", "Ganó", "Premio"];

/// Form keys mapped, in column order, onto a [`FormRecord`].
const FIELD_KEYS: [&str; 6] = [
    "timestamp",
    "email",
    "fields[0][value]",
    "fields[1][value]",
    "winning",
    "segment_text",
];

/// Decoded `application/x-www-form-urlencoded` webhook body.
///
/// Bracketed keys such as `fields[0][value]` are kept verbatim; a repeated key
/// keeps its last value.
#[derive(Debug, Default, Clone)]
pub struct FormPayload {
    pairs: HashMap<String, String>,
}

impl FormPayload {
    pub fn parse(body: &[u8]) -> Self {
        let pairs = url::form_urlencoded::parse(body)
            .filter(|(k, _)| !k.is_empty())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        Self { pairs }
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.get(key).map(String::as_str)
    }
}

/// One submission as a fixed six-column row. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormRecord {
    timestamp: String,
    email: String,
    field1: String,
    field2: String,
    outcome: String,
    prize_segment: String,
}

impl FormRecord {
    pub fn new(
        timestamp: impl Into<String>,
        email: impl Into<String>,
        field1: impl Into<String>,
        field2: impl Into<String>,
        outcome: impl Into<String>,
        prize_segment: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            email: email.into(),
            field1: field1.into(),
            field2: field2.into(),
            outcome: outcome.into(),
            prize_segment: prize_segment.into(),
        }
    }

    /// Map a webhook payload; any missing key becomes an empty cell.
    pub fn from_payload(payload: &FormPayload) -> Self {
        let [timestamp, email, field1, field2, outcome, prize_segment] =
            FIELD_KEYS.map(|key| payload.get(key).unwrap_or_default().to_string());
        Self {
            timestamp,
            email,
            field1,
            field2,
            outcome,
            prize_segment,
        }
    }

    /// Rebuild from a stored CSV row. Short rows are padded with empty cells.
    pub fn from_row(row: &csv::StringRecord) -> Self {
        let cell = |i: usize| row.get(i).unwrap_or_default().to_string();
        Self {
            timestamp: cell(0),
            email: cell(1),
            field1: cell(2),
            field2: cell(3),
            outcome: cell(4),
            prize_segment: cell(5),
        }
    }

    pub fn as_row(&self) -> [&str; 6] {
        [
            &self.timestamp,
            &self.email,
            &self.field1,
            &self.field2,
            &self.outcome,
            &self.prize_segment,
        ]
    }

    pub fn is_blank(&self) -> bool {
        self.as_row().iter().all(|cell| cell.is_empty())
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_bracketed_and_encoded_keys() {
        let body = b"timestamp=2024-05-01+10%3A00&email=ana%40example.com\
            &fields%5B0%5D%5Bvalue%5D=Ana&fields[1][value]=555-1234\
            &winning=1&segment_text=Descuento+10%25";
        let record = FormRecord::from_payload(&FormPayload::parse(body));

        assert_eq!(
            record.as_row(),
            [
                "2024-05-01 10:00",
                "ana@example.com",
                "Ana",
                "555-1234",
                "1",
                "Descuento 10%"
            ]
        );
    }

    #[test]
    fn missing_keys_default_to_empty() {
        let record = FormRecord::from_payload(&FormPayload::parse(b"email=a%40b.c"));
        assert_eq!(record.email(), "a@b.c");
        assert_eq!(record.timestamp(), "");
        assert!(!record.is_blank());
    }

    #[test]
    fn unrelated_keys_produce_blank_record() {
        let payload = FormPayload::parse(b"foo=bar");
        assert!(!payload.is_empty());
        assert!(FormRecord::from_payload(&payload).is_blank());
    }

    #[test]
    fn empty_body_is_empty_payload() {
        assert!(FormPayload::parse(b"").is_empty());
        assert!(FormPayload::parse(b"&&").is_empty());
    }

    #[test]
    fn short_csv_rows_are_padded() {
        let row = csv::StringRecord::from(vec!["t", "e"]);
        let record = FormRecord::from_row(&row);
        assert_eq!(record.as_row(), ["t", "e", "", "", "", ""]);
    }
}
