//! Normalization of raw search entries into [`ParsedRecord`]s.
//!
//! Parsing never drops an entry. Fields that are present but do not have the
//! expected shape are left empty and reported in
//! [`ParsedEntry::malformed_fields`] so the caller can log them.

use serde::Serialize;
use serde_json::Value;

/// A normalized search result, ready for a sink.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedRecord {
    /// `prism:doi`; the literal `"None"` and empty strings count as absent.
    pub doi: Option<String>,
    /// `dc:title`.
    pub title: Option<String>,
    /// `dc:description`.
    pub abstract_text: Option<String>,
    /// `author[].authid`, in order.
    pub authors: Vec<String>,
    /// `prism:coverDate` as delivered (`YYYY-MM-DD`).
    pub cover_date: Option<String>,
    /// First four characters of the cover date.
    pub year: Option<String>,
    /// Characters 5..7 of the cover date.
    pub month: Option<String>,
    /// `prism:publicationName`.
    pub journal: Option<String>,
    /// `prism:aggregationType`, e.g. `Journal`.
    pub aggregation_type: Option<String>,
    /// `affiliation[0].affiliation-country`.
    pub country: Option<String>,
    /// `citedby-count` as delivered (Scopus sends it as a string).
    pub cited_by: Option<String>,
    /// `authkeywords` split on `|`, trimmed, empties removed.
    pub keywords: Vec<String>,
}

/// Identity of a record for de-duplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKey {
    /// Records with a DOI are identified by it.
    Doi(String),
    /// Records without a DOI fall back to the title.
    Title(String),
}

impl ParsedRecord {
    /// The de-duplication key, or `None` when the record has neither DOI nor title.
    #[must_use]
    pub fn key(&self) -> Option<RecordKey> {
        if let Some(doi) = &self.doi {
            return Some(RecordKey::Doi(doi.clone()));
        }
        self.title.clone().map(RecordKey::Title)
    }
}

/// A parsed record plus the names of fields that could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    /// The record, with unreadable fields left empty.
    pub record: ParsedRecord,
    /// Raw field names that were present but malformed.
    pub malformed_fields: Vec<&'static str>,
}

impl ParsedEntry {
    /// Whether every present field parsed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.malformed_fields.is_empty()
    }
}

struct FieldReader<'a> {
    entry: &'a Value,
    malformed: Vec<&'static str>,
}

impl<'a> FieldReader<'a> {
    fn string(&mut self, field: &'static str) -> Option<String> {
        match self.entry.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.malformed.push(field);
                None
            }
        }
    }

    fn array(&mut self, field: &'static str) -> Option<&'a Vec<Value>> {
        match self.entry.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => Some(items),
            Some(_) => {
                self.malformed.push(field);
                None
            }
        }
    }

    fn authors(&mut self) -> Vec<String> {
        let Some(items) = self.array("author") else {
            return Vec::new();
        };
        let ids: Vec<String> = items
            .iter()
            .filter_map(|author| author.get("authid").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        if ids.len() < items.len() {
            self.malformed.push("author");
        }
        ids
    }

    fn country(&mut self) -> Option<String> {
        let first = self.array("affiliation")?.first()?;
        match first.get("affiliation-country") {
            None | Some(Value::Null) => None,
            Some(Value::String(country)) => Some(country.clone()),
            Some(_) => {
                self.malformed.push("affiliation");
                None
            }
        }
    }

    fn cited_by(&mut self) -> Option<String> {
        match self.entry.get("citedby-count") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(_) => {
                self.malformed.push("citedby-count");
                None
            }
        }
    }

    fn cover_date(&mut self) -> (Option<String>, Option<String>, Option<String>) {
        let Some(date) = self.string("prism:coverDate") else {
            return (None, None, None);
        };
        let year = date.get(0..4).map(str::to_string);
        let month = date.get(5..7).map(str::to_string);
        if year.is_none() || month.is_none() {
            self.malformed.push("prism:coverDate");
        }
        (Some(date), year, month)
    }
}

/// Normalizes one raw search entry.
#[must_use]
pub fn parse_entry(entry: &Value) -> ParsedEntry {
    let mut reader = FieldReader {
        entry,
        malformed: Vec::new(),
    };

    let doi = reader
        .string("prism:doi")
        .filter(|doi| !doi.trim().is_empty() && doi != "None");
    let title = reader.string("dc:title");
    let abstract_text = reader.string("dc:description");
    let authors = reader.authors();
    let (cover_date, year, month) = reader.cover_date();
    let journal = reader.string("prism:publicationName");
    let aggregation_type = reader.string("prism:aggregationType");
    let country = reader.country();
    let cited_by = reader.cited_by();
    let keywords = reader
        .string("authkeywords")
        .map(|raw| split_keywords(&raw))
        .unwrap_or_default();

    ParsedEntry {
        record: ParsedRecord {
            doi,
            title,
            abstract_text,
            authors,
            cover_date,
            year,
            month,
            journal,
            aggregation_type,
            country,
            cited_by,
            keywords,
        },
        malformed_fields: reader.malformed,
    }
}

fn split_keywords(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|keyword| !keyword.is_empty())
        .map(str::to_string)
        .collect()
}
