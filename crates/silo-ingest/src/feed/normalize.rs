use chrono::{DateTime, Utc};
use encoding_rs::Encoding;
use object_store::{path::Path, ObjectStore};
use tracing::{debug, trace};

use super::lister::ObjectCandidate;
use crate::config::SourceEnv;
use crate::error::IngestError;
use crate::table::{Column, ColumnType, Table};

/// Feed files are pipe-delimited.
const DELIMITER: u8 = b'|';

/// Character encodings to try, in order, when decoding a feed file.
///
/// The upstream extracts are labelled ISO-8859-1 with the occasional
/// cp1252 stray; per the WHATWG encoding standard both labels resolve to
/// windows-1252 here, which accepts every byte, so in practice the fallback
/// is a safety net for non-default configurations.
#[derive(Clone, Copy, Debug)]
pub struct Encodings {
    pub primary: &'static Encoding,
    pub fallback: &'static Encoding,
}

impl Default for Encodings {
    fn default() -> Self {
        Self {
            primary: Encoding::for_label(b"iso-8859-1").expect("known encoding label"),
            fallback: Encoding::for_label(b"windows-1252").expect("known encoding label"),
        }
    }
}

/// Decode raw bytes with the primary encoding, falling back to the secondary
/// on error. If both report errors the candidate fails with a decode error
/// and is skipped for this run.
pub fn decode(bytes: &[u8], encodings: Encodings, key: &str) -> Result<String, IngestError> {
    let (text, had_errors) = encodings.primary.decode_without_bom_handling(bytes);
    if !had_errors {
        return Ok(text.into_owned());
    }
    trace!("{key}: {} decode reported errors, trying {}", encodings.primary.name(), encodings.fallback.name());

    let (text, had_errors) = encodings.fallback.decode_without_bom_handling(bytes);
    if !had_errors {
        return Ok(text.into_owned());
    }

    Err(IngestError::Decode {
        key: key.to_string(),
        primary: encodings.primary.name(),
        fallback: encodings.fallback.name(),
    })
}

/// Parse decoded text as a pipe-delimited table with a header row. Empty
/// cells become nulls.
pub fn parse_delimited(text: &str) -> Result<Table, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .from_reader(text.as_bytes());

    let columns = reader
        .headers()
        .map_err(|err| IngestError::Schema(format!("header row: {err}")))?
        .iter()
        .map(|name| Column {
            name: name.to_string(),
            ty: ColumnType::Text,
        })
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| IngestError::Schema(format!("data row: {err}")))?;
        rows.push(
            record
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        None
                    } else {
                        Some(cell.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(Table { columns, rows })
}

/// Download one selected candidate and turn it into a loadable table:
/// fetch the body, decode, parse, clean the header, drop blank rows, infer
/// column types, then stamp the provenance columns.
pub async fn fetch_table(
    store: &dyn ObjectStore,
    candidate: &ObjectCandidate,
    env: SourceEnv,
    encodings: Encodings,
    rep_date: DateTime<Utc>,
) -> Result<Table, IngestError> {
    let body = store
        .get(&Path::from(candidate.key.as_str()))
        .await?
        .bytes()
        .await?;
    debug!("downloaded {} ({} bytes)", candidate.key, body.len());

    let text = decode(&body, encodings, &candidate.key)?;
    let mut table = parse_delimited(&text)?;

    table.sanitize_columns();
    table.drop_null_rows();
    table.infer_types();
    table.attach_provenance(env, &candidate.logical_name, &candidate.file_date_raw, rep_date);

    Ok(table)
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{UTF_8, WINDOWS_1252};

    #[test]
    fn clean_primary_decode() {
        let text = decode(b"Osid|Rating\n1|99\n", Encodings::default(), "k").unwrap();
        assert!(text.starts_with("Osid|Rating"));
    }

    #[test]
    fn latin1_bytes_decode_without_fallback() {
        // 0xE9 = é in both iso-8859-1 and cp1252
        let text = decode(b"caf\xe9", Encodings::default(), "k").unwrap();
        assert_eq!(text, "café");
    }

    #[test]
    fn fallback_engages_when_primary_fails() {
        // invalid utf-8, valid cp1252 (0x92 = right single quote)
        let enc = Encodings {
            primary: UTF_8,
            fallback: WINDOWS_1252,
        };
        let text = decode(b"it\x92s", enc, "k").unwrap();
        assert_eq!(text, "it\u{2019}s");
    }

    #[test]
    fn decode_error_when_both_fail() {
        let enc = Encodings {
            primary: UTF_8,
            fallback: UTF_8,
        };
        let err = decode(b"\xff\xfe\xfd", enc, "some/key").unwrap_err();
        assert!(matches!(err, IngestError::Decode { .. }));
        assert!(err.to_string().contains("some/key"));
    }

    #[test]
    fn pipe_delimited_parse() {
        let table = parse_delimited("Osid|RS Rating|% Chg\n123|98|\n456||1.5\n").unwrap();
        assert_eq!(table.columns.len(), 3);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0][0].as_deref(), Some("123"));
        assert_eq!(table.rows[0][2], None);
        assert_eq!(table.rows[1][1], None);
    }

    #[test]
    fn ragged_row_is_a_schema_error() {
        let err = parse_delimited("a|b\n1|2|3\n").unwrap_err();
        assert!(matches!(err, IngestError::Schema(_)));
    }
}
