use chrono::NaiveDateTime;
use futures::StreamExt;
use object_store::{path::Path, ObjectStore};
use tracing::{debug, trace, warn};

use crate::error::IngestError;

/// Timestamp format embedded in feed file names, e.g.
/// `wonW_WONDB_HSFINST3MRSRATING_20250128210422.csv`.
const FILE_DATE_FORMAT: &str = "%Y%m%d%H%M%S";

/// One object key, parsed into its logical parts.
///
/// `logical_name` sits between the last `/` and the last `_` before the
/// extension; the raw timestamp is everything between that `_` and the
/// extension. Keys off the naming convention get `file_date: None` and are
/// carried along (never an error) so the selector can discard them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectCandidate {
    pub key: String,
    pub logical_name: String,
    pub file_date_raw: String,
    pub file_date: Option<NaiveDateTime>,
}

impl ObjectCandidate {
    pub fn from_key(key: &str) -> Self {
        let base = match key.rfind('/') {
            Some(idx) => &key[idx + 1..],
            None => key,
        };
        let stem = match base.rfind('.') {
            Some(idx) => &base[..idx],
            None => base,
        };

        let (logical_name, file_date_raw) = match stem.rfind('_') {
            Some(idx) => (&stem[..idx], &stem[idx + 1..]),
            None => (stem, ""),
        };

        let file_date = NaiveDateTime::parse_from_str(file_date_raw, FILE_DATE_FORMAT).ok();
        if file_date.is_none() {
            trace!("key {key} does not follow the naming convention");
        }

        Self {
            key: key.to_string(),
            logical_name: logical_name.to_string(),
            file_date_raw: file_date_raw.to_string(),
            file_date,
        }
    }
}

/// Enumerate every object under `prefix` and parse each key into a
/// candidate. Pagination is handled by the store's list stream; the result
/// is fully materialized. Each call re-enumerates from scratch.
pub async fn list_candidates(
    store: &dyn ObjectStore,
    prefix: &str,
) -> Result<Vec<ObjectCandidate>, IngestError> {
    let prefix = Path::from(prefix);
    let mut listing = store.list(Some(&prefix));

    let mut candidates = Vec::new();
    while let Some(meta) = listing.next().await {
        let meta = meta?;
        candidates.push(ObjectCandidate::from_key(meta.location.as_ref()));
    }

    let unparsed = candidates.iter().filter(|c| c.file_date.is_none()).count();
    if unparsed > 0 {
        warn!("{unparsed} of {} keys have no parseable file date", candidates.len());
    }
    debug!("listed {} objects under {prefix}", candidates.len());

    Ok(candidates)
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn well_formed_key() {
        let c = ObjectCandidate::from_key("prd/feeds/wonW_WONDB_EPSRANK_20250122090000.csv");
        assert_eq!(c.logical_name, "wonW_WONDB_EPSRANK");
        assert_eq!(c.file_date_raw, "20250122090000");
        assert_eq!(
            c.file_date,
            Some(
                NaiveDate::from_ymd_opt(2025, 1, 22)
                    .unwrap()
                    .and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap())
            )
        );
    }

    #[test]
    fn key_without_directory() {
        let c = ObjectCandidate::from_key("feed_20250123090000.csv");
        assert_eq!(c.logical_name, "feed");
        assert!(c.file_date.is_some());
    }

    #[test]
    fn malformed_timestamp_yields_none() {
        let c = ObjectCandidate::from_key("prd/feed_2025.csv");
        assert_eq!(c.logical_name, "feed");
        assert_eq!(c.file_date_raw, "2025");
        assert_eq!(c.file_date, None);
    }

    #[test]
    fn key_without_underscore() {
        let c = ObjectCandidate::from_key("prd/README.txt");
        assert_eq!(c.logical_name, "README");
        assert_eq!(c.file_date_raw, "");
        assert_eq!(c.file_date, None);
    }

    #[test]
    fn non_digit_timestamp_yields_none() {
        let c = ObjectCandidate::from_key("prd/feed_2025012309000x.csv");
        assert_eq!(c.file_date, None);
    }
}
