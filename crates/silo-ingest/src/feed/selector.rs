use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

use super::lister::ObjectCandidate;

/// Files extracted before go-live carry a different layout; nothing earlier
/// is ever ingested.
pub fn go_live() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 23).expect("valid go-live date")
}

/// Reduce the candidate table to the files worth ingesting.
///
/// 1. keep only active logical names;
/// 2. drop anything dated before `cutoff`;
/// 3. keep the latest file per (logical name, calendar day) — multiple
///    intraday snapshots exist, and the last one is the most consistent
///    with the lower-frequency feeds;
/// 4. drop files dated `today`, which may still be partial.
///
/// Candidates without a parsed timestamp never survive. Idempotent; at most
/// one candidate per (logical name, day).
pub fn select(
    candidates: Vec<ObjectCandidate>,
    active: &HashSet<String>,
    cutoff: NaiveDate,
    today: NaiveDate,
) -> Vec<ObjectCandidate> {
    let mut latest: HashMap<(String, NaiveDate), ObjectCandidate> = HashMap::new();

    for candidate in candidates {
        let Some(file_date) = candidate.file_date else {
            continue;
        };
        if !active.contains(&candidate.logical_name) {
            continue;
        }
        let day = file_date.date();
        if day < cutoff || day == today {
            continue;
        }

        let slot = (candidate.logical_name.clone(), day);
        match latest.get(&slot) {
            Some(held) if held.file_date >= candidate.file_date => {}
            _ => {
                latest.insert(slot, candidate);
            }
        }
    }

    let mut selected: Vec<ObjectCandidate> = latest.into_values().collect();
    selected.sort_by(|a, b| a.key.cmp(&b.key));
    selected
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////
