use std::fmt;

/// Terminal state of one unit of work (a feed candidate or a screen).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Status {
    /// Dropped by the selector (inactive, pre-cutoff, superseded intraday,
    /// same-day, or unparseable key).
    Discarded,
    /// Already in the warehouse for this (name, timestamp, environment).
    Existing,
    /// Loaded this run.
    Loaded { rows: usize },
    /// A stage failed; the next scheduled run is the retry mechanism.
    Failed { reason: String },
}

#[derive(Clone, Debug)]
pub struct Outcome {
    /// Object key or screen name.
    pub subject: String,
    pub status: Status,
}

/// What the batch did, per unit of work.
///
/// The run always completes and reports through this summary; the process
/// exit code alone does not distinguish "nothing ingested" from "everything
/// ingested", so callers inspect the counts and the first failure.
#[derive(Clone, Debug, Default)]
pub struct BatchSummary {
    pub outcomes: Vec<Outcome>,
}

impl BatchSummary {
    pub fn record(&mut self, subject: impl Into<String>, status: Status) {
        self.outcomes.push(Outcome {
            subject: subject.into(),
            status,
        });
    }

    pub fn loaded(&self) -> usize {
        self.count(|s| matches!(s, Status::Loaded { .. }))
    }

    pub fn loaded_rows(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| match o.status {
                Status::Loaded { rows } => Some(rows),
                _ => None,
            })
            .sum()
    }

    pub fn existing(&self) -> usize {
        self.count(|s| matches!(s, Status::Existing))
    }

    pub fn discarded(&self) -> usize {
        self.count(|s| matches!(s, Status::Discarded))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, Status::Failed { .. }))
    }

    /// First recorded failure, if any.
    pub fn first_failure(&self) -> Option<(&str, &str)> {
        self.outcomes.iter().find_map(|o| match &o.status {
            Status::Failed { reason } => Some((o.subject.as_str(), reason.as_str())),
            _ => None,
        })
    }

    fn count(&self, pred: impl Fn(&Status) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} loaded ({} rows), {} existing, {} discarded, {} failed",
            self.loaded(),
            self.loaded_rows(),
            self.existing(),
            self.discarded(),
            self.failed(),
        )?;
        if let Some((subject, reason)) = self.first_failure() {
            write!(f, "; first failure: {subject}: {reason}")?;
        }
        Ok(())
    }
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////
