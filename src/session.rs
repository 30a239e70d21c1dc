use crate::matcher::{MatchScorer, ScoredCandidate};
use crate::record::{CandidateRecord, QueryRecord};

// -------------------------------------------------------------------------------------------------
// RankingSession
// -------------------------------------------------------------------------------------------------
/// The state behind a historical-price lookup: the most recently fetched candidates, and
/// optionally a pinned query to rank them against.
///
/// While a query is pinned, rescoring ignores the live query passed in by the caller. This is
/// what keeps match scores meaningful after a user copies a historical record's attributes back
/// into the live form.
///
/// All transitions consume the session and return the new one.
#[derive(Clone, Debug, Default)]
pub struct RankingSession {
    pinned: Option<QueryRecord>,
    candidates: Vec<CandidateRecord>,
    scorer: MatchScorer,
}

impl RankingSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scorer(scorer: MatchScorer) -> Self {
        RankingSession {
            scorer,
            ..Self::default()
        }
    }

    /// Rank against `query` until `clear` is called.
    pub fn pin(self, query: QueryRecord) -> Self {
        RankingSession {
            pinned: Some(query),
            ..self
        }
    }

    /// Pin the attributes of a historical record as the query.
    pub fn select(self, candidate: &CandidateRecord) -> Self {
        self.pin(QueryRecord::from(candidate))
    }

    /// Drop any pinned query, so that rescoring follows the live query again.
    pub fn clear(self) -> Self {
        RankingSession {
            pinned: None,
            ..self
        }
    }

    /// Replace the candidate set, e.g. after a fresh history lookup.
    pub fn with_candidates(self, candidates: Vec<CandidateRecord>) -> Self {
        RankingSession {
            candidates,
            ..self
        }
    }

    pub fn pinned(&self) -> Option<&QueryRecord> {
        self.pinned.as_ref()
    }

    pub fn candidates(&self) -> &[CandidateRecord] {
        &self.candidates
    }

    /// The query that ranking uses: the pinned one if any, otherwise `live`.
    pub fn matching_query<'a>(&'a self, live: &'a QueryRecord) -> &'a QueryRecord {
        self.pinned.as_ref().unwrap_or(live)
    }

    /// Score and rank the current candidate set.
    pub fn rescored(&self, live: &QueryRecord) -> Vec<ScoredCandidate> {
        let query = self.matching_query(live);
        self.scorer.rank(query, self.candidates.iter().cloned())
    }
}
