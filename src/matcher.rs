use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::record::{CandidateRecord, FieldValue, QueryRecord};

// -------------------------------------------------------------------------------------------------
// Comparator
// -------------------------------------------------------------------------------------------------
/// How a pair of field values is compared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparator {
    /// Numeric comparison by relative difference.
    ///
    /// The per-field similarity is `max(0, 1 - 2 * diff)` where
    /// `diff = |a - b| / max(|a|, |b|)`, so similarity falls linearly to zero at a 50%
    /// relative difference.
    RelativeDifference,

    /// Exact, case-insensitive text comparison.
    ExactText,
}

impl Comparator {
    /// Compare the two values, giving a similarity in `[0, 1]`.
    ///
    /// Returns `None` when either side is not usable under this comparator; such a pair takes
    /// no part in scoring.
    pub fn similarity(&self, query: &FieldValue, candidate: &FieldValue) -> Option<f64> {
        match self {
            Comparator::RelativeDifference => {
                let (q, c) = (query.number()?, candidate.number()?);
                Some(relative_similarity(q, c))
            }
            Comparator::ExactText => {
                let (q, c) = (query.text()?, candidate.text()?);
                let same = q.to_lowercase() == c.to_lowercase();
                Some(if same { 1.0 } else { 0.0 })
            }
        }
    }
}

/// The relative difference `|a - b| / max(|a|, |b|)`, with two zeros counting as identical.
pub fn relative_difference(a: f64, b: f64) -> f64 {
    let denom = a.abs().max(b.abs());
    if denom == 0.0 {
        0.0
    } else {
        (a - b).abs() / denom
    }
}

fn relative_similarity(a: f64, b: f64) -> f64 {
    let diff = relative_difference(a, b);
    (1.0 - 2.0 * diff).clamp(0.0, 1.0)
}

// -------------------------------------------------------------------------------------------------
// FieldRule
// -------------------------------------------------------------------------------------------------
/// One row of a scoring policy: which fields to pair up, how much the pair counts, and how to
/// compare it.
#[derive(Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub query: fn(&QueryRecord) -> Option<&FieldValue>,
    pub candidate: fn(&CandidateRecord) -> Option<&FieldValue>,
    pub weight: u32,
    pub comparator: Comparator,
}

impl std::fmt::Debug for FieldRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldRule")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .field("comparator", &self.comparator)
            .finish()
    }
}

/// The default scoring policy for historical purchase records.
///
/// Dimensions weigh most, then performance figures and the product name, then the remaining
/// categorical attributes.
pub const DEFAULT_FIELD_RULES: &[FieldRule] = &[
    FieldRule {
        name: "length",
        query: |q| q.length.as_ref(),
        candidate: |c| c.length.as_ref(),
        weight: 3,
        comparator: Comparator::RelativeDifference,
    },
    FieldRule {
        name: "width",
        query: |q| q.width.as_ref(),
        candidate: |c| c.width.as_ref(),
        weight: 3,
        comparator: Comparator::RelativeDifference,
    },
    FieldRule {
        name: "height",
        query: |q| q.height.as_ref(),
        candidate: |c| c.height.as_ref(),
        weight: 3,
        comparator: Comparator::RelativeDifference,
    },
    FieldRule {
        name: "static_pressure",
        query: |q| q.static_pressure.as_ref(),
        candidate: |c| c.static_pressure_mmaq.as_ref(),
        weight: 2,
        comparator: Comparator::RelativeDifference,
    },
    FieldRule {
        name: "horsepower",
        query: |q| q.horsepower.as_ref(),
        candidate: |c| c.horsepower_hp.as_ref(),
        weight: 2,
        comparator: Comparator::RelativeDifference,
    },
    FieldRule {
        name: "airflow",
        query: |q| q.airflow.as_ref(),
        candidate: |c| c.airflow_ncmm.as_ref(),
        weight: 2,
        comparator: Comparator::RelativeDifference,
    },
    FieldRule {
        name: "product_name",
        query: |q| q.product_name.as_ref(),
        candidate: |c| c.product_name.as_ref(),
        weight: 2,
        comparator: Comparator::ExactText,
    },
    FieldRule {
        name: "casing_material",
        query: |q| q.casing_material.as_ref(),
        candidate: |c| c.casing_material.as_ref(),
        weight: 1,
        comparator: Comparator::ExactText,
    },
    FieldRule {
        name: "frame_material",
        query: |q| q.frame_material.as_ref(),
        candidate: |c| c.frame_material.as_ref(),
        weight: 1,
        comparator: Comparator::ExactText,
    },
    FieldRule {
        name: "specification",
        query: |q| q.specification.as_ref(),
        candidate: |c| c.specification.as_ref(),
        weight: 1,
        comparator: Comparator::ExactText,
    },
    FieldRule {
        name: "outlet_direction",
        query: |q| q.outlet_direction.as_ref(),
        candidate: |c| c.outlet_direction.as_ref(),
        weight: 1,
        comparator: Comparator::ExactText,
    },
    FieldRule {
        name: "drive_method",
        query: |q| q.drive_method.as_ref(),
        candidate: |c| c.drive_method.as_ref(),
        weight: 1,
        comparator: Comparator::ExactText,
    },
];

// -------------------------------------------------------------------------------------------------
// MatchScorer
// -------------------------------------------------------------------------------------------------
/// Scores historical records against a query as a weighted average of per-field similarities.
///
/// A `MatchScorer` holds no mutable state; a single instance can be shared freely.
#[derive(Clone, Debug)]
pub struct MatchScorer {
    rules: Cow<'static, [FieldRule]>,
}

impl Default for MatchScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchScorer {
    /// Create a scorer using `DEFAULT_FIELD_RULES`.
    pub fn new() -> Self {
        MatchScorer {
            rules: Cow::Borrowed(DEFAULT_FIELD_RULES),
        }
    }

    /// Create a scorer using a custom scoring policy.
    pub fn with_rules<R: Into<Cow<'static, [FieldRule]>>>(rules: R) -> Self {
        MatchScorer {
            rules: rules.into(),
        }
    }

    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Compute the match score of `candidate` against `query`, in `[0, 100]`.
    ///
    /// Field pairs where either side is missing or unusable contribute to neither the weighted
    /// sum nor the total weight. When no pair is usable the score is 0.
    pub fn score(&self, candidate: &CandidateRecord, query: &QueryRecord) -> f64 {
        let mut score = 0.0;
        let mut total_weight = 0u32;

        for rule in self.rules.iter() {
            let (q, c) = match ((rule.query)(query), (rule.candidate)(candidate)) {
                (Some(q), Some(c)) => (q, c),
                _ => continue,
            };
            if let Some(similarity) = rule.comparator.similarity(q, c) {
                score += similarity * f64::from(rule.weight);
                total_weight += rule.weight;
            }
        }

        if total_weight > 0 {
            score / f64::from(total_weight) * 100.0
        } else {
            0.0
        }
    }

    /// Score every candidate and order them by descending score.
    ///
    /// Candidates with equal scores keep their input order.
    pub fn rank<I>(&self, query: &QueryRecord, candidates: I) -> Vec<ScoredCandidate>
    where
        I: IntoIterator<Item = CandidateRecord>,
    {
        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|candidate| {
                let match_score = self.score(&candidate, query);
                ScoredCandidate {
                    candidate,
                    match_score,
                }
            })
            .collect();
        // `sort_by` is stable
        scored.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
        scored
    }
}

/// Compute a match score using the default scoring policy.
pub fn score(candidate: &CandidateRecord, query: &QueryRecord) -> f64 {
    MatchScorer::new().score(candidate, query)
}

/// Rank candidates using the default scoring policy.
pub fn rank<I>(query: &QueryRecord, candidates: I) -> Vec<ScoredCandidate>
where
    I: IntoIterator<Item = CandidateRecord>,
{
    MatchScorer::new().rank(query, candidates)
}

// -------------------------------------------------------------------------------------------------
// ScoredCandidate
// -------------------------------------------------------------------------------------------------
/// A historical record annotated with its match score against some query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub candidate: CandidateRecord,

    pub match_score: f64,
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn candidate_with_length(length: f64) -> CandidateRecord {
        CandidateRecord {
            length: Some(length.into()),
            ..Default::default()
        }
    }

    fn tagged(tag: &str, length: f64) -> CandidateRecord {
        CandidateRecord {
            order_number: Some(tag.into()),
            length: Some(length.into()),
            ..Default::default()
        }
    }

    #[test]
    fn default_weights() {
        let weights: Vec<(&str, u32)> =
            DEFAULT_FIELD_RULES.iter().map(|r| (r.name, r.weight)).collect();
        assert_eq!(
            weights,
            vec![
                ("length", 3),
                ("width", 3),
                ("height", 3),
                ("static_pressure", 2),
                ("horsepower", 2),
                ("airflow", 2),
                ("product_name", 2),
                ("casing_material", 1),
                ("frame_material", 1),
                ("specification", 1),
                ("outlet_direction", 1),
                ("drive_method", 1),
            ]
        );
    }

    #[test]
    fn identical_dimensions_and_case_insensitive_name() {
        let query = QueryRecord {
            length: Some(2500.0.into()),
            width: Some(2500.0.into()),
            height: Some(2500.0.into()),
            product_name: Some("Fan".into()),
            ..Default::default()
        };
        let candidate = CandidateRecord {
            length: Some(2500.0.into()),
            width: Some("2500".into()),
            height: Some(2500.0.into()),
            product_name: Some("fan".into()),
            ..Default::default()
        };
        assert_eq!(score(&candidate, &query), 100.0);
    }

    #[test]
    fn half_difference_scores_zero() {
        let query = QueryRecord {
            length: Some(1000.0.into()),
            ..Default::default()
        };
        assert_eq!(score(&candidate_with_length(500.0), &query), 0.0);
    }

    #[test]
    fn empty_query_scores_zero() {
        let candidate = CandidateRecord {
            length: Some(2500.0.into()),
            product_name: Some("fan".into()),
            ..Default::default()
        };
        assert_eq!(score(&candidate, &QueryRecord::default()), 0.0);
    }

    #[test]
    fn one_sided_fields_are_ignored() {
        let query = QueryRecord {
            length: Some(1000.0.into()),
            width: Some(800.0.into()),
            drive_method: Some("直結式".into()),
            ..Default::default()
        };
        let candidate = CandidateRecord {
            length: Some(1000.0.into()),
            height: Some(300.0.into()),
            ..Default::default()
        };
        assert_eq!(score(&candidate, &query), 100.0);
    }

    #[test]
    fn malformed_numbers_are_ignored() {
        let query = QueryRecord {
            length: Some("about 1000".into()),
            width: Some(800.0.into()),
            ..Default::default()
        };
        let candidate = CandidateRecord {
            length: Some(1000.0.into()),
            width: Some(800.0.into()),
            ..Default::default()
        };
        assert_eq!(score(&candidate, &query), 100.0);
    }

    #[test]
    fn numbers_with_unit_suffixes_are_compared() {
        // length identical, width 50% apart: 3 of 6
        let query = QueryRecord {
            length: Some(2500.0.into()),
            width: Some(1000.0.into()),
            ..Default::default()
        };
        let candidate = CandidateRecord {
            length: Some("2500mm".into()),
            width: Some("2000 mm".into()),
            ..Default::default()
        };
        assert_eq!(score(&candidate, &query), 50.0);
    }

    #[test]
    fn both_zero_is_identical() {
        let query = QueryRecord {
            airflow: Some(0.0.into()),
            ..Default::default()
        };
        let candidate = CandidateRecord {
            airflow_ncmm: Some(0.0.into()),
            ..Default::default()
        };
        assert_eq!(score(&candidate, &query), 100.0);
    }

    #[test]
    fn mixed_weighted_average() {
        // length: diff 0.1 -> 0.8 * 3 = 2.4; casing material mismatch -> 0 of 1
        let query = QueryRecord {
            length: Some(1000.0.into()),
            casing_material: Some("SUS304".into()),
            ..Default::default()
        };
        let candidate = CandidateRecord {
            length: Some(900.0.into()),
            casing_material: Some("SS400".into()),
            ..Default::default()
        };
        let s = score(&candidate, &query);
        assert!((s - 60.0).abs() < 1e-9, "score was {s}");
    }

    #[test]
    fn ranking_is_descending_and_stable() {
        let query = QueryRecord {
            length: Some(1000.0.into()),
            ..Default::default()
        };
        // A and B score 80, C scores 60
        let candidates = vec![tagged("C", 850.0), tagged("A", 900.0), tagged("B", 900.0)];
        let ranked = rank(&query, candidates);
        let order: Vec<String> = ranked
            .iter()
            .map(|s| s.candidate.order_number.as_ref().unwrap().to_string())
            .collect();
        assert_eq!(order, vec!["A", "B", "C"]);
        assert!((ranked[0].match_score - 80.0).abs() < 1e-9);
        assert!((ranked[1].match_score - 80.0).abs() < 1e-9);
        assert!((ranked[2].match_score - 70.0).abs() < 1e-9);
    }

    #[test]
    fn custom_rules() {
        const RULES: &[FieldRule] = &[FieldRule {
            name: "series",
            query: |q| q.series.as_ref(),
            candidate: |c| c.model.as_ref(),
            weight: 1,
            comparator: Comparator::ExactText,
        }];
        let scorer = MatchScorer::with_rules(RULES);
        let query = QueryRecord {
            series: Some("saf".into()),
            length: Some(1.0.into()),
            ..Default::default()
        };
        let candidate = CandidateRecord {
            model: Some("SAF".into()),
            length: Some(1000.0.into()),
            ..Default::default()
        };
        assert_eq!(scorer.score(&candidate, &query), 100.0);
        assert_eq!(score(&candidate, &query), 0.0);
    }

    #[test]
    fn scored_candidate_serializes_flat() {
        let s = ScoredCandidate {
            candidate: CandidateRecord {
                vendor_name: Some("Acme".into()),
                ..Default::default()
            },
            match_score: 42.0,
        };
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["vendor_name"], serde_json::json!("Acme"));
        assert_eq!(v["match_score"], serde_json::json!(42.0));
    }

    fn field_value() -> impl Strategy<Value = FieldValue> {
        prop_oneof![
            (-1e12f64..1e12).prop_map(FieldValue::Number),
            any::<f64>().prop_map(FieldValue::Number),
            ".*".prop_map(FieldValue::Text),
            (-1e6f64..1e6).prop_map(|n| FieldValue::Text(n.to_string())),
        ]
    }

    fn maybe_value() -> impl Strategy<Value = Option<FieldValue>> {
        proptest::option::of(field_value())
    }

    prop_compose! {
        fn query_record()(
            length in maybe_value(),
            width in maybe_value(),
            height in maybe_value(),
            static_pressure in maybe_value(),
            horsepower in maybe_value(),
            airflow in maybe_value(),
            product_name in maybe_value(),
            casing_material in maybe_value(),
            drive_method in maybe_value(),
        ) -> QueryRecord {
            QueryRecord {
                length, width, height, static_pressure, horsepower, airflow,
                product_name, casing_material, drive_method,
                ..Default::default()
            }
        }
    }

    prop_compose! {
        fn candidate_record()(
            length in maybe_value(),
            width in maybe_value(),
            height in maybe_value(),
            static_pressure_mmaq in maybe_value(),
            horsepower_hp in maybe_value(),
            airflow_ncmm in maybe_value(),
            product_name in maybe_value(),
            casing_material in maybe_value(),
            drive_method in maybe_value(),
        ) -> CandidateRecord {
            CandidateRecord {
                length, width, height, static_pressure_mmaq, horsepower_hp, airflow_ncmm,
                product_name, casing_material, drive_method,
                ..Default::default()
            }
        }
    }

    proptest! {
        #[test]
        fn score_is_bounded(q in query_record(), c in candidate_record()) {
            let s = score(&c, &q);
            prop_assert!(s.is_finite());
            prop_assert!((0.0..=100.0).contains(&s), "score out of range: {}", s);
        }

        #[test]
        fn self_match_is_perfect_or_empty(c in candidate_record()) {
            let q = QueryRecord::from(&c);
            let s = score(&c, &q);
            // materials are defaulted when missing, so they never disagree with the source
            prop_assert!(s == 100.0 || s == 0.0, "score was {}", s);
        }

        #[test]
        fn relative_similarity_is_symmetric(a in -1e9f64..1e9, b in -1e9f64..1e9) {
            prop_assert_eq!(relative_similarity(a, b), relative_similarity(b, a));
        }

        #[test]
        fn relative_similarity_is_monotone(c in 1.0f64..1e6, d1 in 0.0f64..1e6, d2 in 0.0f64..1e6) {
            let (near, far) = if d1 <= d2 { (d1, d2) } else { (d2, d1) };
            let eps = 1e-12;
            prop_assert!(relative_similarity(c + near, c) + eps >= relative_similarity(c + far, c));
            prop_assert!(relative_similarity(c - near.min(c), c) + eps >= relative_similarity(c - far.min(c), c));
        }

        #[test]
        fn disjoint_fields_score_zero(l in 1.0f64..1e6, w in 1.0f64..1e6) {
            let q = QueryRecord { length: Some(l.into()), ..Default::default() };
            let c = CandidateRecord { width: Some(w.into()), ..Default::default() };
            prop_assert_eq!(score(&c, &q), 0.0);
        }
    }
}
