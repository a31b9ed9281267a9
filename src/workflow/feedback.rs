//! 360-degree feedback aggregation.

use std::collections::BTreeMap;

use serde::Serialize;
use utoipa::ToSchema;

use crate::model::feedback::Relationship;

/// Relationship weights used for the overall score. Weights of relationships
/// with no answers are dropped and the rest renormalised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelationshipWeights {
    pub self_review: f64,
    pub peer: f64,
    pub manager: f64,
    pub direct_report: f64,
}

impl Default for RelationshipWeights {
    fn default() -> Self {
        Self {
            self_review: 0.1,
            peer: 0.3,
            manager: 0.4,
            direct_report: 0.2,
        }
    }
}

impl RelationshipWeights {
    pub fn weight(&self, relationship: Relationship) -> f64 {
        match relationship {
            Relationship::SelfReview => self.self_review,
            Relationship::Peer => self.peer,
            Relationship::Manager => self.manager,
            Relationship::DirectReport => self.direct_report,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredAnswer {
    pub relationship: Relationship,
    pub competency: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct CompetencySummary {
    #[schema(example = "Communication")]
    pub competency: String,
    /// Mean score per reviewer relationship
    #[schema(value_type = Object)]
    pub by_relationship: BTreeMap<String, f64>,
    pub overall: Option<f64>,
}

#[derive(Debug, Clone, Serialize, ToSchema, PartialEq)]
pub struct FeedbackSummary {
    pub answer_count: usize,
    #[schema(value_type = Object)]
    pub by_relationship: BTreeMap<String, f64>,
    pub overall: Option<f64>,
    pub competencies: Vec<CompetencySummary>,
}

#[derive(Default)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn push(&mut self, v: f64) {
        self.sum += v;
        self.count += 1;
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

fn weighted_overall(
    means: &BTreeMap<Relationship, Mean>,
    weights: &RelationshipWeights,
) -> Option<f64> {
    let (sum, total) = means
        .iter()
        .filter_map(|(rel, mean)| mean.value().map(|v| (weights.weight(*rel), v)))
        .filter(|(w, _)| *w > 0.0)
        .fold((0.0, 0.0), |(sum, total), (w, v)| (sum + w * v, total + w));
    (total > 0.0).then(|| sum / total)
}

fn labelled(means: &BTreeMap<Relationship, Mean>) -> BTreeMap<String, f64> {
    means
        .iter()
        .filter_map(|(rel, mean)| mean.value().map(|v| (rel.to_string(), v)))
        .collect()
}

pub fn summarize(answers: &[ScoredAnswer], weights: &RelationshipWeights) -> FeedbackSummary {
    let mut overall: BTreeMap<Relationship, Mean> = BTreeMap::new();
    let mut per_competency: BTreeMap<&str, BTreeMap<Relationship, Mean>> = BTreeMap::new();

    for answer in answers {
        overall.entry(answer.relationship).or_default().push(answer.score);
        per_competency
            .entry(answer.competency.as_str())
            .or_default()
            .entry(answer.relationship)
            .or_default()
            .push(answer.score);
    }

    let competencies = per_competency
        .iter()
        .map(|(competency, means)| CompetencySummary {
            competency: competency.to_string(),
            by_relationship: labelled(means),
            overall: weighted_overall(means, weights),
        })
        .collect();

    FeedbackSummary {
        answer_count: answers.len(),
        by_relationship: labelled(&overall),
        overall: weighted_overall(&overall, weights),
        competencies,
    }
}
