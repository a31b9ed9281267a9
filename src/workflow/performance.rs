//! Weighted score roll-up, grading and calibration write-back.

use std::str::FromStr;

use crate::error::AppError;
use crate::model::performance::{CalibrationStatus, ReviewStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct GradeBand {
    pub grade: String,
    pub min_score: f64,
}

/// Ordered numeric-to-letter mapping, highest band first.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeTable {
    bands: Vec<GradeBand>,
}

impl GradeTable {
    pub fn new(mut bands: Vec<GradeBand>) -> Result<Self, String> {
        if bands.is_empty() {
            return Err("grade table needs at least one band".to_string());
        }
        bands.sort_by(|a, b| {
            b.min_score
                .partial_cmp(&a.min_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(Self { bands })
    }

    /// Falls back to the lowest band for scores under every threshold.
    pub fn grade_for(&self, score: f64) -> &str {
        self.bands
            .iter()
            .find(|band| score >= band.min_score)
            .or_else(|| self.bands.last())
            .map(|band| band.grade.as_str())
            .unwrap_or_default()
    }

    pub fn bands(&self) -> &[GradeBand] {
        &self.bands
    }
}

impl Default for GradeTable {
    fn default() -> Self {
        let bands = [("A", 90.0), ("B", 80.0), ("C", 70.0), ("D", 60.0), ("E", 0.0)]
            .into_iter()
            .map(|(grade, min_score)| GradeBand {
                grade: grade.to_string(),
                min_score,
            })
            .collect();
        Self { bands }
    }
}

/// Parses `A:90,B:80,C:70`.
impl FromStr for GradeTable {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bands = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                let (grade, min) = part
                    .split_once(':')
                    .ok_or_else(|| format!("grade band '{part}' must look like A:90"))?;
                let min_score = min
                    .trim()
                    .parse::<f64>()
                    .map_err(|e| format!("grade band '{part}': {e}"))?;
                Ok(GradeBand {
                    grade: grade.trim().to_string(),
                    min_score,
                })
            })
            .collect::<Result<Vec<_>, String>>()?;
        GradeTable::new(bands)
    }
}

/// Σ(score × weight) / Σ(weight) over the items that carry a score.
pub fn weighted_score<I>(items: I) -> Option<f64>
where
    I: IntoIterator<Item = (f64, Option<f64>)>,
{
    let (sum, weight) = items
        .into_iter()
        .filter_map(|(weight, score)| score.map(|s| (weight, s)))
        .filter(|(weight, _)| *weight > 0.0)
        .fold((0.0, 0.0), |(sum, total), (weight, score)| {
            (sum + score * weight, total + weight)
        });

    (weight > 0.0).then(|| sum / weight)
}

/// The manager's view is authoritative; the self score stands in without it.
pub fn final_score(self_score: Option<f64>, manager_score: Option<f64>) -> Option<f64> {
    manager_score.or(self_score)
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ReviewAction {
    Open,
    SubmitSelf,
    SubmitManager,
    Finalize,
}

impl ReviewAction {
    fn verb(self) -> &'static str {
        match self {
            ReviewAction::Open => "open",
            ReviewAction::SubmitSelf => "self-assess",
            ReviewAction::SubmitManager => "score",
            ReviewAction::Finalize => "finalize",
        }
    }
}

pub fn review_transition(from: ReviewStatus, action: ReviewAction) -> Result<ReviewStatus, AppError> {
    use ReviewAction::*;
    use ReviewStatus::*;

    match (from, action) {
        (Draft, Open) => Ok(SelfAssessment),
        (SelfAssessment, SubmitSelf) => Ok(ManagerReview),
        (ManagerReview, SubmitManager) => Ok(ManagerReview),
        (ManagerReview, Finalize) => Ok(Completed),
        _ => Err(AppError::InvalidTransition {
            action: action.verb(),
            from: from.to_string(),
        }),
    }
}

pub fn ensure_session_open(status: CalibrationStatus, action: &'static str) -> Result<(), AppError> {
    if status == CalibrationStatus::InProgress {
        Ok(())
    } else {
        Err(AppError::InvalidTransition {
            action,
            from: status.to_string(),
        })
    }
}

/// The score and grade to write back to the source review when a session
/// completes, or `None` to leave the review as it was.
pub fn calibration_outcome(
    calibrated_score: Option<f64>,
    calibrated_grade: Option<&str>,
    grades: &GradeTable,
) -> Option<(f64, String)> {
    let score = calibrated_score?;
    let grade = calibrated_grade
        .map(str::to_string)
        .unwrap_or_else(|| grades.grade_for(score).to_string());
    Some((score, grade))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_average_uses_item_weights() {
        let items = vec![(50.0, Some(80.0)), (30.0, Some(90.0)), (20.0, Some(70.0))];
        let score = weighted_score(items).unwrap();
        assert!((score - 81.0).abs() < 1e-9);
    }

    #[test]
    fn unscored_and_weightless_items_are_skipped() {
        let items = vec![(50.0, Some(80.0)), (50.0, None), (0.0, Some(10.0))];
        assert_eq!(weighted_score(items), Some(80.0));
        assert_eq!(weighted_score(vec![(10.0, None)]), None);
        assert_eq!(weighted_score(Vec::new()), None);
    }

    #[test]
    fn default_grades() {
        let table = GradeTable::default();
        assert_eq!(table.grade_for(95.0), "A");
        assert_eq!(table.grade_for(90.0), "A");
        assert_eq!(table.grade_for(89.99), "B");
        assert_eq!(table.grade_for(61.0), "D");
        assert_eq!(table.grade_for(12.0), "E");
    }

    #[test]
    fn configured_table_is_sorted_and_floors_to_lowest_band() {
        let table: GradeTable = "C:50, A:85 ,B:70".parse().unwrap();
        assert_eq!(table.bands()[0].grade, "A");
        assert_eq!(table.grade_for(86.0), "A");
        assert_eq!(table.grade_for(70.0), "B");
        assert_eq!(table.grade_for(10.0), "C");
    }

    #[test]
    fn malformed_tables_are_rejected() {
        assert!("A90".parse::<GradeTable>().is_err());
        assert!("A:ninety".parse::<GradeTable>().is_err());
        assert!("".parse::<GradeTable>().is_err());
    }

    #[test]
    fn manager_score_wins_over_self_score() {
        assert_eq!(final_score(Some(90.0), Some(75.0)), Some(75.0));
        assert_eq!(final_score(Some(90.0), None), Some(90.0));
        assert_eq!(final_score(None, None), None);
    }

    #[test]
    fn review_moves_linearly() {
        let s = review_transition(ReviewStatus::Draft, ReviewAction::Open).unwrap();
        let s = review_transition(s, ReviewAction::SubmitSelf).unwrap();
        let s = review_transition(s, ReviewAction::SubmitManager).unwrap();
        assert_eq!(s, ReviewStatus::ManagerReview);
        let s = review_transition(s, ReviewAction::Finalize).unwrap();
        assert_eq!(s, ReviewStatus::Completed);
        assert!(review_transition(s, ReviewAction::SubmitManager).is_err());
        assert!(review_transition(ReviewStatus::SelfAssessment, ReviewAction::Finalize).is_err());
    }

    #[test]
    fn calibration_without_score_leaves_review_unchanged() {
        let table = GradeTable::default();
        assert_eq!(calibration_outcome(None, Some("A"), &table), None);
    }

    #[test]
    fn calibration_score_overrides_with_derived_or_given_grade() {
        let table = GradeTable::default();
        assert_eq!(
            calibration_outcome(Some(82.0), None, &table),
            Some((82.0, "B".to_string()))
        );
        assert_eq!(
            calibration_outcome(Some(82.0), Some("A"), &table),
            Some((82.0, "A".to_string()))
        );
    }

    #[test]
    fn closed_sessions_refuse_changes() {
        assert!(ensure_session_open(CalibrationStatus::InProgress, "calibrate").is_ok());
        let err = ensure_session_open(CalibrationStatus::Completed, "calibrate").unwrap_err();
        assert_eq!(err.to_string(), "Cannot calibrate a request that is completed");
    }
}
