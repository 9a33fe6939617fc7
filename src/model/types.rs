use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    Mcq,
    ShortAnswer,
    LongAnswer,
    TrueFalse,
    Numeric,
    Diagram,
}

impl QuestionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mcq => "MCQ",
            Self::ShortAnswer => "SHORT_ANSWER",
            Self::LongAnswer => "LONG_ANSWER",
            Self::TrueFalse => "TRUE_FALSE",
            Self::Numeric => "NUMERIC",
            Self::Diagram => "DIAGRAM",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Correctness {
    Correct,
    Partial,
    Incorrect,
    Skipped,
}

impl Correctness {
    /// Fraction of a region's point value awarded for this verdict.
    pub fn score_multiplier(self) -> f64 {
        match self {
            Self::Correct => 1.0,
            Self::Partial => 0.5,
            Self::Incorrect | Self::Skipped => 0.0,
        }
    }

    pub fn points(self, max_points: f64) -> f64 {
        (max_points * self.score_multiplier() * 100.0).round() / 100.0
    }
}

/// Per-sheet lifecycle. Only forward transitions and the `Error` escape are
/// legal; `Reviewed` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetStatus {
    Uploaded,
    Processing,
    Processed,
    Annotated,
    Graded,
    Reviewed,
    Error,
}

impl SheetStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Annotated => "annotated",
            Self::Graded => "graded",
            Self::Reviewed => "reviewed",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Reviewed | Self::Error)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == Self::Error {
            return true;
        }
        matches!(
            (self, next),
            (Self::Uploaded, Self::Processing)
                | (Self::Processing, Self::Processed)
                | (Self::Processed, Self::Annotated)
                | (Self::Annotated, Self::Graded)
                | (Self::Graded, Self::Reviewed)
        )
    }
}

impl std::fmt::Display for SheetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// Routing decision derived from aggregate confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    AutoApprove,
    QuickReview,
    DetailedReview,
}

impl Disposition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AutoApprove => "auto_approve",
            Self::QuickReview => "quick_review",
            Self::DetailedReview => "detailed_review",
        }
    }
}

/// Queue ordering hint for human graders; ordered so that `High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewPriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TrainingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for TrainingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_only() {
        assert!(SheetStatus::Uploaded.can_transition_to(SheetStatus::Processing));
        assert!(SheetStatus::Processing.can_transition_to(SheetStatus::Processed));
        assert!(SheetStatus::Processed.can_transition_to(SheetStatus::Annotated));
        assert!(SheetStatus::Annotated.can_transition_to(SheetStatus::Graded));
        assert!(SheetStatus::Graded.can_transition_to(SheetStatus::Reviewed));

        assert!(!SheetStatus::Uploaded.can_transition_to(SheetStatus::Processed));
        assert!(!SheetStatus::Graded.can_transition_to(SheetStatus::Processing));
        assert!(!SheetStatus::Processing.can_transition_to(SheetStatus::Uploaded));
    }

    #[test]
    fn error_reachable_from_any_non_terminal_state() {
        for status in [
            SheetStatus::Uploaded,
            SheetStatus::Processing,
            SheetStatus::Processed,
            SheetStatus::Annotated,
            SheetStatus::Graded,
        ] {
            assert!(status.can_transition_to(SheetStatus::Error));
        }
    }

    #[test]
    fn terminal_states_accept_nothing() {
        for next in [SheetStatus::Processing, SheetStatus::Reviewed, SheetStatus::Error] {
            assert!(!SheetStatus::Reviewed.can_transition_to(next));
            assert!(!SheetStatus::Error.can_transition_to(next));
        }
    }

    #[test]
    fn correctness_multipliers() {
        assert_eq!(Correctness::Correct.points(10.0), 10.0);
        assert_eq!(Correctness::Partial.points(10.0), 5.0);
        assert_eq!(Correctness::Incorrect.points(10.0), 0.0);
        assert_eq!(Correctness::Skipped.points(10.0), 0.0);
    }

    #[test]
    fn review_priority_ordering() {
        assert!(ReviewPriority::High > ReviewPriority::Medium);
        assert!(ReviewPriority::Medium > ReviewPriority::Low);
    }

    #[test]
    fn question_type_wire_format() {
        let value = serde_json::to_string(&QuestionType::ShortAnswer).expect("serialize");
        assert_eq!(value, "\"SHORT_ANSWER\"");
    }
}
