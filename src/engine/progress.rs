//! Course progress aggregation.
//!
//! `completed` is always re-derived from `lecture_progress` against the
//! course outline fetched for the current call. Manual toggles are explicit
//! transitions that go through the same derivation.

use std::fmt;

use crate::models::{
    progress::{CourseProgress, LectureProgress},
    question::CourseOutline,
};

/// Every way a progress record may change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressTransition {
    /// A lecture was opened or a test was submitted.
    Viewed(i64),
    /// Student un-ticked a single unit.
    Unviewed(i64),
    /// Student ticked "mark course completed": every current unit becomes viewed.
    CourseCompleted,
    /// Student reset the course: every unit becomes unviewed.
    CourseReset,
}

impl fmt::Display for ProgressTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressTransition::Viewed(id) => write!(f, "viewed({})", id),
            ProgressTransition::Unviewed(id) => write!(f, "unviewed({})", id),
            ProgressTransition::CourseCompleted => f.write_str("course_completed"),
            ProgressTransition::CourseReset => f.write_str("course_reset"),
        }
    }
}

/// True iff the course has units and each of them is viewed.
pub fn is_complete(progress: &CourseProgress, outline: &CourseOutline) -> bool {
    !outline.unit_ids.is_empty() && outline.unit_ids.iter().all(|id| progress.is_viewed(*id))
}

/// Apply `transition` and re-derive `completed`.
pub fn apply(progress: &mut CourseProgress, transition: ProgressTransition, outline: &CourseOutline) {
    match transition {
        ProgressTransition::Viewed(id) => set_viewed(progress, id, true),
        ProgressTransition::Unviewed(id) => set_viewed(progress, id, false),
        ProgressTransition::CourseCompleted => {
            for id in &outline.unit_ids {
                set_viewed(progress, *id, true);
            }
        }
        ProgressTransition::CourseReset => {
            for entry in &mut progress.lecture_progress {
                entry.viewed = false;
            }
        }
    }

    progress.completed = is_complete(progress, outline);
}

fn set_viewed(progress: &mut CourseProgress, lecture_id: i64, viewed: bool) {
    match progress
        .lecture_progress
        .iter_mut()
        .find(|p| p.lecture_id == lecture_id)
    {
        Some(entry) => entry.viewed = viewed,
        None => progress
            .lecture_progress
            .push(LectureProgress { lecture_id, viewed }),
    }
}
