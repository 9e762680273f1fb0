use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use utoipa::ToSchema;

use super::CourseContent;
use crate::{
    model::{Student, StudentProgress, WatchEntry},
    utils::round2,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContentCompletion {
    pub videos_watched: usize,
    /// Videos with any recorded time in either source
    pub videos_started: usize,
    pub total_videos: usize,
    pub reading_completed: usize,
    pub total_reading: usize,
    pub total_content: usize,
    pub completed_content: usize,
    pub percent: f64,
    pub started_percent: f64,
    /// Seconds spent on the course's videos
    pub watch_time_seconds: f64,
}

impl ContentCompletion {
    /// The value shown to users: engaged-but-unfinished students are not under reported.
    pub fn display_percent(&self) -> f64 {
        self.percent.max(self.started_percent)
    }
}

fn percent_of(done: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round2((done as f64 / total as f64 * 100.0).clamp(0.0, 100.0))
}

/// Time spent per course video. Entries for videos outside the course are ignored.
fn time_by_video<'a>(
    entries: impl Iterator<Item = &'a WatchEntry>,
    videos: &BTreeSet<&str>,
) -> BTreeMap<&'a str, f64> {
    let mut spent = BTreeMap::new();
    for entry in entries {
        if videos.contains(entry.video.as_str()) && entry.time_spent.is_finite() {
            *spent.entry(entry.video.as_str()).or_insert(0.0) += entry.time_spent.max(0.0);
        }
    }
    spent
}

/// Content completion of `student` in the course.
///
/// Watched videos come from the progress record when it lists any of the course's videos,
/// otherwise from the student's watch history. A video only counts once some time was
/// spent on it.
/// Completed reading materials only count while they are still approved.
pub fn completion(
    content: &CourseContent,
    student: &Student,
    progress: Option<&StudentProgress>,
) -> ContentCompletion {
    let videos = content.video_ids();
    let approved = content.approved_reading_ids();

    let progress_entries = progress
        .into_iter()
        .flat_map(|p| p.units.iter())
        .flat_map(|u| u.videos_watched.iter());
    let from_progress = time_by_video(progress_entries, &videos);
    let from_history = time_by_video(student.watch_history.iter(), &videos);

    let primary = if !from_progress.is_empty() {
        &from_progress
    } else {
        &from_history
    };
    let videos_watched = primary.values().filter(|t| **t > 0.0).count();
    let watch_time_seconds = primary.values().sum::<f64>();
    let videos_started = from_progress
        .iter()
        .chain(from_history.iter())
        .filter(|(_, t)| **t > 0.0)
        .map(|(v, _)| *v)
        .collect::<BTreeSet<_>>()
        .len();

    let reading_completed = progress
        .into_iter()
        .flat_map(|p| p.units.iter())
        .flat_map(|u| u.reading_materials_completed.iter())
        .filter(|id| approved.contains(id.as_str()))
        .map(String::as_str)
        .collect::<BTreeSet<_>>()
        .len();

    let total_videos = videos.len();
    let total_reading = approved.len();
    let total_content = total_videos + total_reading;
    let completed_content = videos_watched + reading_completed;
    ContentCompletion {
        videos_watched,
        videos_started,
        total_videos,
        reading_completed,
        total_reading,
        total_content,
        completed_content,
        percent: percent_of(completed_content, total_content),
        started_percent: percent_of(videos_started + reading_completed, total_content),
        watch_time_seconds,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::fixtures::*;
    use crate::model::UnitProgress;

    fn two_videos_one_reading() -> CourseContent {
        CourseContent::new(
            course("c1"),
            vec![unit("u1", "c1", 1, &["v1", "v2"], &[])],
            vec![video("v1", "c1", Some("u1")), video("v2", "c1", Some("u1"))],
            vec![reading("r1", "c1", Some(true))],
            vec![],
        )
    }

    fn unit_progress(videos: &[(&str, f64)], reading: &[&str]) -> UnitProgress {
        UnitProgress {
            unit_id: "u1".into(),
            videos_watched: videos
                .iter()
                .map(|(v, t)| WatchEntry {
                    video: v.to_string(),
                    time_spent: *t,
                })
                .collect(),
            reading_materials_completed: reading.iter().map(|s| s.to_string()).collect(),
            quiz_attempts: vec![],
        }
    }

    #[test]
    fn end_to_end_two_of_three() {
        let content = two_videos_one_reading();
        let progress = progress("s1", "c1", vec![unit_progress(&[("v1", 120.0)], &["r1"])]);
        let result = completion(&content, &student("s1", &[]), Some(&progress));
        assert_eq!(result.total_content, 3);
        assert_eq!(result.completed_content, 2);
        assert_eq!(result.percent, 66.67);
        assert_eq!(result.watch_time_seconds, 120.0);
    }

    #[test]
    fn zero_time_spent_never_counts() {
        let content = CourseContent::new(
            course("c1"),
            vec![],
            vec![video("v1", "c1", None)],
            vec![],
            vec![],
        );
        let result = completion(&content, &student("s1", &[("v1", 0.0)]), None);
        assert_eq!(result.videos_watched, 0);
        assert_eq!(result.percent, 0.0);
        assert_eq!(result.started_percent, 0.0);
    }

    #[test]
    fn empty_course_is_zero_not_nan() {
        let content = CourseContent::new(course("c1"), vec![], vec![], vec![], vec![]);
        let result = completion(&content, &student("s1", &[("v9", 50.0)]), None);
        assert_eq!(result.total_content, 0);
        assert_eq!(result.percent, 0.0);
        assert!(!result.display_percent().is_nan());
    }

    #[test]
    fn history_is_fallback_when_progress_lists_no_videos() {
        let content = two_videos_one_reading();
        let progress = progress("s1", "c1", vec![unit_progress(&[], &["r1"])]);
        let student = student("s1", &[("v1", 10.0), ("v2", 5.0)]);
        let result = completion(&content, &student, Some(&progress));
        assert_eq!(result.videos_watched, 2);
        assert_eq!(result.percent, 100.0);
    }

    #[test]
    fn history_is_fallback_when_progress_lists_only_foreign_videos() {
        let content = two_videos_one_reading();
        let progress = progress("s1", "c1", vec![unit_progress(&[("v9", 300.0)], &[])]);
        let student = student("s1", &[("v1", 40.0)]);
        let result = completion(&content, &student, Some(&progress));
        assert_eq!(result.videos_watched, 1);
        assert_eq!(result.watch_time_seconds, 40.0);
    }

    #[test]
    fn started_variant_uses_both_sources() {
        let content = two_videos_one_reading();
        let progress = progress("s1", "c1", vec![unit_progress(&[("v1", 60.0)], &[])]);
        let student = student("s1", &[("v2", 15.0)]);
        let result = completion(&content, &student, Some(&progress));
        assert_eq!(result.videos_watched, 1);
        assert_eq!(result.videos_started, 2);
        assert_eq!(result.percent, 33.33);
        assert_eq!(result.started_percent, 66.67);
        assert_eq!(result.display_percent(), 66.67);
    }

    #[test]
    fn unapproved_and_foreign_content_excluded() {
        let content = CourseContent::new(
            course("c1"),
            vec![],
            vec![video("v1", "c1", None)],
            vec![reading("r1", "c1", Some(true)), reading("r2", "c1", Some(false))],
            vec![],
        );
        // r2 was completed before being unapproved, v9 belongs to another course
        let progress = progress(
            "s1",
            "c1",
            vec![unit_progress(&[("v1", 30.0), ("v9", 300.0)], &["r1", "r2", "r1"])],
        );
        let result = completion(&content, &student("s1", &[]), Some(&progress));
        assert_eq!(result.total_reading, 1);
        assert_eq!(result.reading_completed, 1);
        assert_eq!(result.percent, 100.0);
        assert_eq!(result.watch_time_seconds, 30.0);
    }
}
