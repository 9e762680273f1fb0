//! Documents read by the analytics service.
//!
//! Every type maps onto one collection of the document store (see [`Document`]).
//! The service never mutates them while computing a report; they are a snapshot
//! for the duration of a request.

use serde::{
    Deserialize, Deserializer, Serialize,
    de::{DeserializeOwned, IgnoredAny},
};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use utoipa::ToSchema;

/// A JSON document stored in a named collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    const COLLECTION: &'static str;
    fn id(&self) -> &str;
}

macro_rules! document {
    ($ty:ty, $collection:literal) => {
        impl Document for $ty {
            const COLLECTION: &'static str = $collection;
            fn id(&self) -> &str {
                &self.id
            }
        }
    };
}

/// `null` reads as the type's default, same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Unparseable timestamps read as unknown.
fn lenient_rfc3339<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value
        .as_str()
        .and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok()))
}

/// Roles this service does not know are dropped.
fn known_roles<'de, D>(deserializer: D) -> Result<Vec<Role>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Entry {
        Known(Role),
        Unknown(IgnoredAny),
    }
    Ok(Vec::<Entry>::deserialize(deserializer)?
        .into_iter()
        .filter_map(|e| match e {
            Entry::Known(role) => Some(role),
            Entry::Unknown(_) => None,
        })
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Dean,
    Hod,
    Teacher,
    Student,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct School {
    pub id: String,
    pub name: String,
}
document!(School, "schools");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: String,
    pub name: String,
    pub school: String,
}
document!(Department, "departments");

/// Staff identity (admin, dean, HOD, teacher).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default, deserialize_with = "known_roles")]
    pub roles: Vec<Role>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub school: Option<String>,
}
document!(User, "users");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchEntry {
    pub video: String,
    /// seconds
    #[serde(default, deserialize_with = "null_as_default")]
    pub time_spent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub registration_no: String,
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub sections: Vec<String>,
    #[serde(default)]
    pub watch_history: Vec<WatchEntry>,
}
document!(Student, "students");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub course_code: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub units: Vec<String>,
    /// At most one active coordinator, enforced when coordinators are assigned.
    #[serde(default)]
    pub coordinators: Vec<String>,
}
document!(Course, "courses");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: String,
    pub course: String,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub order: u32,
    #[serde(default)]
    pub videos: Vec<String>,
    #[serde(default)]
    pub quizzes: Vec<String>,
}
document!(Unit, "units");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub course: String,
    #[serde(default)]
    pub unit: Option<String>,
    pub title: String,
    /// seconds
    #[serde(default, deserialize_with = "null_as_default")]
    pub duration: f64,
}
document!(Video, "videos");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    /// any other workflow state
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingMaterial {
    pub id: String,
    pub course: String,
    #[serde(default)]
    pub unit: Option<String>,
    pub title: String,
    #[serde(default)]
    pub is_approved: Option<bool>,
    #[serde(default)]
    pub approval_status: Option<ApprovalStatus>,
}
document!(ReadingMaterial, "reading_materials");

impl ReadingMaterial {
    /// Unapproved or pending materials never count toward progress.
    pub fn is_countable(&self) -> bool {
        self.is_approved != Some(false) && self.approval_status != Some(ApprovalStatus::Pending)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub text: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub correct_option: usize,
    #[serde(default = "default_points")]
    pub points: f64,
}

fn default_points() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: String,
    pub course: String,
    #[serde(default)]
    pub unit: Option<String>,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub passing_score: f64,
    #[serde(default)]
    pub questions: Vec<Question>,
}
document!(Quiz, "quizzes");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedAnswer {
    pub question_index: usize,
    #[serde(default)]
    pub selected_option: Option<usize>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_correct: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub points_earned: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub id: String,
    pub student: String,
    pub quiz: String,
    pub course: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub answers: Vec<SelectedAnswer>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub max_score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub percentage: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub passed: bool,
    #[serde(
        default,
        serialize_with = "time::serde::rfc3339::option::serialize",
        deserialize_with = "lenient_rfc3339"
    )]
    pub started_at: Option<OffsetDateTime>,
    #[serde(
        default,
        serialize_with = "time::serde::rfc3339::option::serialize",
        deserialize_with = "lenient_rfc3339"
    )]
    pub completed_at: Option<OffsetDateTime>,
}
document!(QuizAttempt, "quiz_attempts");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSummary {
    pub quiz: String,
    #[serde(default)]
    pub attempt_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub percentage: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub passed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitProgress {
    pub unit_id: String,
    #[serde(default)]
    pub videos_watched: Vec<WatchEntry>,
    #[serde(default)]
    pub reading_materials_completed: Vec<String>,
    #[serde(default)]
    pub quiz_attempts: Vec<AttemptSummary>,
}

/// Per (student, course) aggregate maintained by the quiz and content flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentProgress {
    pub id: String,
    pub student: String,
    pub course: String,
    #[serde(default)]
    pub units: Vec<UnitProgress>,
}
document!(StudentProgress, "student_progress");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub school: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub courses: Vec<String>,
    #[serde(default)]
    pub students: Vec<String>,
}
document!(Section, "sections");

/// Teacher-Section-Course assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherAssignment {
    pub id: String,
    pub teacher: String,
    pub section: String,
    pub course: String,
}
document!(TeacherAssignment, "teacher_assignments");
