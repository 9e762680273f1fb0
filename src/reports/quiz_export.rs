//! Per-attempt quiz report as CSV.

use csv::WriterBuilder;
use time::format_description::well_known::Rfc3339;

use super::{Analytics, RequestContext};
use crate::{
    error::{Error, Result},
    model::{Quiz, QuizAttempt, SelectedAnswer, Student},
    utils::round2,
};

const OPTION_COLUMNS: usize = 4;

pub const COLUMNS: [&str; 11] = [
    "Q#",
    "Question",
    "Option A",
    "Option B",
    "Option C",
    "Option D",
    "Student Answer",
    "Correct Answer",
    "Status",
    "Points Earned",
    "Max Points",
];

#[derive(Debug, Clone)]
pub struct QuizReport {
    pub file_name: String,
    pub body: String,
}

fn option_label(index: usize) -> String {
    match u8::try_from(index) {
        Ok(i) if i < 26 => char::from(b'A' + i).to_string(),
        _ => (index + 1).to_string(),
    }
}

fn answer_text(quiz_options: &[String], index: usize) -> String {
    match quiz_options.get(index) {
        Some(text) => format!("{}. {}", option_label(index), text),
        None => option_label(index),
    }
}

#[derive(Default)]
struct Tally {
    correct: usize,
    incorrect: usize,
    unanswered: usize,
    points: f64,
    max_points: f64,
}

/// Render one attempt: header block, question table, summary footer.
pub fn render_quiz_report(attempt: &QuizAttempt, quiz: &Quiz, student: &Student) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    writer.write_record(["Quiz Report"])?;
    writer.write_record(["Student", student.name.as_str()])?;
    writer.write_record(["Registration Number", student.registration_no.as_str()])?;
    writer.write_record(["Quiz", quiz.title.as_str()])?;
    writer.write_record([
        "Score".to_string(),
        format!("{} / {}", round2(attempt.score), round2(attempt.max_score)),
    ])?;
    writer.write_record(["Percentage".to_string(), format!("{}%", round2(attempt.percentage))])?;
    writer.write_record(["Status", if attempt.passed { "Passed" } else { "Failed" }])?;
    let completed = match attempt.completed_at {
        Some(at) => at.format(&Rfc3339).map_err(|e| Error::Fatal(e.into()))?,
        None => String::new(),
    };
    writer.write_record(["Completed At", completed.as_str()])?;
    blank_line(&mut writer)?;

    writer.write_record(COLUMNS)?;
    let mut tally = Tally::default();
    for (index, question) in quiz.questions.iter().enumerate() {
        let answer: Option<&SelectedAnswer> =
            attempt.answers.iter().find(|a| a.question_index == index);
        let selected = answer.and_then(|a| a.selected_option);
        let (status, earned) = match (answer, selected) {
            (Some(a), Some(_)) if a.is_correct => {
                tally.correct += 1;
                ("Correct", a.points_earned)
            }
            (Some(a), Some(_)) => {
                tally.incorrect += 1;
                ("Incorrect", a.points_earned)
            }
            _ => {
                tally.unanswered += 1;
                ("Not Answered", 0.0)
            }
        };
        tally.points += earned;
        tally.max_points += question.points;

        let mut record = Vec::with_capacity(COLUMNS.len());
        record.push((index + 1).to_string());
        record.push(question.text.clone());
        for option in 0..OPTION_COLUMNS {
            record.push(question.options.get(option).cloned().unwrap_or_default());
        }
        record.push(
            selected
                .map(|s| answer_text(&question.options, s))
                .unwrap_or_default(),
        );
        record.push(answer_text(&question.options, question.correct_option));
        record.push(status.to_string());
        record.push(round2(earned).to_string());
        record.push(round2(question.points).to_string());
        writer.write_record(&record)?;
    }
    blank_line(&mut writer)?;

    writer.write_record(["Summary"])?;
    writer.write_record(["Total Questions".to_string(), quiz.questions.len().to_string()])?;
    writer.write_record(["Correct".to_string(), tally.correct.to_string()])?;
    writer.write_record(["Incorrect".to_string(), tally.incorrect.to_string()])?;
    writer.write_record(["Not Answered".to_string(), tally.unanswered.to_string()])?;
    writer.write_record([
        "Points".to_string(),
        format!("{} / {}", round2(tally.points), round2(tally.max_points)),
    ])?;

    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Fatal(anyhow::anyhow!("flush csv: {}", e.error())))?;
    String::from_utf8(bytes).map_err(|e| Error::Fatal(e.into()))
}

fn blank_line(writer: &mut csv::Writer<Vec<u8>>) -> Result<()> {
    writer.flush().map_err(|e| Error::Fatal(e.into()))?;
    writer.get_mut().push(b'\n');
    Ok(())
}

fn file_name(student: &Student, quiz: &Quiz) -> String {
    let clean = |s: &str| -> String {
        s.chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect()
    };
    format!(
        "quiz_report_{}_{}.csv",
        clean(&student.registration_no),
        clean(&quiz.title)
    )
}

impl Analytics {
    pub async fn quiz_report(&self, ctx: &RequestContext, attempt_id: &str) -> Result<QuizReport> {
        let attempt = self
            .store
            .get::<QuizAttempt>(attempt_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("quiz attempt {attempt_id}")))?;
        if !ctx.scope.contains_course(&attempt.course) {
            return Err(Error::Forbidden(format!(
                "quiz attempt {attempt_id} is outside your scope"
            )));
        }
        let quiz = self
            .store
            .get::<Quiz>(&attempt.quiz)
            .await?
            .ok_or_else(|| Error::NotFound(format!("quiz {}", attempt.quiz)))?;
        let student = self
            .store
            .get::<Student>(&attempt.student)
            .await?
            .ok_or_else(|| Error::NotFound(format!("student {}", attempt.student)))?;

        let body = render_quiz_report(&attempt, &quiz, &student)?;
        Ok(QuizReport {
            file_name: file_name(&student, &quiz),
            body,
        })
    }
}
