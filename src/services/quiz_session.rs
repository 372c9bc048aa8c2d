//! Per-student quiz state machine: `start -> in_progress -> finished`.
//!
//! A session is owned by one student and mutated only by that student's
//! actions. Finishing computes the grade; the attempt is written through
//! [`QuizSession::persist_once`], which never writes twice for one run.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;

use crate::db::models::{NewAttempt, QuizConfig};
use crate::repositories::store::{AttemptRecorder, StoreError};
use crate::schemas::quiz::{Choice, OptionLabel, Question, QuestionSet};
use crate::services::option_shuffle::shuffle_options;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Page {
    Start,
    InProgress,
    Finished,
}

impl Page {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::InProgress => "in_progress",
            Self::Finished => "finished",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum SessionError {
    #[error("unit {0} has no active question set")]
    InvalidSelection(String),
    #[error("cannot {action} while the session is {}", .page.as_str())]
    InvalidTransition { action: &'static str, page: Page },
    #[error("the current question was already answered")]
    AlreadyAnswered,
}

/// Unit details captured when the session starts, so later edits to the
/// configuration do not affect a running attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct SessionUnit {
    pub(crate) config_id: String,
    pub(crate) subject: String,
    pub(crate) unit: String,
    pub(crate) show_feedback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SubmitOutcome {
    /// Feedback mode: the answer is revealed and `next` must follow.
    Feedback { correct: bool, correct_label: OptionLabel, explanation: String },
    Advanced,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NextOutcome {
    Advanced,
    Finished,
}

#[derive(Debug, Clone)]
pub(crate) struct QuizSession {
    page: Page,
    unit: Option<SessionUnit>,
    questions: Vec<Question>,
    current: usize,
    answers: Vec<Choice>,
    score: u32,
    feedback_shown: bool,
    result_saved: bool,
}

impl Default for QuizSession {
    fn default() -> Self {
        Self {
            page: Page::Start,
            unit: None,
            questions: Vec::new(),
            current: 0,
            answers: Vec::new(),
            score: 0,
            feedback_shown: false,
            result_saved: false,
        }
    }
}

impl QuizSession {
    pub(crate) fn page(&self) -> Page {
        self.page
    }

    pub(crate) fn unit(&self) -> Option<&SessionUnit> {
        self.unit.as_ref()
    }

    pub(crate) fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub(crate) fn current_index(&self) -> usize {
        self.current
    }

    pub(crate) fn current_question(&self) -> Option<&Question> {
        match self.page {
            Page::InProgress => self.questions.get(self.current),
            _ => None,
        }
    }

    pub(crate) fn answers(&self) -> &[Choice] {
        &self.answers
    }

    pub(crate) fn score(&self) -> u32 {
        self.score
    }

    pub(crate) fn total(&self) -> usize {
        self.questions.len()
    }

    pub(crate) fn feedback_shown(&self) -> bool {
        self.feedback_shown
    }

    pub(crate) fn result_saved(&self) -> bool {
        self.result_saved
    }

    /// Starts an attempt on `config` using its active question set.
    ///
    /// Without immediate feedback the whole set is reordered first; the set is
    /// then cut to the configured size and each question's options are
    /// shuffled independently.
    pub(crate) fn start<R: Rng + ?Sized>(
        &mut self,
        config: &QuizConfig,
        active: Option<&QuestionSet>,
        rng: &mut R,
    ) -> Result<(), SessionError> {
        if self.page != Page::Start {
            return Err(SessionError::InvalidTransition { action: "start", page: self.page });
        }

        let selection_error = || SessionError::InvalidSelection(config.unit.clone());
        let set = active.filter(|set| !set.is_empty()).ok_or_else(selection_error)?;

        let mut questions = set.questions().to_vec();
        if !config.show_feedback {
            questions.shuffle(rng);
        }
        questions.truncate(config.question_count());
        if questions.is_empty() {
            return Err(selection_error());
        }
        let questions =
            questions.iter().map(|question| shuffle_options(question, &mut *rng)).collect();

        *self = Self {
            page: Page::InProgress,
            unit: Some(SessionUnit {
                config_id: config.id.clone(),
                subject: config.subject.clone(),
                unit: config.unit.clone(),
                show_feedback: config.show_feedback,
            }),
            questions,
            ..Self::default()
        };
        Ok(())
    }

    pub(crate) fn submit(&mut self, choice: Choice) -> Result<SubmitOutcome, SessionError> {
        let question = self
            .current_question()
            .cloned()
            .ok_or(SessionError::InvalidTransition { action: "submit", page: self.page })?;
        if self.feedback_shown {
            return Err(SessionError::AlreadyAnswered);
        }

        let correct = choice.is_correct_for(&question);
        self.answers.push(choice);
        if correct {
            self.score += 1;
        }

        if self.show_feedback() {
            self.feedback_shown = true;
            return Ok(SubmitOutcome::Feedback {
                correct,
                correct_label: question.correct,
                explanation: question.explanation,
            });
        }

        Ok(match self.advance() {
            NextOutcome::Advanced => SubmitOutcome::Advanced,
            NextOutcome::Finished => SubmitOutcome::Finished,
        })
    }

    /// Leaves the revealed answer in feedback mode.
    pub(crate) fn next(&mut self) -> Result<NextOutcome, SessionError> {
        if self.page != Page::InProgress || !self.feedback_shown {
            return Err(SessionError::InvalidTransition { action: "advance", page: self.page });
        }
        self.feedback_shown = false;
        Ok(self.advance())
    }

    /// `score / total * scale`; zero for an empty session.
    pub(crate) fn grade(&self, scale: f64) -> f64 {
        if self.questions.is_empty() {
            return 0.0;
        }
        f64::from(self.score) / self.questions.len() as f64 * scale
    }

    /// The attempt that still needs to be written, if any.
    pub(crate) fn pending_attempt(
        &self,
        student_id: &str,
        student_name: &str,
        scale: f64,
    ) -> Option<NewAttempt> {
        if self.page != Page::Finished || self.result_saved {
            return None;
        }
        let unit = self.unit.as_ref()?;

        Some(NewAttempt {
            student_id: student_id.to_string(),
            student_name: student_name.to_string(),
            config_id: unit.config_id.clone(),
            subject: unit.subject.clone(),
            unit: unit.unit.clone(),
            show_feedback: unit.show_feedback,
            score: i32::try_from(self.score).unwrap_or(i32::MAX),
            total_questions: i32::try_from(self.questions.len()).unwrap_or(i32::MAX),
            grade: self.grade(scale),
            questions: self.questions.clone(),
            answers: self.answers.clone(),
        })
    }

    /// Writes the finished attempt unless it was already written. The saved
    /// flag flips only after the store accepted the write, so a failed write
    /// is retried on the next render. Returns whether a write happened.
    pub(crate) async fn persist_once<R: AttemptRecorder + ?Sized>(
        &mut self,
        student_id: &str,
        student_name: &str,
        recorder: &R,
        scale: f64,
    ) -> Result<bool, StoreError> {
        let Some(attempt) = self.pending_attempt(student_id, student_name, scale) else {
            return Ok(false);
        };

        recorder.record_attempt(&attempt).await?;
        self.result_saved = true;
        Ok(true)
    }

    /// Nothing in flight: either not started or finished with the result
    /// already written.
    pub(crate) fn is_settled(&self) -> bool {
        match self.page {
            Page::Start => true,
            Page::InProgress => false,
            Page::Finished => self.result_saved,
        }
    }

    /// Drops everything and returns to `start`.
    pub(crate) fn restart(&mut self) {
        *self = Self::default();
    }

    fn show_feedback(&self) -> bool {
        self.unit.as_ref().is_some_and(|unit| unit.show_feedback)
    }

    fn advance(&mut self) -> NextOutcome {
        if self.current + 1 >= self.questions.len() {
            self.page = Page::Finished;
            NextOutcome::Finished
        } else {
            self.current += 1;
            NextOutcome::Advanced
        }
    }
}
