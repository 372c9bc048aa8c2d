use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::db::models::UnitSummary;
use crate::schemas::quiz::{Choice, OptionLabel, Question};
use crate::services::quiz_session::{Page, QuizSession};

#[derive(Debug, Serialize)]
pub(crate) struct AnnouncementResponse {
    pub(crate) announcement: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct UnitResponse {
    pub(crate) config_id: String,
    pub(crate) unit: String,
    pub(crate) show_feedback: bool,
    pub(crate) available: bool,
}

impl UnitResponse {
    pub(crate) fn from_db(unit: UnitSummary) -> Self {
        Self {
            config_id: unit.config_id,
            unit: unit.unit,
            show_feedback: unit.show_feedback,
            available: unit.is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StartSessionRequest {
    pub(crate) config_id: String,
}

/// `choice: null` (or omitted) submits without a selection.
#[derive(Debug, Deserialize)]
pub(crate) struct AnswerRequest {
    #[serde(default)]
    pub(crate) choice: Option<OptionLabel>,
}

impl AnswerRequest {
    pub(crate) fn choice(&self) -> Choice {
        Choice::from(self.choice)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionView {
    pub(crate) number: usize,
    pub(crate) prompt: String,
    pub(crate) options: BTreeMap<OptionLabel, String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FeedbackView {
    pub(crate) selected: Option<OptionLabel>,
    pub(crate) correct: bool,
    pub(crate) correct_label: OptionLabel,
    pub(crate) correct_text: String,
    pub(crate) explanation: String,
}

impl FeedbackView {
    fn new(question: &Question, choice: Choice) -> Self {
        Self {
            selected: choice.label(),
            correct: choice.is_correct_for(question),
            correct_label: question.correct,
            correct_text: question.correct_text().to_string(),
            explanation: question.explanation.clone(),
        }
    }
}

/// One question of a finished attempt with the student's answer.
#[derive(Debug, Serialize)]
pub(crate) struct ReviewItem {
    pub(crate) number: usize,
    pub(crate) prompt: String,
    pub(crate) options: BTreeMap<OptionLabel, String>,
    pub(crate) selected: Option<OptionLabel>,
    pub(crate) correct_label: OptionLabel,
    pub(crate) correct: bool,
    pub(crate) explanation: String,
}

pub(crate) fn review_items(questions: &[Question], answers: &[Choice]) -> Vec<ReviewItem> {
    questions
        .iter()
        .enumerate()
        .map(|(idx, question)| {
            let choice = answers.get(idx).copied().unwrap_or(Choice::NoAnswer);
            ReviewItem {
                number: idx + 1,
                prompt: question.prompt.clone(),
                options: question.options.clone().into(),
                selected: choice.label(),
                correct_label: question.correct,
                correct: choice.is_correct_for(question),
                explanation: question.explanation.clone(),
            }
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub(crate) struct ResultView {
    pub(crate) score: u32,
    pub(crate) total: usize,
    pub(crate) grade: f64,
    pub(crate) saved: bool,
    pub(crate) review: Vec<ReviewItem>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SessionResponse {
    pub(crate) page: Page,
    pub(crate) config_id: Option<String>,
    pub(crate) subject: Option<String>,
    pub(crate) unit: Option<String>,
    pub(crate) show_feedback: Option<bool>,
    pub(crate) total: usize,
    pub(crate) answered: usize,
    pub(crate) question: Option<QuestionView>,
    pub(crate) feedback: Option<FeedbackView>,
    pub(crate) result: Option<ResultView>,
}

impl SessionResponse {
    /// Student-facing view. Correct answers only appear once revealed in
    /// feedback mode or after the attempt is finished.
    pub(crate) fn from_session(session: &QuizSession, grade_scale: f64) -> Self {
        let unit = session.unit();
        let show_feedback = unit.is_some_and(|unit| unit.show_feedback);

        let question = session.current_question().map(|question| QuestionView {
            number: session.current_index() + 1,
            prompt: question.display_prompt(show_feedback).to_string(),
            options: question.options.clone().into(),
        });

        let feedback = match (session.current_question(), session.answers().last()) {
            (Some(question), Some(choice)) if session.feedback_shown() => {
                Some(FeedbackView::new(question, *choice))
            }
            _ => None,
        };

        let result = (session.page() == Page::Finished).then(|| ResultView {
            score: session.score(),
            total: session.total(),
            grade: session.grade(grade_scale),
            saved: session.result_saved(),
            review: review_items(session.questions(), session.answers()),
        });

        Self {
            page: session.page(),
            config_id: unit.map(|unit| unit.config_id.clone()),
            subject: unit.map(|unit| unit.subject.clone()),
            unit: unit.map(|unit| unit.unit.clone()),
            show_feedback: unit.map(|unit| unit.show_feedback),
            total: session.total(),
            answered: session.answers().len(),
            question,
            feedback,
            result,
        }
    }
}
