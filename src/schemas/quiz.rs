//! Question shapes shared by generation, storage, sessions and the API.
//!
//! A [`Question`] always carries all four option labels, so the correct label
//! resolves to an option by construction. Payloads written by the previous
//! Spanish-keyed format (`pregunta`, `opciones`, `respuesta_correcta`,
//! `explicacion`) are still accepted on input.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub(crate) enum OptionLabel {
    A,
    B,
    C,
    D,
}

impl OptionLabel {
    pub(crate) const ALL: [OptionLabel; 4] =
        [OptionLabel::A, OptionLabel::B, OptionLabel::C, OptionLabel::D];

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }

    pub(crate) fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "A" | "a" => Some(Self::A),
            "B" | "b" => Some(Self::B),
            "C" | "c" => Some(Self::C),
            "D" | "d" => Some(Self::D),
            _ => None,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<OptionLabel, String>",
    into = "BTreeMap<OptionLabel, String>"
)]
pub(crate) struct QuestionOptions([String; 4]);

impl QuestionOptions {
    pub(crate) fn from_texts(texts: [String; 4]) -> Self {
        Self(texts)
    }

    pub(crate) fn get(&self, label: OptionLabel) -> &str {
        &self.0[label.index()]
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (OptionLabel, &str)> {
        OptionLabel::ALL.into_iter().map(move |label| (label, self.get(label)))
    }

    pub(crate) fn texts(&self) -> &[String; 4] {
        &self.0
    }

    /// First label whose text equals `text`.
    pub(crate) fn label_of(&self, text: &str) -> Option<OptionLabel> {
        self.iter().find(|(_, candidate)| *candidate == text).map(|(label, _)| label)
    }

    pub(crate) fn has_duplicate_texts(&self) -> bool {
        self.0.iter().enumerate().any(|(idx, text)| self.0[idx + 1..].contains(text))
    }
}

impl TryFrom<BTreeMap<OptionLabel, String>> for QuestionOptions {
    type Error = String;

    fn try_from(mut map: BTreeMap<OptionLabel, String>) -> Result<Self, Self::Error> {
        let mut texts: [String; 4] = Default::default();
        for label in OptionLabel::ALL {
            texts[label.index()] =
                map.remove(&label).ok_or_else(|| format!("missing option {label}"))?;
        }
        Ok(Self(texts))
    }
}

impl From<QuestionOptions> for BTreeMap<OptionLabel, String> {
    fn from(options: QuestionOptions) -> Self {
        OptionLabel::ALL.into_iter().zip(options.0).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Question {
    #[serde(alias = "pregunta")]
    pub(crate) prompt: String,
    #[serde(alias = "opciones")]
    pub(crate) options: QuestionOptions,
    #[serde(alias = "respuesta_correcta")]
    pub(crate) correct: OptionLabel,
    #[serde(alias = "explicacion", default)]
    pub(crate) explanation: String,
}

impl Question {
    pub(crate) fn correct_text(&self) -> &str {
        self.options.get(self.correct)
    }

    /// Self-paced evaluative units only show the final paragraph, which holds
    /// the actual question; the leading context paragraphs are hidden.
    pub(crate) fn display_prompt(&self, show_feedback: bool) -> &str {
        if show_feedback {
            return &self.prompt;
        }
        self.prompt.rsplit("\n\n").next().unwrap_or(&self.prompt)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct QuestionSet(Vec<Question>);

impl QuestionSet {
    pub(crate) fn new(questions: Vec<Question>) -> Self {
        Self(questions)
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn questions(&self) -> &[Question] {
        &self.0
    }
}

/// A student's response to one question. Submitting without a selection is
/// recorded as [`Choice::NoAnswer`], which serializes as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<OptionLabel>", into = "Option<OptionLabel>")]
pub(crate) enum Choice {
    Selected(OptionLabel),
    NoAnswer,
}

impl Choice {
    pub(crate) fn label(self) -> Option<OptionLabel> {
        match self {
            Self::Selected(label) => Some(label),
            Self::NoAnswer => None,
        }
    }

    pub(crate) fn is_correct_for(self, question: &Question) -> bool {
        self.label() == Some(question.correct)
    }
}

impl From<Option<OptionLabel>> for Choice {
    fn from(value: Option<OptionLabel>) -> Self {
        value.map(Self::Selected).unwrap_or(Self::NoAnswer)
    }
}

impl From<Choice> for Option<OptionLabel> {
    fn from(choice: Choice) -> Self {
        choice.label()
    }
}
