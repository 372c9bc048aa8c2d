//! Checks that parsed model output is exactly the question set that was asked
//! for, and converts it into [`QuestionSet`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::schemas::quiz::{OptionLabel, Question, QuestionOptions, QuestionSet};

static OPTION_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][\).]\s*").expect("option prefix regex is invalid"));

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum SchemaMismatch {
    #[error("expected a list of questions, found {0}")]
    NotAList(&'static str),
    #[error("expected {expected} questions, found {found}")]
    WrongCount { expected: usize, found: usize },
    #[error("question {index}: {reason}")]
    InvalidQuestion { index: usize, reason: String },
}

#[derive(Deserialize)]
struct RawQuestion {
    #[serde(alias = "pregunta")]
    prompt: Option<String>,
    #[serde(alias = "opciones")]
    options: Option<RawOptions>,
    #[serde(alias = "respuesta_correcta")]
    correct: Option<String>,
    #[serde(alias = "explicacion", default)]
    explanation: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawOptions {
    Labeled(BTreeMap<String, String>),
    Listed(Vec<String>),
}

/// Accepts `value` only when it is a list of exactly `expected` questions,
/// each with a non-empty prompt, four labeled options with distinct texts and
/// a correct label among them.
pub(crate) fn validate(value: Value, expected: usize) -> Result<QuestionSet, SchemaMismatch> {
    let items = match value {
        Value::Array(items) => items,
        other => return Err(SchemaMismatch::NotAList(json_kind(&other))),
    };

    if items.len() != expected {
        return Err(SchemaMismatch::WrongCount { expected, found: items.len() });
    }

    let questions = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            parse_question(item)
                .map_err(|reason| SchemaMismatch::InvalidQuestion { index: index + 1, reason })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(QuestionSet::new(questions))
}

fn parse_question(item: Value) -> Result<Question, String> {
    if !item.is_object() {
        return Err(format!("expected an object, found {}", json_kind(&item)));
    }
    let raw: RawQuestion = serde_json::from_value(item).map_err(|err| err.to_string())?;

    let prompt = raw
        .prompt
        .map(|prompt| prompt.trim().to_string())
        .filter(|prompt| !prompt.is_empty())
        .ok_or_else(|| "missing prompt".to_string())?;

    let options = match raw.options.ok_or_else(|| "missing options".to_string())? {
        RawOptions::Labeled(map) => labeled_options(map)?,
        RawOptions::Listed(list) => listed_options(list)?,
    };
    if options.has_duplicate_texts() {
        return Err("options repeat the same text".to_string());
    }

    let correct = raw
        .correct
        .as_deref()
        .and_then(OptionLabel::parse)
        .ok_or_else(|| format!("correct answer {:?} is not one of A-D", raw.correct))?;

    Ok(Question {
        prompt,
        options,
        correct,
        explanation: raw.explanation.unwrap_or_default().trim().to_string(),
    })
}

fn labeled_options(map: BTreeMap<String, String>) -> Result<QuestionOptions, String> {
    let mut texts: [Option<String>; 4] = Default::default();
    for (key, text) in map {
        let label = OptionLabel::parse(&key).ok_or_else(|| format!("unknown option label {key}"))?;
        texts[label as usize] = Some(text.trim().to_string());
    }
    collect_texts(texts)
}

/// Plain lists are labeled in order, dropping any `A)` or `B.` prefix the
/// model already wrote.
fn listed_options(list: Vec<String>) -> Result<QuestionOptions, String> {
    if list.len() != OptionLabel::ALL.len() {
        return Err(format!("expected 4 options, found {}", list.len()));
    }
    let mut texts: [Option<String>; 4] = Default::default();
    for (slot, text) in texts.iter_mut().zip(list) {
        *slot = Some(OPTION_PREFIX.replace(text.trim(), "").trim().to_string());
    }
    collect_texts(texts)
}

fn collect_texts(texts: [Option<String>; 4]) -> Result<QuestionOptions, String> {
    let mut collected: [String; 4] = Default::default();
    for (label, text) in OptionLabel::ALL.into_iter().zip(texts) {
        let text = text.ok_or_else(|| format!("missing option {label}"))?;
        if text.is_empty() {
            return Err(format!("option {label} is empty"));
        }
        collected[label as usize] = text;
    }
    Ok(QuestionOptions::from_texts(collected))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
