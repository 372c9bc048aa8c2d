use rand::seq::SliceRandom;
use rand::Rng;

use crate::schemas::quiz::{Question, QuestionOptions};

/// Permutes the option texts over `A`..`D` and points the correct label at
/// wherever the correct text landed. Matching is by text, first match wins.
pub(crate) fn shuffle_options<R: Rng + ?Sized>(question: &Question, rng: &mut R) -> Question {
    let correct_text = question.correct_text().to_string();
    let mut texts = question.options.texts().clone();
    texts.shuffle(rng);

    let options = QuestionOptions::from_texts(texts);
    let correct = options.label_of(&correct_text).unwrap_or(question.correct);

    Question {
        prompt: question.prompt.clone(),
        options,
        correct,
        explanation: question.explanation.clone(),
    }
}
