use serde::{Deserialize, Serialize};
use sqlx::Type;

/// Difficulty levels an administrator can pick for a unit. The serialized
/// form is the label substituted into the generation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "quizdifficulty", rename_all = "snake_case")]
pub(crate) enum Difficulty {
    #[serde(rename = "fácil/intermedio", alias = "easy_intermediate")]
    EasyIntermediate,
    #[serde(rename = "intermedio/avanzado", alias = "intermediate_advanced")]
    IntermediateAdvanced,
    #[serde(rename = "avanzado/difícil", alias = "advanced_hard")]
    AdvancedHard,
}

impl Difficulty {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::EasyIntermediate => "fácil/intermedio",
            Self::IntermediateAdvanced => "intermedio/avanzado",
            Self::AdvancedHard => "avanzado/difícil",
        }
    }
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::EasyIntermediate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_accepts_label_and_identifier() {
        let from_label: Difficulty = serde_json::from_str("\"fácil/intermedio\"").unwrap();
        let from_id: Difficulty = serde_json::from_str("\"advanced_hard\"").unwrap();
        assert_eq!(from_label, Difficulty::EasyIntermediate);
        assert_eq!(from_id, Difficulty::AdvancedHard);
        assert_eq!(serde_json::to_string(&from_id).unwrap(), "\"avanzado/difícil\"");
    }
}
