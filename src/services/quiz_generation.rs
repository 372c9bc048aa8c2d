//! Turns a unit configuration into a validated question set by prompting the
//! text model, repairing its answer and retrying within a fixed bound.

use std::time::Duration;

use thiserror::Error;

use crate::core::metrics;
use crate::db::models::QuizConfig;
use crate::schemas::quiz::QuestionSet;
use crate::services::question_validation::{self, SchemaMismatch};
use crate::services::response_repair::{self, MalformedResponse};
use crate::services::text_generation::{
    GenerationRequest, SafetySettings, TextGenerationError, TextGenerator,
};

pub(crate) const DEFAULT_PROMPT_TEMPLATE: &str = r#"
## ROL ##
Eres un profesor universitario experto en {asignatura}.

## TAREA ##
Genera un quiz de {num_preguntas} preguntas de selección múltiple, de nivel {dificultad}, sobre: {temas_str}.
Responde solamente con un bloque JSON válido, sin texto antes ni después.

## FORMATO ##
1. La salida es una lista de {num_preguntas} objetos JSON.
2. Cada objeto tiene exactamente las claves "pregunta", "opciones", "respuesta_correcta" y "explicacion". Hay una sola opción correcta.
3. "pregunta" tiene tres párrafos separados por una línea en blanco:
   - una explicación breve del concepto con **palabras clave en negrita** y un enlace [Más información](URL);
   - por qué el concepto es importante;
   - **la pregunta, en negrita, situada en un escenario real**.
4. "opciones" es un objeto con las claves "A", "B", "C" y "D", con textos distintos entre sí.
5. Usa LaTeX entre signos de dólar ($...$) y escapa cada barra invertida dentro del JSON (\\frac{{1}}{{2}}).
6. "explicacion" es una resolución paso a paso de la respuesta correcta, sin comentar las opciones incorrectas.

## EJEMPLO ##
{{
  "pregunta": "La **derivada** mide la tasa de cambio instantánea. [Más información](https://es.wikipedia.org/wiki/Derivada)\n\nPermite modelar velocidades y optimizar procesos.\n\n**Si $f(x) = x^2$, ¿cuánto vale $f'(3)$?**",
  "opciones": {{"A": "$3$", "B": "$6$", "C": "$9$", "D": "$2$"}},
  "respuesta_correcta": "B",
  "explicacion": "Por la regla de la potencia $f'(x) = 2x$. Evaluando, $f'(3) = 6$."
}}

Genera ahora la lista de {num_preguntas} preguntas. Tu respuesta debe ser solo el JSON.
"#;

/// Bounded retry applied to the whole prompt, repair and validation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    pub(crate) max_attempts: u32,
    pub(crate) delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, delay: Duration::from_secs(1) }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum PromptError {
    #[error("unknown placeholder {{{0}}} in prompt template")]
    UnknownPlaceholder(String),
    #[error("unbalanced brace in prompt template at byte {0}")]
    UnbalancedBrace(usize),
}

/// Why a single attempt did not produce a question set.
#[derive(Debug, Error)]
pub(crate) enum AttemptError {
    #[error("the model returned no content")]
    NoContent,
    #[error(transparent)]
    Malformed(#[from] MalformedResponse),
    #[error(transparent)]
    Schema(#[from] SchemaMismatch),
    #[error(transparent)]
    Service(#[from] TextGenerationError),
}

impl AttemptError {
    fn outcome(&self) -> &'static str {
        match self {
            Self::NoContent => "no_content",
            Self::Malformed(_) => "malformed",
            Self::Schema(_) => "schema_mismatch",
            Self::Service(_) => "service_error",
        }
    }
}

/// Terminal failure after the retry bound was exhausted.
#[derive(Debug, Error)]
#[error("could not generate the quiz after {attempts} attempts: {last}")]
pub(crate) struct GenerationFailure {
    pub(crate) attempts: u32,
    #[source]
    pub(crate) last: AttemptError,
}

#[derive(Debug, Error)]
pub(crate) enum QuizGenerationError {
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Exhausted(#[from] GenerationFailure),
}

#[derive(Debug, Clone)]
pub(crate) struct Generated {
    pub(crate) questions: QuestionSet,
    pub(crate) attempts: u32,
}

pub(crate) struct QuizGenerator<'a> {
    generator: &'a dyn TextGenerator,
    policy: RetryPolicy,
}

impl<'a> QuizGenerator<'a> {
    pub(crate) fn new(generator: &'a dyn TextGenerator, policy: RetryPolicy) -> Self {
        Self { generator, policy }
    }

    pub(crate) async fn generate(
        &self,
        config: &QuizConfig,
        template: &str,
        model: &str,
    ) -> Result<Generated, QuizGenerationError> {
        let request = GenerationRequest {
            model: model.to_string(),
            prompt: render_prompt(template, config)?,
            safety: SafetySettings::most_permissive(),
        };
        let expected = config.question_count();
        let max_attempts = self.policy.max_attempts.max(1);

        let mut attempt = 1;
        loop {
            match self.attempt(&request, expected).await {
                Ok(questions) => {
                    metrics::record_generation_attempt("success");
                    tracing::info!(
                        config_id = %config.id,
                        subject = %config.subject,
                        unit = %config.unit,
                        attempt,
                        questions = questions.len(),
                        "Quiz generated"
                    );
                    return Ok(Generated { questions, attempts: attempt });
                }
                Err(err) => {
                    metrics::record_generation_attempt(err.outcome());
                    tracing::warn!(
                        config_id = %config.id,
                        attempt,
                        max_attempts,
                        outcome = err.outcome(),
                        error = %err,
                        "Quiz generation attempt failed"
                    );

                    if attempt >= max_attempts {
                        return Err(GenerationFailure { attempts: attempt, last: err }.into());
                    }
                }
            }

            attempt += 1;
            if !self.policy.delay.is_zero() {
                tokio::time::sleep(self.policy.delay).await;
            }
        }
    }

    async fn attempt(
        &self,
        request: &GenerationRequest,
        expected: usize,
    ) -> Result<QuestionSet, AttemptError> {
        let text = self.generator.generate(request).await?.ok_or(AttemptError::NoContent)?;
        let value = response_repair::repair(&text)?;
        Ok(question_validation::validate(value, expected)?)
    }
}

/// Substitutes `{asignatura}`, `{temas_str}`, `{num_preguntas}` and
/// `{dificultad}`. `{{` and `}}` produce literal braces.
pub(crate) fn render_prompt(template: &str, config: &QuizConfig) -> Result<String, PromptError> {
    substitute(template, |name| match name {
        "asignatura" => Some(config.subject.clone()),
        "temas_str" => Some(config.topics.join(", ")),
        "num_preguntas" => Some(config.question_count.to_string()),
        "dificultad" => Some(config.difficulty.label().to_string()),
        _ => None,
    })
}

/// Rejects templates that would fail to render for any unit.
pub(crate) fn check_template(template: &str) -> Result<(), PromptError> {
    const PLACEHOLDERS: [&str; 4] = ["asignatura", "temas_str", "num_preguntas", "dificultad"];
    substitute(template, |name| PLACEHOLDERS.contains(&name).then(String::new)).map(drop)
}

fn substitute(
    template: &str,
    resolve: impl Fn(&str) -> Option<String>,
) -> Result<String, PromptError> {
    let mut output = String::with_capacity(template.len() + 128);
    let mut rest = template;
    let mut offset = 0;

    while let Some(pos) = rest.find(['{', '}']) {
        output.push_str(&rest[..pos]);
        let brace = rest.as_bytes()[pos];
        let after = &rest[pos + 1..];

        if after.as_bytes().first() == Some(&brace) {
            output.push(char::from(brace));
            offset += pos + 2;
            rest = &after[1..];
            continue;
        }
        if brace == b'}' {
            return Err(PromptError::UnbalancedBrace(offset + pos));
        }

        let end = after.find('}').ok_or(PromptError::UnbalancedBrace(offset + pos))?;
        let name = &after[..end];
        let value = resolve(name).ok_or_else(|| PromptError::UnknownPlaceholder(name.to_string()))?;
        output.push_str(&value);
        offset += pos + end + 2;
        rest = &after[end + 1..];
    }

    output.push_str(rest);
    Ok(output)
}
