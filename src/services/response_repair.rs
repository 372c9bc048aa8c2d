//! Coerces a free-text model completion into JSON.
//!
//! The rules are heuristics tuned to how generative models answer when asked
//! for "only JSON": code fences around the payload, commentary before or after
//! the array, and LaTeX backslashes that were never escaped.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

static ARRAY_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[.*\]").expect("array span regex is invalid"));

/// Characters that may legitimately follow a backslash in JSON.
const SAFE_ESCAPES: &[char] = &['"', '\\', '/', 'b', 'f', 'n', 'r', 't'];

/// LaTeX commands starting with `n` that would otherwise decode as a newline.
const LATEX_N_COMMANDS: &[&str] = &[
    "nabla", "ne", "neg", "neq", "newline", "ni", "nleq", "ngeq", "nmid", "not", "notin", "nu",
    "nexists", "nearrow", "nwarrow", "nsubseteq", "nolimits",
];

const EXCERPT_CHARS: usize = 200;

#[derive(Debug, Error)]
#[error("model response is not valid JSON after repair: {source} (near: {excerpt})")]
pub(crate) struct MalformedResponse {
    #[source]
    source: serde_json::Error,
    excerpt: String,
}

/// Repairs `raw` and parses it. Fails without further guessing when the
/// repaired text is still not JSON.
pub(crate) fn repair(raw: &str) -> Result<Value, MalformedResponse> {
    let repaired = normalize(raw);
    serde_json::from_str(&repaired).map_err(|source| MalformedResponse {
        excerpt: repaired.chars().take(EXCERPT_CHARS).collect(),
        source,
    })
}

pub(crate) fn normalize(raw: &str) -> String {
    let unfenced = strip_code_fence(raw.trim());
    let span = ARRAY_SPAN.find(unfenced).map(|found| found.as_str()).unwrap_or(unfenced);
    escape_stray_backslashes(span.trim())
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string (`json`, `JSON`, ...) up to the end of the line.
    let body = match rest.find('\n') {
        Some(newline) if rest[..newline].chars().all(|c| c.is_ascii_alphanumeric()) => {
            &rest[newline + 1..]
        }
        _ => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Doubles every backslash that is neither preceded by a backslash nor
/// followed by a JSON escape character. A few escape characters are also
/// doubled when they clearly start a LaTeX command (`\frac`, `\theta`,
/// `\nabla`), and `\uXXXX` escapes are left intact.
fn escape_stray_backslashes(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut output = String::with_capacity(text.len() + 16);

    for (idx, &current) in chars.iter().enumerate() {
        output.push(current);
        if current != '\\' {
            continue;
        }

        let preceded_by_backslash = idx > 0 && chars[idx - 1] == '\\';
        if preceded_by_backslash {
            continue;
        }

        let next = chars.get(idx + 1).copied();
        let is_json_escape = match next {
            Some('u') => is_unicode_escape(&chars[idx + 2..]),
            Some(c) if SAFE_ESCAPES.contains(&c) => !starts_latex_command(&chars[idx + 1..]),
            _ => false,
        };
        if !is_json_escape {
            output.push('\\');
        }
    }

    output
}

fn is_unicode_escape(rest: &[char]) -> bool {
    rest.len() >= 4 && rest[..4].iter().all(char::is_ascii_hexdigit)
}

fn starts_latex_command(rest: &[char]) -> bool {
    let word: String = rest.iter().take_while(|c| c.is_ascii_alphabetic()).collect();
    match rest.first() {
        Some('b' | 'f' | 'r' | 't') => word.len() > 1,
        Some('n') => LATEX_N_COMMANDS.contains(&word.as_str()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fenced_latex_is_escaped_and_decodes_literally() {
        let raw = "```json\n[{\"prompt\": \"Calcula \\frac{1}{2}\"}]\n```";
        let value = repair(raw).expect("repaired");
        assert_eq!(value[0]["prompt"], "Calcula \\frac{1}{2}");
        assert_eq!(value[0]["prompt"].as_str().unwrap(), r"Calcula \frac{1}{2}");
    }

    #[test]
    fn commentary_around_the_array_is_dropped() {
        let raw = "Aquí está tu quiz:\n[{\"prompt\": \"p\"}]\nEspero que sirva.";
        assert_eq!(repair(raw).expect("repaired"), json!([{"prompt": "p"}]));
    }

    #[test]
    fn array_span_is_greedy_to_last_bracket() {
        let raw = "[{\"prompt\": \"[a]\"}, {\"prompt\": \"b\"}] trailing ] noise";
        assert!(repair(raw).is_err());
        let raw = "note [{\"prompt\": \"[a]\"}, {\"prompt\": \"b\"}]";
        assert_eq!(repair(raw).unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn valid_escapes_are_preserved() {
        let raw = r#"[{"prompt": "linea\nnueva \"cita\" a\/b \\alpha \u00e9"}]"#;
        let value = repair(raw).expect("repaired");
        assert_eq!(value[0]["prompt"], "linea\nnueva \"cita\" a/b \\alpha é");
    }

    #[test]
    fn latex_commands_shadowing_escapes_are_doubled() {
        let raw = r#"[{"prompt": "$\theta + \beta \neq \nabla \rho$", "x": "uno\ndos"}]"#;
        let value = repair(raw).expect("repaired");
        assert_eq!(value[0]["prompt"], r"$\theta + \beta \neq \nabla \rho$");
        assert_eq!(value[0]["x"], "uno\ndos");
    }

    #[test]
    fn escape_directly_followed_by_letters_reads_as_latex() {
        // `\tFinal` is a valid tab escape, but it is indistinguishable from a
        // LaTeX command and is kept literally. A tab before a space survives.
        let raw = r#"[{"prompt": "Paso\tFinal", "x": "col\t 2"}]"#;
        let value = repair(raw).expect("repaired");
        assert_eq!(value[0]["prompt"], r"Paso\tFinal");
        assert_eq!(value[0]["x"], "col\t 2");
    }

    #[test]
    fn repair_is_idempotent_on_valid_json() {
        let inputs = [
            r#"[{"prompt": "\\frac{1}{2} y \n", "opciones": {"A": "\\sqrt{2}"}}]"#,
            r#"[{"prompt": "$\frac{a}{b}$ \sum_i x_i"}]"#,
            "```\n[1, 2, 3]\n```",
        ];
        for raw in inputs {
            let once = normalize(raw);
            let twice = normalize(&once);
            let first: Value = serde_json::from_str(&once).expect("first pass parses");
            let second: Value = serde_json::from_str(&twice).expect("second pass parses");
            assert_eq!(first, second, "input: {raw}");
        }
    }

    #[test]
    fn unparseable_text_is_malformed() {
        let err = repair("no hay JSON aquí").unwrap_err();
        assert!(err.to_string().contains("no hay JSON"));
        assert!(repair("[{\"prompt\": }]").is_err());
    }

    #[test]
    fn fence_without_language_tag_is_stripped() {
        assert_eq!(strip_code_fence("```\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence("```json [1] ```"), "[1]");
        assert_eq!(strip_code_fence("[1]"), "[1]");
    }
}
