//! Administrator-editable runtime settings stored as key/value rows.

use crate::core::config::Settings;
use crate::repositories::store::{QuizStore, StoreError};
use crate::schemas::settings::{GlobalSettingsResponse, GlobalSettingsUpdate};
use crate::services::quiz_generation::DEFAULT_PROMPT_TEMPLATE;

pub(crate) const ANNOUNCEMENT: &str = "announcement";
pub(crate) const AI_MODEL: &str = "ai_model";
pub(crate) const AI_PROMPT: &str = "ai_prompt";

/// Stored values, falling back to the process configuration and the built-in
/// prompt when a key was never written.
pub(crate) async fn load(
    store: &dyn QuizStore,
    settings: &Settings,
) -> Result<GlobalSettingsResponse, StoreError> {
    let announcement = store.get_setting(ANNOUNCEMENT).await?.unwrap_or_default();
    let ai_model = store
        .get_setting(AI_MODEL)
        .await?
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| settings.ai().model.clone());
    let ai_prompt = store
        .get_setting(AI_PROMPT)
        .await?
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PROMPT_TEMPLATE.to_string());

    Ok(GlobalSettingsResponse { announcement, ai_model, ai_prompt })
}

pub(crate) async fn apply(
    store: &dyn QuizStore,
    update: &GlobalSettingsUpdate,
) -> Result<(), StoreError> {
    let entries = [
        (ANNOUNCEMENT, update.announcement.as_deref()),
        (AI_MODEL, update.ai_model.as_deref().map(str::trim)),
        (AI_PROMPT, update.ai_prompt.as_deref()),
    ];
    for (key, value) in entries {
        if let Some(value) = value {
            store.put_setting(key, value).await?;
            tracing::info!(key, "Global setting updated");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, MemoryStore};

    #[tokio::test]
    async fn defaults_apply_until_written() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        let settings = Settings::load().expect("settings");
        let store = MemoryStore::default();

        let initial = load(&store, &settings).await.unwrap();
        assert_eq!(initial.announcement, "");
        assert_eq!(initial.ai_model, settings.ai().model);
        assert_eq!(initial.ai_prompt, DEFAULT_PROMPT_TEMPLATE);

        let update = GlobalSettingsUpdate {
            announcement: Some("Prueba el viernes".to_string()),
            ai_model: Some(" models/gemini-flash ".to_string()),
            ai_prompt: None,
        };
        apply(&store, &update).await.unwrap();

        let current = load(&store, &settings).await.unwrap();
        assert_eq!(current.announcement, "Prueba el viernes");
        assert_eq!(current.ai_model, "models/gemini-flash");
        assert_eq!(current.ai_prompt, DEFAULT_PROMPT_TEMPLATE);
    }
}
