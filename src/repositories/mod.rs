pub(crate) mod global_settings;
pub(crate) mod question_sets;
pub(crate) mod quiz_attempts;
pub(crate) mod quiz_configs;
pub(crate) mod store;
