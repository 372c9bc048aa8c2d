pub(crate) mod global_settings;
pub(crate) mod gradebook;
pub(crate) mod option_shuffle;
pub(crate) mod question_validation;
pub(crate) mod quiz_generation;
pub(crate) mod quiz_session;
pub(crate) mod response_repair;
pub(crate) mod session_registry;
pub(crate) mod text_generation;
