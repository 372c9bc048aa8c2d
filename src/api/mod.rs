pub(crate) mod admin;
pub(crate) mod errors;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod pagination;
pub(crate) mod quiz;
pub(crate) mod results;
pub(crate) mod router;
