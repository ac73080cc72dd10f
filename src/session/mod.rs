pub(crate) mod app;
pub(crate) mod config;
pub(crate) mod context;
pub(crate) mod events;
pub(crate) mod pacing;
