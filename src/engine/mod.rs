pub mod chat_engine;
pub mod events;
pub mod format;
pub mod registry;
pub mod user_session;
pub mod validation;
