pub mod chat;
pub mod update;
