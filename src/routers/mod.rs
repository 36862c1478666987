pub mod chat;
pub mod error;
pub mod sketch;
pub mod uploads;
