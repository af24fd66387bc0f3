pub mod chat;
pub mod events;
pub mod results;
pub mod tools;
