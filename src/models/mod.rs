pub mod cache;
pub mod chat;
pub mod connection;

pub use cache::*;
pub use chat::*;
pub use connection::*;
