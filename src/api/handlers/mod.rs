pub mod chat;
pub mod connection;

pub use connection::AppState;
