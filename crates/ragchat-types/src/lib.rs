pub mod message;
pub mod session;
pub mod event;
pub mod config;
pub mod error;


pub use error::{ChatError, ErrorKind};
pub type Result<T> = std::result::Result<T, ChatError>;
