pub mod error_code;
pub mod handler;
pub mod message;
pub mod session;

pub use handler::{chat_ws_handler, viewers_ws_handler, AppState};
