//! Chat session orchestration.

mod controller;

pub use controller::{ChatController, ChatTurn, SendOutcome, GREETING, SEND_ERROR_MESSAGE};
