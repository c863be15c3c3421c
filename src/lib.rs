//! Quizgen backend library: quiz generation over a local model, output sanitizing,
//! and the timed quiz session state machine. The binary in `main.rs` serves it over HTTP/WebSocket.

pub mod telemetry;
pub mod util;
pub mod domain;
pub mod error;
pub mod config;
pub mod ollama;
pub mod sanitizer;
pub mod saved;
pub mod share;
pub mod session;
pub mod state;
pub mod protocol;
pub mod logic;
pub mod routes;
