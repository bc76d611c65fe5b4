//! Practice environment for the Dutch Inburgeringsexamen at A2 level.
//!
//! The server half proxies exercise generation and grading to the Gemini
//! API and keeps generated exercise sets in a short-lived in-memory store.
//! The client half holds the exam session state machine plus the capture
//! and playback machinery: a countdown timer, speech recording with
//! transcript reconciliation, and spoken playback with simulated progress.

pub mod config;
pub mod error;
pub mod gemini;
pub mod keepalive;
pub mod models;
pub mod playback;
pub mod prefs;
pub mod recording;
pub mod rules;
pub mod server;
pub mod session;
pub mod store;
