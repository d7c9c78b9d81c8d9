//! Messaging between the capture session and its host
//!
//! The session reports every state change and each pipeline outcome on a
//! channel. This is the whole surface a UI or form layer depends on.

pub mod messages;

pub use messages::SessionEvent;
