// Public handlers: service root, health and platform token acquisition

pub mod auth;
pub mod root;
