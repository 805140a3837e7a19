//! Prompt gateway for Musealum - answers cultural-discovery questions
//!
//! Forwards a visitor's free-text question to a hosted language model and
//! returns a normalized list of museums, events, exhibitions, festivals, and
//! cultural places that the explore page can render on a map.

pub mod ai;
pub mod app;
pub mod error;
pub mod gateway;
pub mod models;
pub mod prompts;
pub mod server;

pub use error::{Error, Result};
