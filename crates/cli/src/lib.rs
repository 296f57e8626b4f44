//! fillform-cli: the `fillform` server and its concrete collaborators.
//!
//! - [`config`] -- YAML configuration loading and validation
//! - [`render`] -- minijinja templates, timestamp filters, Markdown
//! - [`mail`] -- SMTP notification delivery
//! - [`serve`] -- the axum HTTP surface

pub mod config;
pub mod mail;
pub mod render;
pub mod serve;
