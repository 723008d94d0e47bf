//! Lead Relay API Library
//!
//! Backend for the website chat assistant: relays chat turns to a hosted
//! Gemini model under a fixed persona, and appends captured leads to a Google
//! Sheets spreadsheet.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `credentials`: Service-account signing and access tokens.
//! - `errors`: Error types and their HTTP mapping.
//! - `gemini`: Chat relay to the model API.
//! - `handlers`: HTTP request handlers.
//! - `models`: Request, lead and sheet-row models.
//! - `prompt`: The assistant's system instruction.
//! - `routes`: Router and middleware assembly.
//! - `security`: Origin allow-list and security headers.
//! - `sheets`: Lead sink backed by Google Sheets.

pub mod config;
pub mod credentials;
pub mod errors;
pub mod gemini;
pub mod handlers;
pub mod models;
pub mod prompt;
pub mod routes;
pub mod security;
pub mod sheets;
