//! CPF/CNPJ Lookup API Library
//!
//! Validates Brazilian taxpayer identifiers, routes each lookup to one of
//! three upstream sources (company registry API, third-party person API,
//! CREA-MG portal scrape), and normalizes their payloads into one record.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core lookup logic.
//! - `integrations`: External source integrations.
//! - `config`: Configuration management.
//! - `dispatcher`: Source dispatch and the adapter contract.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.
//! - `normalizer`: Canonical field mapping.
//! - `portal`: CREA-MG portal scraper.
//! - `rate_limiter`: Per-caller sliding-window governor.
//! - `services`: Registry and person API clients.
//! - `validator`: CPF/CNPJ check digits and formatting.

pub mod api;
pub mod core;
pub mod integrations;

// Re-export primary modules for shared use in tests and the binary
pub mod config;
pub mod dispatcher;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod normalizer;
pub mod portal;
pub mod rate_limiter;
pub mod services;
pub mod validator;
