//! Upload and conversion pipeline.
//!
//! - [`service::PackService`] ingests uploads (stream, hash, validate,
//!   record) and serves the lookup and delete surface.
//! - [`orchestrator::ConversionOrchestrator`] creates conversion jobs and
//!   runs them on background tasks through a [`converter::PackConverter`].

pub mod config;
pub mod converter;
pub mod error;
pub mod orchestrator;
pub mod service;
pub mod store;
