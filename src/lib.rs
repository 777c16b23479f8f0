//! Naybourhood lead scoring service.
//!
//! Raw leads from CSV imports, web forms and CRM webhooks are normalized into
//! one canonical record, scored by a rules-based engine (quality, intent,
//! confidence, fake-lead check, 28-day buyer rule) and persisted with the flat
//! `ai_*` fields older reports read.
//!
//! # Modules
//!
//! - `status`: pipeline status normalization.
//! - `parsers`: date and budget parsing.
//! - `lead_normalizer`: raw lead -> canonical lead.
//! - `validation`: email and phone checks.
//! - `scoring`: the scoring engine.
//! - `legacy`: flat `ai_*` field mapping.
//! - `summary`: LLM and template lead summaries.
//! - `circuit_breaker`: breaker guarding the LLM endpoint.
//! - `config`: configuration management.
//! - `db` / `db_storage`: Postgres pool and lead persistence.
//! - `errors`: error handling types.
//! - `handlers`: HTTP request handlers.
//! - `webhook_handler` / `webhook_models`: lead-created webhook.

pub mod api;
pub mod core;
pub mod integrations;

pub mod circuit_breaker;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod handlers;
pub mod lead_normalizer;
pub mod legacy;
pub mod parsers;
pub mod scoring;
pub mod status;
pub mod summary;
pub mod validation;
pub mod webhook_handler;
pub mod webhook_models;
