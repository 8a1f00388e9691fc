//! CNPJ Consultation API Library
//!
//! This library provides the core functionality for the CNPJ consultation
//! service: validating Brazilian company registry numbers, resolving them
//! against the public registries (ReceitaWS with BrasilAPI fallback),
//! caching results in Postgres and enforcing the per-product cooldown rule.
//!
//! # Modules
//!
//! - `cnpj`: CNPJ normalization, validation and formatting.
//! - `config`: Configuration management.
//! - `consultation`: Consultation workflow controller.
//! - `cooldown`: 3-month cooldown and 24h freshness rules.
//! - `db`: Database connection and pool management.
//! - `errors`: Error handling types.
//! - `fallback`: Primary → secondary registry fallback orchestration.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.
//! - `registry`: External registry clients (ReceitaWS, BrasilAPI).
//! - `storage`: Persistence layer (Store trait + Postgres implementation).

pub mod cnpj;
pub mod config;
pub mod consultation;
pub mod cooldown;
pub mod db;
pub mod errors;
pub mod fallback;
pub mod handlers;
pub mod models;
pub mod registry;
pub mod storage;
