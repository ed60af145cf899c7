//! Core use-case services.
//!
//! # Responsibility
//! - Compose validation and record stores into use-case level APIs.
//! - Keep callers (CLI, HTTP handlers) decoupled from storage details.

pub mod patient_service;
