//! Integration tests for application classification.

#[path = "apps/classification.rs"]
mod classification;
