//! Integration tests for the release catalog.

#[path = "catalog/loading.rs"]
mod loading;
