//! Request / response DTO types.
//!
//! These types are used by Axum handlers for JSON serialisation and are
//! annotated with [`utoipa`] attributes to generate an OpenAPI 3.0 schema.

pub mod modules;
