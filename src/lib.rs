//! Database inspection utilities - Library
//! Table-schema extraction over pluggable introspection providers

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod inspect;
pub mod render;

pub use error::SchemaError;
