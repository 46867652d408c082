// Library crate for integration tests and the radeval binary.

pub mod adapters;
pub mod api;
pub mod case_builder;
pub mod catalog;
pub mod config;
pub mod error;
pub mod gallery;
pub mod images;
pub mod mutation;
pub mod records;
pub mod session;
pub mod types;
