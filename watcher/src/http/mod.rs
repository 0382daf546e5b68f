//! Backend HTTP API

pub mod client;
pub mod deployments;

pub use client::HttpClient;
pub use deployments::StatusSource;
