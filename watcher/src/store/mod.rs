//! Resource state store

pub mod ranges;

pub use ranges::ResourceStore;
