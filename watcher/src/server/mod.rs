//! Local HTTP surface for out-of-process render layers

pub mod handlers;
pub mod serve;
pub mod state;
