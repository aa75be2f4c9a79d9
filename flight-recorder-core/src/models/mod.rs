pub mod config;
pub mod configuration;
pub mod error;
pub mod options;
pub mod state;
pub mod stream_request;
