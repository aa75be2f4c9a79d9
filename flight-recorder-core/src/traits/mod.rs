pub mod session_backend;
pub mod transport;
