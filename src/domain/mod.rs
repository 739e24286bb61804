// Market data domain
pub mod market;

// Signal and analysis domain
pub mod signal;

// Port interfaces
pub mod ports;

// Domain-specific error types
pub mod errors;
