//! Request handler module
//!
//! Route dispatch plus the two kinds of endpoint: flyer rendering and
//! photo upload.

pub mod draw;
pub mod router;
pub mod upload;

// Re-export main entry point
pub use router::handle_request;
