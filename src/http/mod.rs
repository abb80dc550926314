//! HTTP protocol layer module
//!
//! Response builders and content-type helpers, decoupled from the flyer and
//! upload logic.

pub mod mime;
pub mod response;

// Re-export commonly used types
pub use response::{
    build_404_response, build_405_response, build_500_response, build_error_page,
    build_health_response, build_html_response, build_png_response,
};
