//! Flyer endpoints
//!
//! Rendering is CPU bound, so it runs on the blocking pool and the
//! connection task only waits for the encoded PNG.

use std::sync::Arc;

use chrono::Utc;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;

use crate::config::AppState;
use crate::flyer::{self, MeetingState};
use crate::http;
use crate::logger;

pub async fn serve_flyer(
    state: Arc<AppState>,
    meeting_state: MeetingState,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let rendered = tokio::task::spawn_blocking(move || {
        let page = flyer::render(
            meeting_state,
            &state.config.flyer,
            &state.schedule,
            &Utc::now(),
            &mut rand::thread_rng(),
        )?;
        flyer::encode_png(&page)
    })
    .await;

    match rendered {
        Ok(Ok(png)) => {
            logger::log_debug(&format!(
                "Rendered {meeting_state:?} flyer ({} bytes)",
                png.len()
            ));
            http::build_png_response(Bytes::from(png), is_head)
        }
        Ok(Err(e)) => {
            logger::log_error(&format!("Failed to render {meeting_state:?} flyer: {e}"));
            http::build_500_response()
        }
        Err(e) => {
            logger::log_error(&format!("Render task did not complete: {e}"));
            http::build_500_response()
        }
    }
}
