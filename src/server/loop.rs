// Server loop module
// Accepts connections until shutdown, then lets in-flight requests drain

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Notify;

use super::connection::handle_connection;
use crate::config::AppState;
use crate::logger;

/// How often the drain loop re-checks the connection count
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Accept connections until `shutdown` is notified.
///
/// Each connection is served on its own task. After shutdown, waits up to
/// `drain_timeout` for open connections to finish.
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: Arc<Notify>,
    drain_timeout: Duration,
) {
    let active_connections = Arc::new(AtomicUsize::new(0));

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        handle_connection(
                            stream,
                            peer_addr,
                            Arc::clone(&state),
                            Arc::clone(&active_connections),
                        );
                    }
                    Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                }
            }

            () = shutdown.notified() => break,
        }
    }

    drop(listener);
    drain(&active_connections, drain_timeout).await;
}

async fn drain(active: &AtomicUsize, timeout: Duration) {
    let open = active.load(Ordering::SeqCst);
    if open == 0 {
        return;
    }
    logger::log_info(&format!("Waiting for {open} open connection(s) to finish"));

    let waited = tokio::time::timeout(timeout, async {
        while active.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(DRAIN_POLL).await;
        }
    })
    .await;

    if waited.is_err() {
        logger::log_warning(&format!(
            "{} connection(s) still open after {}s, closing anyway",
            active.load(Ordering::SeqCst),
            timeout.as_secs()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::server::create_reusable_listener;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_serves_until_shutdown() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cfg = Config::from_defaults();
        cfg.flyer.image_dir = dir.path().display().to_string();
        cfg.logging.access_log = false;
        let state = Arc::new(AppState::new(cfg, "pw".to_string()).unwrap());

        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let server = tokio::spawn(start_server_loop(
            listener,
            state,
            Arc::clone(&shutdown),
            Duration::from_secs(1),
        ));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /healthz HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut reply = String::new();
        stream.read_to_string(&mut reply).await.unwrap();
        assert!(reply.starts_with("HTTP/1.1 200 OK"), "{reply}");
        assert!(reply.ends_with("ok"));

        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_idle_connection_closed_after_keep_alive_timeout() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut cfg = Config::from_defaults();
        cfg.flyer.image_dir = dir.path().display().to_string();
        cfg.logging.access_log = false;
        cfg.performance.keep_alive_timeout = 1;
        let state = Arc::new(AppState::new(cfg, "pw".to_string()).unwrap());

        let listener = create_reusable_listener("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let server = tokio::spawn(start_server_loop(
            listener,
            state,
            Arc::clone(&shutdown),
            Duration::from_secs(1),
        ));

        // Connect and send nothing; the server hangs up well before the
        // 60s connection timeout
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let mut rest = Vec::new();
        let closed =
            tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut rest)).await;
        assert!(closed.is_ok(), "idle connection still open");

        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
    }
}
