//! HTTP server for receiving UPnP event notifications.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use warp::Filter;

use super::router::{DeviceRouter, NotifyPayload};

/// Errors raised while starting or stopping the callback server.
#[derive(Debug, Error)]
pub enum CallbackServerError {
    /// No free port could be bound in the configured range
    #[error("No available port found in range {start}-{end}")]
    NoAvailablePort {
        /// First port tried
        start: u16,
        /// Last port tried
        end: u16,
    },

    /// The local IP address for callback URLs could not be determined
    #[error("Failed to detect local IP address")]
    LocalIpDetection,

    /// The HTTP listener task never signalled readiness
    #[error("Server failed to start")]
    StartupFailed,
}

/// HTTP callback server for receiving UPnP event notifications.
///
/// The server binds one port for all devices and exposes one path per
/// registered device UDN. A request is accepted when its method is `NOTIFY`
/// and its path names a registered device; the buffered body is then handed
/// to the [`DeviceRouter`] and the device receives a 200 response. Unknown
/// identifiers are answered with 404.
///
/// # Example
///
/// ```no_run
/// use tokio::sync::mpsc;
/// use callback_server::{CallbackServer, NotifyPayload};
///
/// #[tokio::main]
/// async fn main() {
///     let (tx, mut rx) = mpsc::unbounded_channel::<NotifyPayload>();
///
///     let server = CallbackServer::new((3400, 3500), tx)
///         .await
///         .expect("Failed to create callback server");
///
///     server.router().register("uuid:Socket-1_0-SERIAL".to_string()).await;
///
///     while let Some(payload) = rx.recv().await {
///         println!("NOTIFY for {}", payload.device_id);
///     }
/// }
/// ```
pub struct CallbackServer {
    /// The port the server is bound to
    port: u16,
    /// The base URL for callback registration
    base_url: String,
    /// Router mapping device identifiers to the event channel
    router: Arc<DeviceRouter>,
    /// Shutdown signal sender
    shutdown_tx: Option<mpsc::Sender<()>>,
    /// Server task handle
    server_handle: Option<tokio::task::JoinHandle<()>>,
}

impl CallbackServer {
    /// Create and start a new callback server.
    ///
    /// Finds an available port in the given range, detects the local IP
    /// address for callback URLs, and starts the HTTP listener. The returned
    /// server is ready to accept NOTIFY requests.
    pub async fn new(
        port_range: (u16, u16),
        event_sender: mpsc::UnboundedSender<NotifyPayload>,
    ) -> Result<Self, CallbackServerError> {
        let port = Self::find_available_port(port_range.0, port_range.1).ok_or(
            CallbackServerError::NoAvailablePort {
                start: port_range.0,
                end: port_range.1,
            },
        )?;

        let local_ip = Self::detect_local_ip().ok_or(CallbackServerError::LocalIpDetection)?;
        let base_url = format!("http://{local_ip}:{port}");

        let router = Arc::new(DeviceRouter::new(event_sender));

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        let (ready_tx, mut ready_rx) = mpsc::channel::<()>(1);

        let server_handle = Self::start_server(port, router.clone(), shutdown_rx, ready_tx);

        ready_rx
            .recv()
            .await
            .ok_or(CallbackServerError::StartupFailed)?;

        Ok(Self {
            port,
            base_url,
            router,
            shutdown_tx: Some(shutdown_tx),
            server_handle: Some(server_handle),
        })
    }

    /// Get the base URL of the listener, without any device path.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the callback URL to hand to a device at subscription time.
    ///
    /// The device identifier becomes the final path segment, so inbound
    /// notifications can be demultiplexed per device.
    pub fn callback_url(&self, device_id: &str) -> String {
        format!("{}/{}", self.base_url, device_id)
    }

    /// Get the port the server is bound to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get a reference to the device router.
    pub fn router(&self) -> &Arc<DeviceRouter> {
        &self.router
    }

    /// Shutdown the callback server gracefully.
    ///
    /// Sends the shutdown signal and waits for in-flight requests to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }

        if let Some(handle) = self.server_handle.take() {
            let _ = handle.await;
        }
    }

    /// Find an available port in the given range.
    fn find_available_port(start: u16, end: u16) -> Option<u16> {
        (start..=end).find(|&port| Self::is_port_available(port))
    }

    /// Check if a port is available for binding.
    fn is_port_available(port: u16) -> bool {
        TcpListener::bind(SocketAddr::new(
            IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port,
        ))
        .is_ok()
    }

    /// Detect the local IP address for callback URLs.
    ///
    /// Uses a UDP socket connection to determine the local IP address that
    /// would be used for outbound connections. No data is actually sent.
    fn detect_local_ip() -> Option<IpAddr> {
        let socket = std::net::UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect("8.8.8.8:80").ok()?;
        let local_addr = socket.local_addr().ok()?;
        Some(local_addr.ip())
    }

    /// Start the HTTP listener on the given port.
    fn start_server(
        port: u16,
        router: Arc<DeviceRouter>,
        mut shutdown_rx: mpsc::Receiver<()>,
        ready_tx: mpsc::Sender<()>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let notify_route = warp::method()
                .and(warp::path::param::<String>())
                .and(warp::path::end())
                .and(warp::body::bytes())
                .and_then({
                    let router = router.clone();
                    move |method: warp::http::Method, device_id: String, body: bytes::Bytes| {
                        let router = router.clone();
                        async move {
                            if method != warp::http::Method::from_bytes(b"NOTIFY").unwrap() {
                                return Err(warp::reject::not_found());
                            }

                            let body = String::from_utf8_lossy(&body).to_string();
                            debug!(
                                device_id = %device_id,
                                bytes = body.len(),
                                "incoming NOTIFY"
                            );

                            if router.route(device_id.clone(), body).await {
                                Ok::<_, warp::Rejection>(warp::reply::with_status(
                                    "",
                                    warp::http::StatusCode::OK,
                                ))
                            } else {
                                warn!(device_id = %device_id, "NOTIFY for unknown device");
                                Err(warp::reject::not_found())
                            }
                        }
                    }
                });

            let routes = notify_route.recover(handle_rejection);

            let (addr, server) = warp::serve(routes).bind_with_graceful_shutdown(
                SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), port),
                async move {
                    shutdown_rx.recv().await;
                },
            );

            info!(%addr, "callback server listening");
            let _ = ready_tx.send(()).await;
            server.await;
        })
    }
}

/// Handle rejections and convert them to HTTP responses.
async fn handle_rejection(
    err: warp::Rejection,
) -> Result<impl warp::Reply, std::convert::Infallible> {
    let (code, message) = if err.is_not_found() {
        (warp::http::StatusCode::NOT_FOUND, "Unknown device")
    } else {
        (
            warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error",
        )
    };

    Ok(warp::reply::with_status(message, code))
}
