use error_stack::Report;
use poem::get;
use poem::http::Method;
use poem::listener::TcpListener;
use poem::middleware::Cors;
use poem::middleware::Tracing;
use poem::Endpoint;
use poem::EndpointExt;
use poem::Route;
use poem::Server;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;

use super::errors::ApiError;
use super::handlers::preflight;
use super::handlers::receive_message;
use super::handlers::SharedMigrator;

/// HTTP listener for usage notifications.
pub struct ApiServer {
    migrator: SharedMigrator,
    listen_addr: String,
}

/// The notification route with permissive CORS, shared between the server
/// and the handler tests.
pub fn route(migrator: SharedMigrator) -> impl Endpoint {
    Route::new()
        .at(
            "/messages",
            get(receive_message)
                .post(receive_message)
                .options(preflight),
        )
        .data(migrator)
        .with(
            Cors::new()
                .allow_method(Method::GET)
                .allow_method(Method::POST)
                .allow_method(Method::OPTIONS)
                .allow_header("Content-Type"),
        )
        .with(Tracing)
}

impl ApiServer {
    pub fn new(migrator: SharedMigrator, listen_addr: String) -> Self {
        Self {
            migrator,
            listen_addr,
        }
    }

    /// Run until the shutdown token fires.
    ///
    /// # Errors
    ///
    /// - [`ApiError::ServerError`] if the server fails to start or bind
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), Report<ApiError>> {
        info!("Starting notification listener on {}", self.listen_addr);

        let app = route(self.migrator);
        let listener = TcpListener::bind(&self.listen_addr);
        let server = Server::new(listener);

        tokio::select! {
            result = server.run(app) => match result {
                Ok(()) => {
                    info!("Notification listener stopped normally");
                    Ok(())
                }
                Err(e) => {
                    error!("Notification listener failed: {e}");
                    Err(Report::new(ApiError::ServerError {
                        message: format!("Server failed: {e}"),
                    }))
                }
            },
            () = shutdown.cancelled() => {
                info!("Notification listener shutdown requested");
                Ok(())
            }
        }
    }
}
