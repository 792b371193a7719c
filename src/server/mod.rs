mod extract;
mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};

use crate::api::API;
use crate::error::{configuration_error, Error};
use crate::server::handlers::{members, rides};

pub type DynAPI = Arc<dyn API + Send + Sync>;

pub fn router<T: API + Sync + Send + 'static>(api: T) -> Router {
    let api = Arc::new(api) as DynAPI;

    Router::new()
        .route("/auth/signup", post(members::sign_up))
        .route("/rides", get(rides::list))
        .route("/rides/book", post(rides::book))
        .route("/rides/fare", get(rides::estimate_fare))
        .route("/rides/available", get(rides::list_available))
        .route("/rides/passenger", get(rides::list_passenger))
        .route("/rides/driver", get(rides::list_driver))
        .route("/rides/driver/stats", get(rides::driver_stats))
        .route("/rides/:id", get(rides::find))
        .route("/rides/:id/accept", post(rides::accept))
        .route("/rides/:id/reject", post(rides::reject))
        .route("/rides/:id/status", post(rides::update_status))
        .route("/rides/:id/cancel", post(rides::cancel))
        .route("/rides/:id/rate", post(rides::rate))
        .layer(Extension(api))
}

pub async fn serve<T: API + Sync + Send + 'static>(api: T, addr: SocketAddr) -> Result<(), Error> {
    let app = router(api);

    let server = axum::Server::try_bind(&addr)
        .map_err(|err| configuration_error(format!("cannot bind {addr}: {err}")))?;

    tracing::info!("listening on {}", addr);

    server.serve(app.into_make_service()).await.map_err(|err| {
        tracing::error!(error = %err, "server stopped");
        crate::error::unexpected_error()
    })
}
