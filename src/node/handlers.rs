use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::get,
};
use std::net::SocketAddr;
use tokio::sync::watch;

use super::types::{MemberView, NodeSnapshot};

pub type Snapshots = watch::Receiver<NodeSnapshot>;

pub async fn handle_status(Extension(snapshots): Extension<Snapshots>) -> Json<NodeSnapshot> {
    Json(snapshots.borrow().clone())
}

pub async fn handle_members(Extension(snapshots): Extension<Snapshots>) -> Json<Vec<MemberView>> {
    Json(snapshots.borrow().members.clone())
}

pub async fn handle_get_member(
    Extension(snapshots): Extension<Snapshots>,
    Path(id): Path<i32>,
) -> Result<Json<MemberView>, StatusCode> {
    let snapshot = snapshots.borrow();
    match snapshot.members.iter().find(|member| member.endpoint.id == id) {
        Some(member) => Ok(Json(member.clone())),
        None => {
            tracing::debug!("Member {} not in table", id);
            Err(StatusCode::NOT_FOUND)
        }
    }
}

pub fn router(snapshots: Snapshots) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/members", get(handle_members))
        .route("/members/:id", get(handle_get_member))
        .layer(Extension(snapshots))
}

/// Serve the read-only status API until the listener fails.
pub async fn serve(addr: SocketAddr, snapshots: Snapshots) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Status API listening on {}", listener.local_addr()?);
    axum::serve(listener, router(snapshots)).await?;
    Ok(())
}
