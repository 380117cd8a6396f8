use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    routing::{get, post, put},
    Router,
};
use clubhub_api::{AuthToken, Uuid};
use clubhub_mock_server::MockServer;
use tokio::sync::Mutex;

mod error;
mod extractors;
mod feeds;
mod fuzz;
mod handlers;

use error::Error;
use extractors::{AppState, Store};

#[derive(structopt::StructOpt)]
#[structopt(name = "clubhub-server", about = "Club comments and likes, with realtime feeds")]
struct Opt {
    /// Address to listen on
    #[structopt(short, long, default_value = "127.0.0.1:8000")]
    listen: SocketAddr,
}

pub fn app(store: Store, admin_token: Option<AuthToken>) -> Router {
    use handlers::*;
    Router::new()
        .route("/api/admin/create-user", post(admin_create_user))
        .route("/api/admin/create-post", post(admin_create_post))
        .route("/api/auth", post(auth))
        .route("/api/unauth", post(unauth))
        .route("/api/whoami", get(whoami))
        .route("/api/posts/:post", get(fetch_post))
        .route(
            "/api/posts/:post/comments",
            get(list_comments).post(create_comment),
        )
        .route(
            "/api/comments/:comment",
            put(edit_comment).delete(delete_comment),
        )
        .route("/api/posts/:post/like", get(like_status).post(toggle_like))
        .route("/api/clubs/:club/publish", post(publish))
        .route("/ws/clubs/:club/feed", get(club_feed))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(AppState { store, admin_token })
}

fn admin_token() -> anyhow::Result<Option<AuthToken>> {
    match std::env::var("ADMIN_TOKEN") {
        Err(std::env::VarError::NotPresent) => Ok(None),
        tok => {
            let tok = tok.context("retrieving ADMIN_TOKEN environment variable")?;
            let tok = Uuid::try_parse(&tok).context("parsing ADMIN_TOKEN as an auth token")?;
            Ok(Some(AuthToken(tok)))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let opt = <Opt as structopt::StructOpt>::from_args();
    let admin_token = admin_token()?;
    if admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN is not set, admin routes will refuse every request");
    }

    let app = app(Arc::new(Mutex::new(MockServer::new())), admin_token);

    tracing::info!(addr = %opt.listen, "listening");
    axum::Server::bind(&opt.listen)
        .serve(app.into_make_service())
        .await
        .context("serving axum webserver")
}
