//! A yes/no voting service.
//!
//! Users create votes, tally yes and no ballots on them, flag them as done, attach an image and
//! delete them again. Every vote belongs to the user who created it and only that user may touch
//! it. Callers are identified by a bearer token issued by an external identity provider.
//!
//! ## Modules
//! - **`routes`**: the tide endpoints, translating HTTP to `VoteService` calls
//! - **`service`**: ownership checks and the operations on a vote
//! - **`dao`**: key-value style storage of votes, in PostgreSQL or in memory
//! - **`storage`**: pre-signed S3 URLs for attachments
//! - **`auth`**: bearer token verification
//! - **`client`**: view state for a client of this API
use tide::http::headers::HeaderValue;
use tide::security::{CorsMiddleware, Origin};
use tide::utils::After;

use std::sync::Arc;

pub mod api_models;
pub mod auth;
pub mod client;
pub mod config;
pub mod dao;
pub mod error;
pub mod models;
pub mod routes;
pub mod schema;
pub mod service;
pub mod storage;

use auth::{BearerAuth, CallerResolver};
use service::VoteService;

/**
 * Struct for carrying application state into tide request handlers
 */
#[derive(Clone)]
pub struct AppState {
    pub votes: Arc<VoteService>,
}

impl AppState {
    pub fn new(votes: VoteService) -> Self {
        Self {
            votes: Arc::new(votes),
        }
    }
}

/**
 * Assemble the tide server with all of its routes.
 *
 * Everything under `/votes` requires a bearer token that `resolver` accepts.
 */
pub fn app(
    state: AppState,
    resolver: Arc<dyn CallerResolver>,
    cors_origin: &str,
) -> tide::Result<tide::Server<AppState>> {
    let mut app = tide::with_state(state);

    let cors = CorsMiddleware::new()
        .allow_methods("GET, POST, PATCH, DELETE, OPTIONS".parse::<HeaderValue>()?)
        .allow_headers("Authorization, Content-Type".parse::<HeaderValue>()?)
        .allow_origin(Origin::from(cors_origin))
        .allow_credentials(cors_origin != "*");

    app.with(After(routes::render_errors));
    app.with(cors);

    let auth = BearerAuth::new(resolver);

    app.at("/").get(routes::index);
    app.at("/votes")
        .with(auth.clone())
        .get(routes::votes::list)
        .post(routes::votes::create);
    app.at("/votes/:vote_id")
        .with(auth.clone())
        .get(routes::votes::get)
        .patch(routes::votes::set_done)
        .delete(routes::votes::delete);
    app.at("/votes/:vote_id/types")
        .with(auth.clone())
        .patch(routes::votes::record_choice);
    app.at("/votes/:vote_id/attachment")
        .with(auth)
        .post(routes::votes::attachment);

    Ok(app)
}
