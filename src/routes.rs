//! The routes module contains all the tide routes and the logic to fulfill the responses for
//! each route.
//!
//! Handlers only translate between HTTP and the `VoteService`, errors are propagated with `?` and
//! rendered by `render_errors`.
use log::*;
use tide::{Body, Request, Response};

use crate::api_models::ErrorBody;
use crate::error::VoteError;
use crate::AppState;

/**
 *  GET /
 */
pub async fn index(_req: Request<AppState>) -> tide::Result<String> {
    Ok("Wilkommen".to_string())
}

/**
 * Turn a failed request into the right status code with a JSON error body
 */
pub async fn render_errors(mut res: Response) -> tide::Result {
    let rendered = res.error().map(|err| match err.downcast_ref::<VoteError>() {
        Some(vote_err) => {
            if let VoteError::Storage(source) = vote_err {
                error!("Storage failure: {:?}", source);
            }
            (
                vote_err.status(),
                ErrorBody {
                    error: vote_err.kind().to_string(),
                    message: vote_err.public_message(),
                },
            )
        }
        None => {
            let status = err.status();
            let message = if status.is_server_error() {
                error!("Request failed: {:?}", err);
                "An internal error occurred".to_string()
            } else {
                err.to_string()
            };
            (
                status,
                ErrorBody {
                    error: "Error".to_string(),
                    message,
                },
            )
        }
    });

    if let Some((status, body)) = rendered {
        res.set_status(status);
        res.set_body(Body::from_json(&body)?);
    }
    Ok(res)
}

pub mod votes {
    use log::*;
    use serde::de::DeserializeOwned;
    use serde_json::json;
    use tide::{Body, Request, Response, StatusCode};

    use crate::api_models::{UpdateVoteDone, UpdateVoteType, UploadUrl, VoteItem, VoteItems};
    use crate::auth::Caller;
    use crate::error::VoteError;
    use crate::models::{generate_uuid, InsertableVote, VoteChoice};
    use crate::AppState;

    fn caller(req: &Request<AppState>) -> Result<String, VoteError> {
        req.ext::<Caller>()
            .map(|caller| caller.0.clone())
            .ok_or_else(|| VoteError::Unauthorized("No caller on the request".to_string()))
    }

    fn vote_id(req: &Request<AppState>) -> Result<String, VoteError> {
        req.param("vote_id")
            .map(|id| id.to_string())
            .map_err(|_| VoteError::Validation("No vote id specified".to_string()))
    }

    async fn body<T: DeserializeOwned>(req: &mut Request<AppState>) -> Result<T, VoteError> {
        req.body_json::<T>()
            .await
            .map_err(|err| VoteError::Validation(err.to_string()))
    }

    /**
     *  POST /votes
     */
    pub async fn create(mut req: Request<AppState>) -> tide::Result<Response> {
        let owner = caller(&req)?;
        let details: InsertableVote = body(&mut req).await?;
        debug!("Vote received: {:?}", details);

        let item = req.state().votes.create(&owner, details).await?;

        Ok(Response::builder(StatusCode::Created)
            .body(Body::from_json(&VoteItem { item })?)
            .build())
    }

    /**
     *  GET /votes
     */
    pub async fn list(req: Request<AppState>) -> tide::Result<Body> {
        let owner = caller(&req)?;
        let items = req.state().votes.list(&owner).await?;
        Body::from_json(&VoteItems { items })
    }

    /**
     *  GET /votes/:vote_id
     */
    pub async fn get(req: Request<AppState>) -> tide::Result<Body> {
        let owner = caller(&req)?;
        let vote_id = vote_id(&req)?;
        let item = req.state().votes.get(&owner, &vote_id).await?;
        Body::from_json(&VoteItem { item })
    }

    /**
     *  PATCH /votes/:vote_id/types
     */
    pub async fn record_choice(mut req: Request<AppState>) -> tide::Result<Response> {
        let owner = caller(&req)?;
        let vote_id = vote_id(&req)?;
        let ballot: UpdateVoteType = body(&mut req).await?;

        let choice = VoteChoice::from_vote_type(&ballot.vote_type);
        req.state()
            .votes
            .record_vote_choice(&owner, &vote_id, choice)
            .await?;

        Ok(Response::new(StatusCode::Ok))
    }

    /**
     *  PATCH /votes/:vote_id
     */
    pub async fn set_done(mut req: Request<AppState>) -> tide::Result<Response> {
        let owner = caller(&req)?;
        let vote_id = vote_id(&req)?;
        let update: UpdateVoteDone = body(&mut req).await?;

        req.state()
            .votes
            .set_done(&owner, &vote_id, update.done)
            .await?;

        Ok(Response::new(StatusCode::Ok))
    }

    /**
     *  DELETE /votes/:vote_id
     */
    pub async fn delete(req: Request<AppState>) -> tide::Result<Body> {
        let owner = caller(&req)?;
        let vote_id = vote_id(&req)?;
        req.state().votes.delete(&owner, &vote_id).await?;
        Body::from_json(&json!({}))
    }

    /**
     *  POST /votes/:vote_id/attachment
     *
     * Associates a fresh attachment id with the vote and hands back where to upload it
     */
    pub async fn attachment(req: Request<AppState>) -> tide::Result<Body> {
        let owner = caller(&req)?;
        let vote_id = vote_id(&req)?;
        let attachment_id = generate_uuid();
        let votes = &req.state().votes;

        votes.attach_upload(&owner, &vote_id, &attachment_id).await?;
        let upload_url = votes.issue_upload_target(&attachment_id);

        Body::from_json(&UploadUrl { upload_url })
    }
}
