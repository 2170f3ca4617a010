use spin_sdk::http::{Request, Response};
use tracing::info;

use crate::auth::validate_token;
use crate::core::db::{self, Documents};
use crate::core::errors::ApiError;
use crate::core::helpers::{store, validate_uuid};
use crate::models::models::User;

#[derive(Debug, PartialEq)]
pub enum GraphError {
    SelfFollow,
    SelfUnfollow,
    AlreadyFollowing,
    NotFollowing,
    MissingAccount,
    Store(String),
}

impl From<anyhow::Error> for GraphError {
    fn from(err: anyhow::Error) -> Self {
        GraphError::Store(err.to_string())
    }
}

impl From<GraphError> for ApiError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::SelfFollow => {
                ApiError::Forbidden("You cannot follow yourself".to_string())
            }
            GraphError::SelfUnfollow => {
                ApiError::Forbidden("You cannot unfollow yourself".to_string())
            }
            GraphError::AlreadyFollowing => {
                ApiError::Forbidden("Already following this user".to_string())
            }
            GraphError::NotFollowing => {
                ApiError::Forbidden("You are not following this user".to_string())
            }
            GraphError::MissingAccount => ApiError::NotFound("User not found".to_string()),
            GraphError::Store(msg) => ApiError::InternalError(msg),
        }
    }
}

/// Adds the edge viewer -> target on both user documents: viewer joins
/// target.followers and target joins viewer.following.
pub fn follow<D: Documents>(store: &D, viewer_id: &str, target_id: &str) -> Result<(), GraphError> {
    if viewer_id == target_id {
        return Err(GraphError::SelfFollow);
    }
    let mut viewer = db::load_user(store, viewer_id)?.ok_or(GraphError::MissingAccount)?;
    let mut target = db::load_user(store, target_id)?.ok_or(GraphError::MissingAccount)?;
    if viewer.following.iter().any(|id| id == target_id) {
        return Err(GraphError::AlreadyFollowing);
    }

    if !target.followers.contains(&viewer.id) {
        target.followers.push(viewer.id.clone());
    }
    if !viewer.following.contains(&target.id) {
        viewer.following.push(target.id.clone());
    }

    db::save_user(store, &target)?;
    if let Err(e) = db::save_user(store, &viewer) {
        // Revert the follower side so no one-sided edge persists.
        target.followers.retain(|id| id != viewer_id);
        let _ = db::save_user(store, &target);
        return Err(e.into());
    }
    info!(viewer = %viewer_id, target = %target_id, "follow");
    Ok(())
}

/// Removes the edge from both user documents.
pub fn unfollow<D: Documents>(
    store: &D,
    viewer_id: &str,
    target_id: &str,
) -> Result<(), GraphError> {
    if viewer_id == target_id {
        return Err(GraphError::SelfUnfollow);
    }
    let mut viewer = db::load_user(store, viewer_id)?.ok_or(GraphError::MissingAccount)?;
    let mut target = db::load_user(store, target_id)?.ok_or(GraphError::MissingAccount)?;
    if !viewer.following.iter().any(|id| id == target_id) {
        return Err(GraphError::NotFollowing);
    }

    target.followers.retain(|id| id != viewer_id);
    viewer.following.retain(|id| id != target_id);

    db::save_user(store, &target)?;
    if let Err(e) = db::save_user(store, &viewer) {
        if !target.followers.contains(&viewer.id) {
            target.followers.push(viewer.id.clone());
        }
        let _ = db::save_user(store, &target);
        return Err(e.into());
    }
    info!(viewer = %viewer_id, target = %target_id, "unfollow");
    Ok(())
}

pub fn is_following<D: Documents>(
    store: &D,
    viewer_id: &str,
    target_id: &str,
) -> anyhow::Result<bool> {
    match db::load_user(store, viewer_id)? {
        Some(viewer) => Ok(viewer.following.iter().any(|id| id == target_id)),
        None => Ok(false),
    }
}

/// Drops a departing account from everyone else's follower and following
/// lists. Each step is an idempotent retain.
pub fn detach_account<D: Documents>(store: &D, user: &User) -> anyhow::Result<()> {
    for follower_id in &user.followers {
        if let Some(mut follower) = db::load_user(store, follower_id)? {
            follower.following.retain(|id| id != &user.id);
            db::save_user(store, &follower)?;
        }
    }
    for followed_id in &user.following {
        if let Some(mut followed) = db::load_user(store, followed_id)? {
            followed.followers.retain(|id| id != &user.id);
            db::save_user(store, &followed)?;
        }
    }
    Ok(())
}

// === HTTP Handlers ===

fn follow_path_user_id(path: &str, suffix: &str) -> Option<String> {
    let id = path
        .strip_prefix("/users/")?
        .strip_suffix(suffix)?
        .to_string();
    if id.is_empty() || !validate_uuid(&id) {
        return None;
    }
    Some(id)
}

pub fn handle_follow(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let Some(target_id) = follow_path_user_id(req.path(), "/follow") else {
        return Ok(ApiError::BadRequest("Invalid target user".to_string()).into());
    };

    let store = store();
    if let Err(e) = follow(&store, &user_id, &target_id) {
        return Ok(ApiError::from(e).into());
    }

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&serde_json::json!({"status": "followed"}))?)
        .build())
}

pub fn handle_unfollow(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let Some(target_id) = follow_path_user_id(req.path(), "/unfollow") else {
        return Ok(ApiError::BadRequest("Invalid target user".to_string()).into());
    };

    let store = store();
    if let Err(e) = unfollow(&store, &user_id, &target_id) {
        return Ok(ApiError::from(e).into());
    }

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&serde_json::json!({"status": "unfollowed"}))?)
        .build())
}
