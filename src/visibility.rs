use spin_sdk::http::{Request, Response};
use tracing::info;

use crate::auth::validate_token;
use crate::config::*;
use crate::core::db::{self, Documents};
use crate::core::errors::ApiError;
use crate::core::helpers::{now_iso, sanitize_text, store, validate_uuid};
use crate::follow::is_following;
use crate::models::models::{Comment, Post, User};
use crate::posts::{build_post_json, list_by_owner};

/// Owners see their own content; everyone else needs a follow edge.
pub fn can_view<D: Documents>(
    store: &D,
    viewer_id: &str,
    owner_id: &str,
) -> anyhow::Result<bool> {
    if viewer_id == owner_id {
        return Ok(true);
    }
    is_following(store, viewer_id, owner_id)
}

/// The viewer's own posts, then each followed account's posts in
/// following-list order. No chronological merge across owners.
pub fn compose_feed<D: Documents>(store: &D, viewer: &User) -> anyhow::Result<Vec<Post>> {
    let mut feed = list_by_owner(store, &viewer.id)?;
    for owner_id in &viewer.following {
        feed.extend(list_by_owner(store, owner_id)?);
    }
    Ok(feed)
}

#[derive(Debug, PartialEq)]
pub enum LikeOutcome {
    Liked,
    Disliked,
}

/// Flips the viewer's membership in the post's like set.
pub fn toggle_like<D: Documents>(
    store: &D,
    viewer_id: &str,
    post_id: &str,
) -> Result<LikeOutcome, ApiError> {
    let Some(mut post) = db::load_post(store, post_id)? else {
        return Err(ApiError::NotFound("Post not found".to_string()));
    };
    if !can_view(store, viewer_id, &post.user_id)? {
        return Err(ApiError::NotVisible);
    }

    let outcome = if post.likes.iter().any(|id| id == viewer_id) {
        post.likes.retain(|id| id != viewer_id);
        LikeOutcome::Disliked
    } else {
        post.likes.push(viewer_id.to_string());
        LikeOutcome::Liked
    };
    // The like list is a set; every write collapses duplicates that an
    // interleaved read-modify-write may have stored.
    let mut seen = std::collections::HashSet::new();
    post.likes.retain(|id| seen.insert(id.clone()));
    db::save_post(store, &post)?;
    Ok(outcome)
}

pub fn add_comment<D: Documents>(
    store: &D,
    viewer_id: &str,
    post_id: &str,
    text: &str,
) -> Result<Post, ApiError> {
    let Some(mut post) = db::load_post(store, post_id)? else {
        return Err(ApiError::NotFound("Post not found".to_string()));
    };
    if !can_view(store, viewer_id, &post.user_id)? {
        return Err(ApiError::NotVisible);
    }

    let text = sanitize_text(text);
    if text.is_empty() || text.len() > MAX_COMMENT_LENGTH {
        return Err(ApiError::BadRequest("Invalid comment".to_string()));
    }

    post.comments.push(Comment {
        text,
        author_id: viewer_id.to_string(),
        created_at: now_iso(),
    });
    db::save_post(store, &post)?;
    info!(post_id = %post.id, author = %viewer_id, "comment added");
    Ok(post)
}

// === HTTP Handlers ===

fn post_id_segment(path: &str) -> Option<String> {
    let id = path.split('/').nth(2).unwrap_or_default().to_string();
    if id.is_empty() || !validate_uuid(&id) {
        return None;
    }
    Some(id)
}

// GET /posts/timeline/all
pub fn get_timeline(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let store = store();
    let Some(viewer) = db::load_user(&store, &user_id)? else {
        return Ok(ApiError::Unauthorized.into());
    };

    let feed = compose_feed(&store, &viewer)?;
    let body: Vec<serde_json::Value> = feed.iter().map(build_post_json).collect();

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&body)?)
        .build())
}

// PUT /posts/:id/like
pub fn handle_like(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let Some(post_id) = post_id_segment(req.path()) else {
        return Ok(ApiError::BadRequest("Post ID required".to_string()).into());
    };

    let store = store();
    match toggle_like(&store, &user_id, &post_id) {
        Ok(outcome) => {
            let status = match outcome {
                LikeOutcome::Liked => "liked",
                LikeOutcome::Disliked => "disliked",
            };
            Ok(Response::builder()
                .status(200)
                .header("Content-Type", "application/json")
                .body(serde_json::to_vec(&serde_json::json!({"status": status}))?)
                .build())
        }
        Err(e) => Ok(e.into()),
    }
}

// POST /posts/:id/comment
pub fn handle_comment(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let Some(post_id) = post_id_segment(req.path()) else {
        return Ok(ApiError::BadRequest("Post ID required".to_string()).into());
    };

    let value: serde_json::Value = serde_json::from_slice(req.body()).unwrap_or_default();
    let text = value["comment"].as_str().unwrap_or_default();

    let store = store();
    match add_comment(&store, &user_id, &post_id, text) {
        Ok(post) => Ok(Response::builder()
            .status(200)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&build_post_json(&post))?)
            .build()),
        Err(e) => Ok(e.into()),
    }
}
