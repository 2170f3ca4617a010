use spin_sdk::http::{Request, Response};
use tracing::info;
use uuid::Uuid;

use crate::auth::validate_token;
use crate::config::*;
use crate::core::db::{self, Documents};
use crate::core::errors::ApiError;
use crate::core::helpers::{now_iso, sanitize_text, store, validate_uuid};
use crate::core::query_params::{get_page, get_string, parse_query_params};
use crate::models::models::{Post, User};
use crate::visibility::can_view;

/// Post JSON without the image bytes.
pub fn build_post_json(post: &Post) -> serde_json::Value {
    serde_json::json!({
        "id": post.id,
        "user_id": post.user_id,
        "description": post.description,
        "likes": post.likes,
        "comments": post.comments,
        "created_at": post.created_at,
        "updated_at": post.updated_at,
    })
}

// === Post registry core ===

pub fn create_post_record<D: Documents>(
    store: &D,
    owner: &User,
    image: Vec<u8>,
    description: &str,
) -> Result<Post, ApiError> {
    if image.is_empty() {
        return Err(ApiError::BadRequest(
            "Please select image to upload".to_string(),
        ));
    }
    if image.len() > MAX_IMAGE_BYTES {
        return Err(ApiError::BadRequest("Image too large".to_string()));
    }
    // Length is checked on the sanitized text, which is what gets stored.
    let description = sanitize_text(description);
    if description.len() > MAX_DESCRIPTION_LENGTH {
        return Err(ApiError::BadRequest(
            "Description too long (max 50 chars)".to_string(),
        ));
    }

    let post = Post {
        id: Uuid::new_v4().to_string(),
        user_id: owner.id.clone(),
        image,
        description,
        likes: Vec::new(),
        comments: Vec::new(),
        created_at: now_iso(),
        updated_at: None,
    };

    db::save_post(store, &post)?;
    let mut ids = db::owner_post_ids(store, &owner.id)?;
    if !ids.contains(&post.id) {
        ids.push(post.id.clone());
    }
    db::save_owner_post_ids(store, &owner.id, &ids)?;
    info!(post_id = %post.id, owner = %owner.id, "post created");
    Ok(post)
}

pub fn update_description<D: Documents>(
    store: &D,
    owner_id: &str,
    post_id: &str,
    description: &str,
) -> Result<Post, ApiError> {
    let Some(mut post) = db::load_post(store, post_id)? else {
        return Err(ApiError::NotFound("Post not found".to_string()));
    };
    if post.user_id != owner_id {
        return Err(ApiError::Forbidden(
            "Only the owner can edit this post".to_string(),
        ));
    }
    let description = sanitize_text(description);
    if description.len() > MAX_DESCRIPTION_LENGTH {
        return Err(ApiError::BadRequest(
            "Description too long (max 50 chars)".to_string(),
        ));
    }

    post.description = description;
    post.updated_at = Some(now_iso());
    db::save_post(store, &post)?;
    Ok(post)
}

pub fn delete_post_record<D: Documents>(
    store: &D,
    owner_id: &str,
    post_id: &str,
) -> Result<(), ApiError> {
    let Some(post) = db::load_post(store, post_id)? else {
        return Err(ApiError::NotFound("Post not found".to_string()));
    };
    if post.user_id != owner_id {
        return Err(ApiError::Forbidden(
            "Only the owner can delete this post".to_string(),
        ));
    }

    store.delete_doc(&post_key(post_id))?;
    let mut ids = db::owner_post_ids(store, owner_id)?;
    ids.retain(|id| id != post_id);
    db::save_owner_post_ids(store, owner_id, &ids)?;
    Ok(())
}

/// Removes every post the owner has, index last so a retry re-walks the
/// remainder.
pub fn delete_posts_for_owner<D: Documents>(store: &D, owner_id: &str) -> anyhow::Result<()> {
    let ids = db::owner_post_ids(store, owner_id)?;
    let count = ids.len();
    for id in &ids {
        store.delete_doc(&post_key(id))?;
    }
    store.delete_doc(&posts_by_key(owner_id))?;
    info!(owner = %owner_id, deleted = count, "cascade-deleted posts");
    Ok(())
}

pub fn list_by_owner<D: Documents>(store: &D, owner_id: &str) -> anyhow::Result<Vec<Post>> {
    let mut posts = Vec::new();
    for id in db::owner_post_ids(store, owner_id)? {
        if let Some(p) = db::load_post(store, &id)? {
            posts.push(p);
        }
    }
    Ok(posts)
}

// === HTTP Handlers ===

fn page_of(posts: Vec<Post>, page: usize) -> Vec<serde_json::Value> {
    posts
        .iter()
        .skip((page - 1) * POSTS_PER_PAGE)
        .take(POSTS_PER_PAGE)
        .map(build_post_json)
        .collect()
}

// POST /users/post. Raw image body; description in the query string.
pub fn handle_upload(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let store = store();
    let Some(owner) = db::load_user(&store, &user_id)? else {
        return Ok(ApiError::Unauthorized.into());
    };

    let params = parse_query_params(req.uri());
    let description = get_string(&params, "description", Some("")).unwrap_or_default();
    let image = req.body().to_vec();

    match create_post_record(&store, &owner, image, &description) {
        Ok(post) => Ok(Response::builder()
            .status(201)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&build_post_json(&post))?)
            .build()),
        Err(e) => Ok(e.into()),
    }
}

fn post_id_segment(path: &str) -> Option<String> {
    let id = path.split('/').nth(2).unwrap_or_default().to_string();
    if id.is_empty() || !validate_uuid(&id) {
        return None;
    }
    Some(id)
}

// PATCH /posts/:id/update
pub fn handle_update(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let Some(post_id) = post_id_segment(req.path()) else {
        return Ok(ApiError::BadRequest("Post ID required".to_string()).into());
    };

    let value: serde_json::Value = serde_json::from_slice(req.body()).unwrap_or_default();
    let description = value["description"].as_str().unwrap_or_default();

    let store = store();
    match update_description(&store, &user_id, &post_id, description) {
        Ok(post) => Ok(Response::builder()
            .status(200)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&build_post_json(&post))?)
            .build()),
        Err(e) => Ok(e.into()),
    }
}

// DELETE /posts/:id
pub fn handle_delete(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let Some(post_id) = post_id_segment(req.path()) else {
        return Ok(ApiError::BadRequest("Post ID required".to_string()).into());
    };

    let store = store();
    match delete_post_record(&store, &user_id, &post_id) {
        Ok(()) => Ok(Response::builder().status(204).build()),
        Err(e) => Ok(e.into()),
    }
}

// GET /users/me/posts
pub fn my_posts(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let store = store();
    let posts = list_by_owner(&store, &user_id)?;
    let page = get_page(&parse_query_params(req.uri()), "page");

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&page_of(posts, page))?)
        .build())
}

// GET /users/:id/posts, gated by the follow check.
pub fn user_posts(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let path = req.path();
    let owner_id = path
        .strip_prefix("/users/")
        .and_then(|p| p.strip_suffix("/posts"))
        .unwrap_or_default()
        .to_string();
    if owner_id.is_empty() || !validate_uuid(&owner_id) {
        return Ok(ApiError::BadRequest("User ID required".to_string()).into());
    }

    let store = store();
    if db::load_user(&store, &owner_id)?.is_none() {
        return Ok(ApiError::NotFound("User not found".to_string()).into());
    }
    if !can_view(&store, &user_id, &owner_id)? {
        return Ok(ApiError::NotVisible.into());
    }

    let posts = list_by_owner(&store, &owner_id)?;
    let page = get_page(&parse_query_params(req.uri()), "page");

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&page_of(posts, page))?)
        .build())
}
