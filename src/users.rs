use spin_sdk::http::{Request, Response};
use tracing::info;
use uuid::Uuid;

use crate::auth::{issue_token, validate_token};
use crate::config::*;
use crate::core::db::{self, Documents};
use crate::core::errors::ApiError;
use crate::core::helpers::{
    hash_password, now_iso, sanitize_text, store, validate_email, validate_uuid,
};
use crate::follow::detach_account;
use crate::models::models::User;
use crate::posts::delete_posts_for_owner;

/// Account JSON without the password hash, token sets or avatar bytes.
pub fn build_user_json(user: &User) -> serde_json::Value {
    serde_json::json!({
        "id": user.id,
        "userName": user.username,
        "email": user.email,
        "bio": user.bio.as_ref().unwrap_or(&String::new()),
        "emailVerified": user.email_verified,
        "followers": user.followers,
        "following": user.following,
        "created_at": user.created_at,
        "updated_at": user.updated_at,
    })
}

// === Credential store / account core ===

pub fn register_account<D: Documents>(
    store: &D,
    username: &str,
    email: &str,
    password: &str,
) -> Result<User, ApiError> {
    let username = sanitize_text(username);
    if username.len() < MIN_USERNAME_LENGTH || username.len() > MAX_USERNAME_LENGTH {
        return Err(ApiError::BadRequest(
            "Username must be 3-50 characters".to_string(),
        ));
    }
    let email = email.trim();
    if !validate_email(email) {
        return Err(ApiError::BadRequest(
            "Please enter valid email".to_string(),
        ));
    }
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    if db::find_user_by_username(store, &username)?.is_some() {
        return Err(ApiError::BadRequest("Username exists".to_string()));
    }
    if db::find_user_by_email(store, email)?.is_some() {
        return Err(ApiError::BadRequest("Email exists".to_string()));
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        username,
        email: email.to_string(),
        password: hash_password(password)?,
        bio: None,
        avatar: None,
        email_verified: false,
        tokens: Vec::new(),
        reset_tokens: Vec::new(),
        followers: Vec::new(),
        following: Vec::new(),
        created_at: now_iso(),
        updated_at: None,
    };

    db::save_user(store, &user)?;
    let mut ids = db::user_ids(store)?;
    ids.push(user.id.clone());
    db::save_user_ids(store, &ids)?;
    info!(user_id = %user.id, "account registered");
    Ok(user)
}

/// Only userName, email, password and bio may change; any other field
/// fails the whole request. Returns whether the password changed.
pub fn apply_profile_update<D: Documents>(
    store: &D,
    user: &mut User,
    fields: &serde_json::Value,
) -> Result<bool, ApiError> {
    let Some(map) = fields.as_object() else {
        return Err(ApiError::BadRequest("Invalid update".to_string()));
    };
    const ALLOWED: [&str; 4] = ["userName", "email", "password", "bio"];
    for key in map.keys() {
        if !ALLOWED.contains(&key.as_str()) {
            return Err(ApiError::BadRequest(format!(
                "Invalid update field: {}",
                key
            )));
        }
    }

    let mut password_changed = false;

    if let Some(name) = map.get("userName").and_then(|v| v.as_str()) {
        let name = sanitize_text(name);
        if name.len() < MIN_USERNAME_LENGTH || name.len() > MAX_USERNAME_LENGTH {
            return Err(ApiError::BadRequest(
                "Username must be 3-50 characters".to_string(),
            ));
        }
        if name != user.username && db::find_user_by_username(store, &name)?.is_some() {
            return Err(ApiError::BadRequest("Username exists".to_string()));
        }
        user.username = name;
    }

    if let Some(email) = map.get("email").and_then(|v| v.as_str()) {
        let email = email.trim();
        if !validate_email(email) {
            return Err(ApiError::BadRequest(
                "Please enter valid email".to_string(),
            ));
        }
        if email != user.email && db::find_user_by_email(store, email)?.is_some() {
            return Err(ApiError::BadRequest("Email exists".to_string()));
        }
        user.email = email.to_string();
    }

    if let Some(password) = map.get("password").and_then(|v| v.as_str()) {
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(ApiError::BadRequest(
                "Password must be at least 6 characters".to_string(),
            ));
        }
        user.password = hash_password(password)?;
        password_changed = true;
    }

    if let Some(bio) = map.get("bio").and_then(|v| v.as_str()) {
        let bio = sanitize_text(bio);
        if bio.len() > MAX_BIO_LENGTH {
            return Err(ApiError::BadRequest(
                "Bio too long (max 50 chars)".to_string(),
            ));
        }
        user.bio = if bio.is_empty() { None } else { Some(bio) };
    }

    user.updated_at = Some(now_iso());
    db::save_user(store, user)?;
    Ok(password_changed)
}

/// Deletion cascade: posts, follow edges, token documents, listing entry,
/// account. Every step is idempotent.
pub fn delete_account<D: Documents>(store: &D, user_id: &str) -> Result<(), ApiError> {
    let Some(user) = db::load_user(store, user_id)? else {
        return Err(ApiError::NotFound("User not found".to_string()));
    };

    delete_posts_for_owner(store, &user.id)?;
    detach_account(store, &user)?;
    for t in &user.tokens {
        store.delete_doc(&token_key(t))?;
    }
    for t in &user.reset_tokens {
        store.delete_doc(&reset_token_key(t))?;
    }

    let mut ids = db::user_ids(store)?;
    ids.retain(|id| id != user_id);
    db::save_user_ids(store, &ids)?;
    store.delete_doc(&user_key(user_id))?;
    info!(user_id = %user_id, "account deleted");
    Ok(())
}

// === HTTP Handlers ===

// POST /users/registration. Accounts start unverified; the issued token
// doubles as the email-verification secret.
pub fn create_user(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let body: serde_json::Value = serde_json::from_slice(req.body()).unwrap_or_default();
    let username = body["userName"].as_str().unwrap_or("");
    let email = body["email"].as_str().unwrap_or("");
    let password = body["password"].as_str().unwrap_or("");

    let mut user = match register_account(&store, username, email, password) {
        Ok(u) => u,
        Err(e) => return Ok(e.into()),
    };
    let token = issue_token(&store, &mut user)?;

    let resp = serde_json::json!({
        "user": build_user_json(&user),
        "token": token,
        "verifyEmail": format!("/users/verifyemail/{}/{}", user.id, token),
        "message": "Please verify your email",
    });
    Ok(Response::builder()
        .status(201)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&resp)?)
        .build())
}

// GET /users/me
pub fn get_profile(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let store = store();
    match db::load_user(&store, &user_id)? {
        Some(user) => Ok(Response::builder()
            .status(200)
            .header("Content-Type", "application/json")
            .body(serde_json::to_vec(&build_user_json(&user))?)
            .build()),
        None => Ok(ApiError::NotFound("User not found".to_string()).into()),
    }
}

// POST /users/me/update
pub fn update_profile(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let store = store();
    let Some(mut user) = db::load_user(&store, &user_id)? else {
        return Ok(ApiError::NotFound("User not found".to_string()).into());
    };

    let fields: serde_json::Value = serde_json::from_slice(req.body()).unwrap_or_default();
    let password_changed = match apply_profile_update(&store, &mut user, &fields) {
        Ok(changed) => changed,
        Err(e) => return Ok(e.into()),
    };

    // A password change logs the account out everywhere and hands back one
    // fresh session.
    let mut response_data = build_user_json(&user);
    if password_changed {
        crate::auth::revoke_all(&store, &mut user)?;
        let new_token = issue_token(&store, &mut user)?;
        response_data["token"] = serde_json::Value::String(new_token);
    }

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&response_data)?)
        .build())
}

// DELETE /users/me
pub fn delete_me(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let store = store();
    if let Err(e) = delete_account(&store, &user_id) {
        return Ok(e.into());
    }

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&serde_json::json!({
            "message": "account deleted"
        }))?)
        .build())
}

// POST /users/me/profilePicture, raw image body.
pub fn upload_avatar(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let image = req.body().to_vec();
    if image.is_empty() {
        return Ok(ApiError::BadRequest("Please upload valid image".to_string()).into());
    }
    if image.len() > MAX_IMAGE_BYTES {
        return Ok(ApiError::BadRequest("Image too large".to_string()).into());
    }

    let store = store();
    let Some(mut user) = db::load_user(&store, &user_id)? else {
        return Ok(ApiError::NotFound("User not found".to_string()).into());
    };
    user.avatar = Some(image);
    user.updated_at = Some(now_iso());
    db::save_user(&store, &user)?;

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&serde_json::json!({
            "message": "profile picture updated"
        }))?)
        .build())
}

// DELETE /users/me/profilePicture
pub fn delete_avatar(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let store = store();
    let Some(mut user) = db::load_user(&store, &user_id)? else {
        return Ok(ApiError::NotFound("User not found".to_string()).into());
    };
    user.avatar = None;
    user.updated_at = Some(now_iso());
    db::save_user(&store, &user)?;

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&serde_json::json!({
            "message": "profile picture removed"
        }))?)
        .build())
}

// GET /users/:id/profilePicture
pub fn get_avatar(path: &str) -> anyhow::Result<Response> {
    let user_id = path
        .strip_prefix("/users/")
        .and_then(|p| p.strip_suffix("/profilePicture"))
        .unwrap_or_default();
    if user_id.is_empty() || !validate_uuid(user_id) {
        return Ok(ApiError::BadRequest("User ID required".to_string()).into());
    }

    let store = store();
    let avatar = db::load_user(&store, user_id)?.and_then(|u| u.avatar);
    match avatar {
        Some(bytes) => Ok(Response::builder()
            .status(200)
            .header("Content-Type", "image/png")
            .body(bytes)
            .build()),
        None => Ok(ApiError::NotFound("No profile picture".to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::db::memory::{seed_post, seed_user, MemStore};
    use crate::core::helpers::verify_password;
    use crate::follow::{follow, is_following};

    #[test]
    fn registration_validates_input() {
        let store = MemStore::new();
        assert!(matches!(
            register_account(&store, "al", "alice@x.com", "secret1"),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            register_account(&store, "alice", "not-an-email", "secret1"),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            register_account(&store, "alice", "alice@x.com", "short"),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn registration_rejects_duplicates() {
        let store = MemStore::new();
        register_account(&store, "alice", "alice@x.com", "secret1").unwrap();

        assert_eq!(
            register_account(&store, "alice", "other@x.com", "secret1").unwrap_err(),
            ApiError::BadRequest("Username exists".to_string())
        );
        assert_eq!(
            register_account(&store, "alice2", "alice@x.com", "secret1").unwrap_err(),
            ApiError::BadRequest("Email exists".to_string())
        );
    }

    #[test]
    fn registration_trims_email_and_hashes_password() {
        let store = MemStore::new();
        let user = register_account(&store, "alice", "  alice@x.com  ", "secret1").unwrap();
        assert_eq!(user.email, "alice@x.com");
        assert!(!user.email_verified);
        assert_ne!(user.password, "secret1");
        assert!(verify_password("secret1", &user.password));
    }

    #[test]
    fn register_verify_login_scenario() {
        let store = MemStore::new();
        let mut alice = register_account(&store, "alice", "alice@x.com", "secret1").unwrap();
        let token = crate::auth::issue_token(&store, &mut alice).unwrap();

        // verification flips the flag, then credentials resolve
        alice.email_verified = true;
        db::save_user(&store, &alice).unwrap();

        let found = db::find_user_by_email(&store, "alice@x.com").unwrap().unwrap();
        assert!(found.email_verified);
        assert!(verify_password("secret1", &found.password));
        assert_eq!(
            crate::auth::resolve_token(&store, &token).unwrap(),
            Some(alice.id)
        );
    }

    #[test]
    fn update_rejects_unknown_fields() {
        let store = MemStore::new();
        let mut alice = seed_user(&store, "alice");
        let err = apply_profile_update(
            &store,
            &mut alice,
            &serde_json::json!({"bio": "hi", "isAdmin": true}),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ApiError::BadRequest("Invalid update field: isAdmin".to_string())
        );
    }

    #[test]
    fn update_restricted_fields() {
        let store = MemStore::new();
        let mut alice = seed_user(&store, "alice");

        let changed = apply_profile_update(
            &store,
            &mut alice,
            &serde_json::json!({"userName": "alicia", "bio": "hello", "password": "newsecret"}),
        )
        .unwrap();
        assert!(changed);
        assert_eq!(alice.username, "alicia");
        assert_eq!(alice.bio.as_deref(), Some("hello"));
        assert!(verify_password("newsecret", &alice.password));
    }

    #[test]
    fn update_rejects_taken_username_and_long_bio() {
        let store = MemStore::new();
        seed_user(&store, "bob");
        let mut alice = seed_user(&store, "alice");

        assert!(matches!(
            apply_profile_update(&store, &mut alice, &serde_json::json!({"userName": "bob"})),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            apply_profile_update(
                &store,
                &mut alice,
                &serde_json::json!({"bio": "b".repeat(51)})
            ),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn bio_cap_applies_to_sanitized_text() {
        let store = MemStore::new();
        let mut alice = seed_user(&store, "alice");

        // 20 ampersands escape to 100 chars, past the cap.
        assert!(matches!(
            apply_profile_update(
                &store,
                &mut alice,
                &serde_json::json!({"bio": "&".repeat(20)})
            ),
            Err(ApiError::BadRequest(_))
        ));

        apply_profile_update(&store, &mut alice, &serde_json::json!({"bio": "me & my cat"}))
            .unwrap();
        let bio = alice.bio.as_deref().unwrap();
        assert_eq!(bio, "me &amp; my cat");
        assert!(bio.len() <= MAX_BIO_LENGTH);
    }

    #[test]
    fn delete_account_cascades() {
        let store = MemStore::new();
        let alice = seed_user(&store, "alice");
        let bob = seed_user(&store, "bob");
        follow(&store, &alice.id, &bob.id).unwrap();
        follow(&store, &bob.id, &alice.id).unwrap();
        let post = seed_post(&store, &alice, "mine");
        // reload so the token write keeps the follow edges
        let mut alice = db::load_user(&store, &alice.id).unwrap().unwrap();
        let token = crate::auth::issue_token(&store, &mut alice).unwrap();

        delete_account(&store, &alice.id).unwrap();

        assert!(db::load_user(&store, &alice.id).unwrap().is_none());
        assert!(db::load_post(&store, &post.id).unwrap().is_none());
        assert!(!db::user_ids(&store).unwrap().contains(&alice.id));
        assert_eq!(crate::auth::resolve_token(&store, &token).unwrap(), None);

        // no dangling edges on the surviving side
        let bob = db::load_user(&store, &bob.id).unwrap().unwrap();
        assert!(bob.followers.is_empty());
        assert!(bob.following.is_empty());
        assert!(!is_following(&store, &bob.id, &alice.id).unwrap());
    }

    #[test]
    fn user_json_hides_secrets() {
        let store = MemStore::new();
        let mut alice = seed_user(&store, "alice");
        alice.avatar = Some(vec![1, 2, 3]);
        let json = build_user_json(&alice);
        assert!(json.get("password").is_none());
        assert!(json.get("tokens").is_none());
        assert!(json.get("avatar").is_none());
        assert_eq!(json["userName"], "alice");
    }
}
