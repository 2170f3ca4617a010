use spin_sdk::http::{Request, Response};
use tracing::{info, warn};

use crate::config::*;
use crate::core::db::{self, Documents};
use crate::core::errors::ApiError;
use crate::core::helpers::{hash_password, new_token, now_iso, store, verify_password};
use crate::models::models::{ResetTokenData, TokenData, User};
use crate::users::build_user_json;

// === Session manager core ===

/// Appends a fresh token to the account's set and writes the lookup index.
pub fn issue_token<D: Documents>(store: &D, user: &mut User) -> anyhow::Result<String> {
    let token = new_token();
    user.tokens.push(token.clone());
    db::save_user(store, user)?;
    store.set_doc(
        &token_key(&token),
        &TokenData {
            user_id: user.id.clone(),
            created_at: now_iso(),
        },
    )?;
    Ok(token)
}

/// Resolves a bearer token to an account id. A token resolves only while
/// it is a member of the account's token set.
pub fn resolve_token<D: Documents>(store: &D, token: &str) -> anyhow::Result<Option<String>> {
    let data: Option<TokenData> = store.get_doc(&token_key(token))?;
    let Some(data) = data else {
        return Ok(None);
    };
    let Some(user) = db::load_user(store, &data.user_id)? else {
        return Ok(None);
    };
    if user.tokens.iter().any(|t| t == token) {
        Ok(Some(user.id))
    } else {
        Ok(None)
    }
}

/// Removes one token; idempotent if the token is already absent.
pub fn revoke_token<D: Documents>(store: &D, user: &mut User, token: &str) -> anyhow::Result<()> {
    user.tokens.retain(|t| t != token);
    db::save_user(store, user)?;
    store.delete_doc(&token_key(token))?;
    Ok(())
}

/// Empties the token set, logging the account out everywhere.
pub fn revoke_all<D: Documents>(store: &D, user: &mut User) -> anyhow::Result<()> {
    let tokens = std::mem::take(&mut user.tokens);
    db::save_user(store, user)?;
    for t in &tokens {
        store.delete_doc(&token_key(t))?;
    }
    info!(user_id = %user.id, revoked = tokens.len(), "revoked all sessions");
    Ok(())
}

pub fn issue_reset_token<D: Documents>(store: &D, user: &mut User) -> anyhow::Result<String> {
    let token = new_token();
    user.reset_tokens.push(token.clone());
    db::save_user(store, user)?;
    store.set_doc(
        &reset_token_key(&token),
        &ResetTokenData {
            user_id: user.id.clone(),
            created_at: now_iso(),
        },
    )?;
    Ok(token)
}

/// Single-use password reset. Expired tokens are removed on contact; a
/// successful reset revokes every session.
pub fn consume_reset_token<D: Documents>(
    store: &D,
    user_id: &str,
    token: &str,
    new_password: &str,
) -> Result<User, ApiError> {
    let Some(mut user) = db::load_user(store, user_id)? else {
        return Err(ApiError::Unauthorized);
    };
    if !user.reset_tokens.iter().any(|t| t == token) {
        return Err(ApiError::Unauthorized);
    }

    let data: Option<ResetTokenData> = store.get_doc(&reset_token_key(token))?;
    let expired = match data {
        Some(d) => match chrono::DateTime::parse_from_rfc3339(&d.created_at) {
            Ok(created) => {
                let age = chrono::Utc::now() - created.with_timezone(&chrono::Utc);
                age.num_minutes() >= reset_token_expiration_minutes()
            }
            Err(_) => true,
        },
        None => true,
    };
    if expired {
        user.reset_tokens.retain(|t| t != token);
        db::save_user(store, &user)?;
        store.delete_doc(&reset_token_key(token))?;
        warn!(user_id = %user.id, "expired reset token presented");
        return Err(ApiError::Unauthorized);
    }

    if new_password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::BadRequest(
            "Password must be at least 6 characters".to_string(),
        ));
    }

    user.password = hash_password(new_password)?;
    user.updated_at = Some(now_iso());
    user.reset_tokens.retain(|t| t != token);
    let sessions = std::mem::take(&mut user.tokens);
    db::save_user(store, &user)?;
    store.delete_doc(&reset_token_key(token))?;
    for t in &sessions {
        store.delete_doc(&token_key(t))?;
    }
    info!(user_id = %user.id, "password reset, sessions revoked");
    Ok(user)
}

// === Auth helper ===

fn bearer_token(req: &Request) -> Option<String> {
    let auth_header = req.header("Authorization")?.as_str().unwrap_or_default();
    let token = auth_header.strip_prefix("Bearer ")?;
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Authentication for protected routes; all failure modes collapse to None.
pub fn validate_token(req: &Request) -> Option<String> {
    let token = bearer_token(req)?;
    let store = store();
    resolve_token(&store, &token).ok()?
}

// === HTTP Handlers ===

pub fn login_user(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let creds: serde_json::Value = serde_json::from_slice(req.body()).unwrap_or_default();
    let email = creds["email"].as_str().unwrap_or_default();
    let password = creds["password"].as_str().unwrap_or_default();

    // Uniform failure: unknown email, unverified account and bad password
    // are indistinguishable to the caller.
    let rejected = || -> Response {
        warn!("login rejected");
        ApiError::BadRequest("Unable to login".to_string()).into()
    };

    let Some(mut user) = db::find_user_by_email(&store, email)? else {
        return Ok(rejected());
    };
    if !user.email_verified || !verify_password(password, &user.password) {
        return Ok(rejected());
    }

    let token = issue_token(&store, &mut user)?;
    info!(user_id = %user.id, "login");

    let resp = serde_json::json!({
        "user": build_user_json(&user),
        "token": token,
    });
    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&resp)?)
        .build())
}

pub fn logout_user(req: Request) -> anyhow::Result<Response> {
    let Some(token) = bearer_token(&req) else {
        return Ok(ApiError::Unauthorized.into());
    };
    let store = store();
    let Some(user_id) = resolve_token(&store, &token)? else {
        return Ok(ApiError::Unauthorized.into());
    };
    if let Some(mut user) = db::load_user(&store, &user_id)? {
        revoke_token(&store, &mut user, &token)?;
    }

    let resp = serde_json::json!({"message": "Logged out successfully"});
    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&resp)?)
        .build())
}

pub fn logout_all(req: Request) -> anyhow::Result<Response> {
    let user_id = match validate_token(&req) {
        Some(uid) => uid,
        None => return Ok(ApiError::Unauthorized.into()),
    };
    let store = store();
    if let Some(mut user) = db::load_user(&store, &user_id)? {
        revoke_all(&store, &mut user)?;
    }

    let resp = serde_json::json!({"message": "Logged out of all sessions"});
    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&resp)?)
        .build())
}

// GET /users/verifyemail/:id/:token. The token from registration doubles
// as the verification secret.
pub fn verify_email(path: &str) -> anyhow::Result<Response> {
    let rest = path.trim_start_matches("/users/verifyemail/");
    let mut parts = rest.splitn(2, '/');
    let user_id = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default();

    let store = store();
    let invalid = || ApiError::BadRequest("Invalid Link".to_string());

    if user_id.is_empty() || token.is_empty() {
        return Ok(invalid().into());
    }
    let Some(mut user) = db::load_user(&store, user_id)? else {
        return Ok(invalid().into());
    };
    if !user.tokens.iter().any(|t| t == token) {
        return Ok(invalid().into());
    }

    user.email_verified = true;
    user.updated_at = Some(now_iso());
    db::save_user(&store, &user)?;
    info!(user_id = %user.id, "email verified");

    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&serde_json::json!({
            "message": "email verified successfully"
        }))?)
        .build())
}

pub fn forget_password(req: Request) -> anyhow::Result<Response> {
    let store = store();
    let body: serde_json::Value = serde_json::from_slice(req.body()).unwrap_or_default();
    let email = body["email"].as_str().unwrap_or_default();

    let user = db::find_user_by_email(&store, email)?;
    let Some(mut user) = user.filter(|u| u.email_verified) else {
        return Ok(ApiError::BadRequest("Unable to send reset link".to_string()).into());
    };

    let reset_token = issue_reset_token(&store, &mut user)?;
    info!(user_id = %user.id, "reset token issued");

    // No mailer in this system; the caller receives the link material.
    let resp = serde_json::json!({
        "id": user.id,
        "resetPasswordToken": reset_token,
    });
    Ok(Response::builder()
        .status(200)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&resp)?)
        .build())
}

// POST /users/:id/:resetPasswordToken
pub fn reset_password(req: Request) -> anyhow::Result<Response> {
    let path = req.path().to_string();
    let rest = path.trim_start_matches("/users/");
    let mut parts = rest.splitn(2, '/');
    let user_id = parts.next().unwrap_or_default().to_string();
    let token = parts.next().unwrap_or_default().to_string();

    if user_id.is_empty() || token.is_empty() {
        return Ok(ApiError::Unauthorized.into());
    }

    let body: serde_json::Value = serde_json::from_slice(req.body()).unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    let store = store();
    match consume_reset_token(&store, &user_id, &token, password) {
        Ok(user) => {
            let resp = serde_json::json!({
                "user": build_user_json(&user),
                "message": "password reset successfully",
            });
            Ok(Response::builder()
                .status(200)
                .header("Content-Type", "application/json")
                .body(serde_json::to_vec(&resp)?)
                .build())
        }
        Err(e) => Ok(e.into()),
    }
}
