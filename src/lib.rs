#[cfg(target_arch = "wasm32")]
use spin_sdk::{
    http::{IntoResponse, Request, Response},
    http_component,
};

pub mod auth;
pub mod config;
pub mod core;
pub mod follow;
pub mod models;
pub mod posts;
pub mod users;
pub mod visibility;

// === Component entrypoint ===
#[cfg(target_arch = "wasm32")]
#[http_component]
fn handle(req: Request) -> anyhow::Result<impl IntoResponse> {
    let path = req.path();
    let method = req.method();

    match (method.to_string().as_str(), path) {
        ("POST", "/users/registration") => users::create_user(req),
        ("GET", p) if p.starts_with("/users/verifyemail/") => auth::verify_email(p),
        ("POST", "/users/login") => auth::login_user(req),
        ("POST", "/users/logout") => auth::logout_user(req),
        ("POST", "/users/logoutAll") => auth::logout_all(req),
        ("POST", "/users/forgetPassword") => auth::forget_password(req),
        ("POST", "/users/me/update") => users::update_profile(req),
        ("GET", "/users/me") => users::get_profile(req),
        ("DELETE", "/users/me") => users::delete_me(req),
        ("POST", "/users/me/profilePicture") => users::upload_avatar(req),
        ("DELETE", "/users/me/profilePicture") => users::delete_avatar(req),
        ("GET", p) if p.starts_with("/users/") && p.ends_with("/profilePicture") => {
            users::get_avatar(p)
        }
        ("PUT", p) if p.starts_with("/users/") && p.ends_with("/follow") => {
            follow::handle_follow(req)
        }
        ("PUT", p) if p.starts_with("/users/") && p.ends_with("/unfollow") => {
            follow::handle_unfollow(req)
        }
        ("POST", "/users/post") => posts::handle_upload(req),
        ("GET", "/users/me/posts") => posts::my_posts(req),
        ("GET", p) if p.starts_with("/users/") && p.ends_with("/posts") => posts::user_posts(req),
        ("GET", "/posts/timeline/all") => visibility::get_timeline(req),
        ("PATCH", p) if p.starts_with("/posts/") && p.ends_with("/update") => {
            posts::handle_update(req)
        }
        ("PUT", p) if p.starts_with("/posts/") && p.ends_with("/like") => {
            visibility::handle_like(req)
        }
        ("POST", p) if p.starts_with("/posts/") && p.ends_with("/comment") => {
            visibility::handle_comment(req)
        }
        ("DELETE", p) if p.starts_with("/posts/") => posts::handle_delete(req),
        // POST /users/:id/:resetPasswordToken
        ("POST", p) if p.starts_with("/users/") && p.matches('/').count() == 3 => {
            auth::reset_password(req)
        }
        _ => Ok(Response::builder().status(404).body("Not found").build()),
    }
}
