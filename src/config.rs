pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 50;
pub const MIN_PASSWORD_LENGTH: usize = 6;
pub const MAX_BIO_LENGTH: usize = 50;
pub const MAX_DESCRIPTION_LENGTH: usize = 50;
pub const MAX_COMMENT_LENGTH: usize = 280;
pub const MAX_IMAGE_BYTES: usize = 1_000_000;
pub const POSTS_PER_PAGE: usize = 20;

pub const USERS_LIST_KEY: &str = "users_list";

pub fn user_key(id: &str) -> String {
    format!("user:{}", id)
}

pub fn post_key(id: &str) -> String {
    format!("post:{}", id)
}

pub fn posts_by_key(owner_id: &str) -> String {
    format!("posts_by:{}", owner_id)
}

pub fn token_key(token: &str) -> String {
    format!("token:{}", token)
}

pub fn reset_token_key(token: &str) -> String {
    format!("reset:{}", token)
}

pub fn reset_token_expiration_minutes() -> i64 {
    std::env::var("PICBOARD_RESET_TOKEN_EXPIRATION_MINUTES")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(20)
}
