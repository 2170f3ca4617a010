use serde::{Serialize, Deserialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar: Option<Vec<u8>>,
    #[serde(default)]
    pub email_verified: bool,
    // Active session tokens; token:{t} index docs must agree with this set.
    #[serde(default)]
    pub tokens: Vec<String>,
    #[serde(default)]
    pub reset_tokens: Vec<String>,
    #[serde(default)]
    pub followers: Vec<String>,
    #[serde(default)]
    pub following: Vec<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub image: Vec<u8>,
    pub description: String,
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Comment {
    pub text: String,
    pub author_id: String,
    pub created_at: String,
}

#[derive(Serialize, Deserialize)]
pub struct TokenData {
    pub user_id: String,
    pub created_at: String,
}

#[derive(Serialize, Deserialize)]
pub struct ResetTokenData {
    pub user_id: String,
    pub created_at: String,
}
