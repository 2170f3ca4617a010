use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use spin_sdk::key_value::Store;

use crate::config::*;
use crate::models::models::{Post, User};

/// Keyed JSON documents. Writes are atomic per document only; there are
/// no multi-document transactions.
pub trait Documents {
    fn get_doc<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>>;
    fn set_doc<T: Serialize>(&self, key: &str, value: &T) -> Result<()>;
    fn delete_doc(&self, key: &str) -> Result<()>;
}

impl Documents for Store {
    fn get_doc<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        Ok(self.get_json(key)?)
    }

    fn set_doc<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.set_json(key, value)?;
        Ok(())
    }

    fn delete_doc(&self, key: &str) -> Result<()> {
        self.delete(key)?;
        Ok(())
    }
}

pub fn load_user<D: Documents>(store: &D, id: &str) -> Result<Option<User>> {
    store.get_doc(&user_key(id))
}

pub fn save_user<D: Documents>(store: &D, user: &User) -> Result<()> {
    store.set_doc(&user_key(&user.id), user)
}

pub fn user_ids<D: Documents>(store: &D) -> Result<Vec<String>> {
    Ok(store.get_doc(USERS_LIST_KEY)?.unwrap_or_default())
}

pub fn save_user_ids<D: Documents>(store: &D, ids: &[String]) -> Result<()> {
    store.set_doc(USERS_LIST_KEY, &ids.to_vec())
}

pub fn find_user_by_username<D: Documents>(store: &D, username: &str) -> Result<Option<User>> {
    for id in user_ids(store)? {
        if let Some(u) = load_user(store, &id)? {
            if u.username == username {
                return Ok(Some(u));
            }
        }
    }
    Ok(None)
}

pub fn find_user_by_email<D: Documents>(store: &D, email: &str) -> Result<Option<User>> {
    for id in user_ids(store)? {
        if let Some(u) = load_user(store, &id)? {
            if u.email == email {
                return Ok(Some(u));
            }
        }
    }
    Ok(None)
}

pub fn load_post<D: Documents>(store: &D, id: &str) -> Result<Option<Post>> {
    store.get_doc(&post_key(id))
}

pub fn save_post<D: Documents>(store: &D, post: &Post) -> Result<()> {
    store.set_doc(&post_key(&post.id), post)
}

pub fn owner_post_ids<D: Documents>(store: &D, owner_id: &str) -> Result<Vec<String>> {
    Ok(store.get_doc(&posts_by_key(owner_id))?.unwrap_or_default())
}

pub fn save_owner_post_ids<D: Documents>(store: &D, owner_id: &str, ids: &[String]) -> Result<()> {
    store.set_doc(&posts_by_key(owner_id), &ids.to_vec())
}
