//! Users and their API tokens.

use entity_sync_macros::Entity;
use serde::{Deserialize, Serialize};

/// User account
#[derive(Entity, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Primary key
    #[primary_key]
    pub id: u32,
    /// Login name
    pub username: String,
    /// Email address
    #[serde(default)]
    pub email: String,
    /// Whether the user is an administrator
    #[serde(default)]
    pub is_superuser: bool,
}

/// API token belonging to the current user
#[derive(Entity, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Primary key
    #[primary_key]
    pub id: u32,
    /// OAuth consumer key
    pub key: String,
    /// OAuth secret
    pub secret: String,
    /// Consumer details
    pub consumer: TokenConsumer,
}

/// Consumer a token was issued for
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConsumer {
    /// Consumer key
    pub key: String,
    /// Human readable name
    pub name: String,
}
