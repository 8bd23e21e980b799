use serde::{Deserialize, Serialize};

use crate::models::User;

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    pub login: String,
    pub full_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
}

// -- Messages --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub login_from: String,
    pub login_to: String,
    pub body: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    /// Human-readable receipt, `"<login_to> received message from <login_from>"`.
    /// Returned whenever storage succeeds, whether or not `login_to` exists.
    pub status: String,
}

// -- Subscriptions --

#[derive(Debug, Deserialize)]
pub struct SubscribeQuery {
    pub login: String,
}
