use serde::{Deserialize, Serialize};

/// A chat participant. `login` is the unique identifier; users are created
/// once and never deleted by this service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
    pub full_name: String,
}

/// A single text message between two logins.
///
/// Storage identity is the triple `(login_to, login_from, created_at)`.
/// The triple is not unique: two messages from the same sender to the same
/// recipient within the same second land on the same store key and the
/// second overwrites the first. Kept for compatibility with the deployed
/// key layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub login_from: String,
    pub login_to: String,
    /// Unix seconds, stamped by the server at send time.
    pub created_at: i32,
    pub body: String,
}
