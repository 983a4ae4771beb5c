use serde::{Deserialize, Serialize};

// Row of the `todo` table. `active` is 1 for open items, 0 for completed ones.
#[derive(Debug, sqlx::FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Todo {
    pub todo_id: i64,
    pub description: String,
    pub active: i64,
}

// Identity resolved by a credential manager or decoded from an access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
}
