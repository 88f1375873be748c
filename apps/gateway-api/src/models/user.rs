use diesel::prelude::*;
use serde::Serialize;

use crate::db::schema::users;

/// Display row for a chat user. Only the fields the fan-out layer embeds
/// in notification bodies.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i64,
    pub nickname: String,
    pub avatar: String,
    pub motto: String,
}
