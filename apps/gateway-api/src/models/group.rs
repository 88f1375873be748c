use diesel::prelude::*;
use serde::Serialize;

use crate::db::schema::groups;

/// Display row for a group chat.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = groups)]
pub struct Group {
    pub id: i64,
    pub group_name: String,
    pub avatar: String,
}
