use diesel::prelude::*;

use crate::db::schema::users_friends_apply;

/// A pending or answered friend request.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users_friends_apply)]
pub struct FriendApply {
    pub id: i64,
    pub user_id: i64,
    pub friend_id: i64,
    pub status: i32,
    pub remark: String,
}
