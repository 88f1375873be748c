use diesel::prelude::*;

use crate::db::schema::talk_records_invite;

/// Group invite/kick sub-record. `user_ids` is a comma-separated id list.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = talk_records_invite)]
pub struct TalkRecordInvite {
    pub id: i64,
    pub record_id: i64,
    pub type_: i32,
    pub operate_user_id: i64,
    pub user_ids: String,
}
