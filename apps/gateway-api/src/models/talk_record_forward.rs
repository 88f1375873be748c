use diesel::prelude::*;

use crate::db::schema::talk_records_forward;

/// Forward sub-record: `records_id` is a comma-separated id list and
/// `text` a JSON summary of the forwarded messages.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = talk_records_forward)]
pub struct TalkRecordForward {
    pub id: i64,
    pub record_id: i64,
    pub records_id: String,
    pub text: String,
}
