use diesel::prelude::*;
use serde::Serialize;

use crate::db::schema::talk_records_file;

/// File attachment sub-record for `msg_type` file messages.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = talk_records_file)]
pub struct TalkRecordFile {
    pub id: i64,
    pub record_id: i64,
    pub user_id: i64,
    pub file_source: i32,
    pub file_type: i32,
    pub save_type: i32,
    pub original_name: String,
    pub file_suffix: String,
    pub file_size: i64,
    pub save_dir: String,
}
