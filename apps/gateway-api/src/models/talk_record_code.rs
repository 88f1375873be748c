use diesel::prelude::*;
use serde::Serialize;

use crate::db::schema::talk_records_code;

/// Code-block sub-record for `msg_type` code messages.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = talk_records_code)]
pub struct TalkRecordCode {
    pub id: i64,
    pub record_id: i64,
    pub code_lang: String,
    pub code: String,
}
