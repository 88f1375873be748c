pub mod friend_apply;
pub mod group;
pub mod talk_record;
pub mod talk_record_code;
pub mod talk_record_file;
pub mod talk_record_forward;
pub mod talk_record_invite;
pub mod user;
