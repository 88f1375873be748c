// Hand-maintained table definitions for the chat store tables this node
// reads. The schema is owned by the domain service; the gateway only
// selects from it.

diesel::table! {
    users (id) {
        id -> Int8,
        nickname -> Text,
        avatar -> Text,
        motto -> Text,
    }
}

diesel::table! {
    groups (id) {
        id -> Int8,
        group_name -> Text,
        avatar -> Text,
    }
}

diesel::table! {
    talk_records (id) {
        id -> Int8,
        talk_type -> Int4,
        msg_type -> Int4,
        user_id -> Int8,
        receiver_id -> Int8,
        content -> Text,
        is_revoke -> Int4,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    talk_records_file (id) {
        id -> Int8,
        record_id -> Int8,
        user_id -> Int8,
        file_source -> Int4,
        file_type -> Int4,
        save_type -> Int4,
        original_name -> Text,
        file_suffix -> Text,
        file_size -> Int8,
        save_dir -> Text,
    }
}

diesel::table! {
    talk_records_code (id) {
        id -> Int8,
        record_id -> Int8,
        code_lang -> Text,
        code -> Text,
    }
}

diesel::table! {
    talk_records_forward (id) {
        id -> Int8,
        record_id -> Int8,
        records_id -> Text,
        text -> Text,
    }
}

diesel::table! {
    talk_records_invite (id) {
        id -> Int8,
        record_id -> Int8,
        #[sql_name = "type"]
        type_ -> Int4,
        operate_user_id -> Int8,
        user_ids -> Text,
    }
}

diesel::table! {
    users_friends (id) {
        id -> Int8,
        user_id -> Int8,
        friend_id -> Int8,
        status -> Int4,
    }
}

diesel::table! {
    users_friends_apply (id) {
        id -> Int8,
        user_id -> Int8,
        friend_id -> Int8,
        status -> Int4,
        remark -> Text,
    }
}
