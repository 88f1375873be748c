//! Payload enrichment: hydrate a minimal event descriptor into a full
//! notification body from the authoritative store at delivery time.
//!
//! Enrichment never trusts data carried in the event beyond ids, so a
//! client always sees the current row (edits, revoke flag) even when the
//! broker delivered late. A record deleted in the meantime yields `None`
//! and the caller suppresses delivery instead of pushing a partial body.

use serde_json::{json, Value};

use crate::db::store::ChatStore;
use crate::error::ApiError;

use super::events::{
    empty_object, TalkNotify, MSG_TYPE_CODE, MSG_TYPE_FILE, MSG_TYPE_FORWARD, MSG_TYPE_INVITE,
    TALK_TYPE_GROUP,
};

/// Wire format for timestamps in notification bodies.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a comma-separated id list as stored in forward/invite rows.
fn parse_ids(raw: &str) -> Vec<i64> {
    raw.split(',').filter_map(|s| s.trim().parse().ok()).collect()
}

/// Build the full talk notification for a message record.
///
/// Only the sub-table matching the record's `msg_type` is queried;
/// unrelated sub-objects stay `{}`.
pub async fn enrich_talk(
    store: &dyn ChatStore,
    talk_type: i32,
    receiver_id: i64,
    record_id: i64,
) -> Result<Option<TalkNotify>, ApiError> {
    let record = match store.talk_record(record_id).await? {
        Some(record) => record,
        None => return Ok(None),
    };

    let sender = store.user_display(record.user_id).await?;

    let mut notify = TalkNotify {
        id: record.id,
        talk_type: record.talk_type,
        msg_type: record.msg_type,
        user_id: record.user_id,
        receiver_id: record.receiver_id,
        content: record.content.clone(),
        created_at: record.created_at.format(TIME_FORMAT).to_string(),
        is_revoke: record.is_revoke,
        ..TalkNotify::default()
    };

    if let Some(sender) = sender {
        notify.nickname = sender.nickname;
        notify.avatar = sender.avatar;
    }

    if talk_type == TALK_TYPE_GROUP {
        if let Some(group) = store.group_display(receiver_id).await? {
            notify.group_name = group.group_name;
            notify.group_avatar = group.avatar;
        }
    }

    match record.msg_type {
        MSG_TYPE_FILE => {
            if let Some(file) = store.file_detail(record.id).await? {
                notify.file = serde_json::to_value(&file).unwrap_or_else(|_| empty_object());
            }
        }
        MSG_TYPE_FORWARD => {
            notify.forward = match store.forward_detail(record.id).await? {
                Some(forward) => {
                    let list: Value =
                        serde_json::from_str(&forward.text).unwrap_or_else(|_| json!([]));
                    json!({
                        "num": parse_ids(&forward.records_id).len(),
                        "list": list,
                    })
                }
                None => json!({ "num": 0, "list": [] }),
            };
        }
        MSG_TYPE_CODE => {
            if let Some(code) = store.code_detail(record.id).await? {
                notify.code_block = json!({
                    "record_id": code.record_id,
                    "code_lang": code.code_lang,
                    "code": code.code,
                });
            }
        }
        MSG_TYPE_INVITE => {
            if let Some(invite) = store.invite_detail(record.id).await? {
                let operator = store.user_display(invite.operate_user_id).await?;
                let users = store.users_display(&parse_ids(&invite.user_ids)).await?;
                notify.invite = json!({
                    "type": invite.type_,
                    "operate_user": operator
                        .map(|u| json!({ "id": u.id, "nickname": u.nickname }))
                        .unwrap_or_else(empty_object),
                    "users": users
                        .iter()
                        .map(|u| json!({ "id": u.id, "nickname": u.nickname }))
                        .collect::<Vec<_>>(),
                });
            }
        }
        _ => {}
    }

    Ok(Some(notify))
}

/// Build the friend-request notification.
///
/// Returns the recipient user id and the body, or `None` when the apply
/// row (or its counterpart user) no longer exists.
pub async fn enrich_friend_apply(
    store: &dyn ChatStore,
    apply_id: i64,
    apply_type: i32,
) -> Result<Option<(i64, Value)>, ApiError> {
    let apply = match store.friend_apply(apply_id).await? {
        Some(apply) => apply,
        None => return Ok(None),
    };

    // Sub-type 1: a new request — notify the responder about the requester.
    // Sub-type 2: an answered request — notify the requester about the responder.
    let (recipient, counterpart, mut body) = if apply_type == 1 {
        (
            apply.friend_id,
            apply.user_id,
            json!({
                "sender_id": apply.user_id,
                "receiver_id": apply.friend_id,
                "remark": apply.remark,
            }),
        )
    } else {
        (
            apply.user_id,
            apply.friend_id,
            json!({
                "sender_id": apply.friend_id,
                "receiver_id": apply.user_id,
                "status": apply.status,
                "remark": apply.remark,
            }),
        )
    };

    let friend = match store.user_display(counterpart).await? {
        Some(friend) => friend,
        None => return Ok(None),
    };

    body["friend"] = json!({
        "user_id": friend.id,
        "nickname": friend.nickname,
        "avatar": friend.avatar,
        "motto": friend.motto,
    });

    Ok(Some((recipient, body)))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::db::store::MemoryChatStore;
    use crate::models::friend_apply::FriendApply;
    use crate::models::group::Group;
    use crate::models::talk_record::TalkRecord;
    use crate::models::talk_record_file::TalkRecordFile;
    use crate::models::user::User;
    use crate::gateway::events::{MSG_TYPE_TEXT, TALK_TYPE_PRIVATE};

    fn record(id: i64, talk_type: i32, msg_type: i32) -> TalkRecord {
        TalkRecord {
            id,
            talk_type,
            msg_type,
            user_id: 10,
            receiver_id: 20,
            content: "hello".to_string(),
            is_revoke: 0,
            created_at: chrono::Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    fn user(id: i64, nickname: &str) -> User {
        User {
            id,
            nickname: nickname.to_string(),
            avatar: format!("https://cdn/u{id}.png"),
            motto: String::new(),
        }
    }

    #[tokio::test]
    async fn missing_record_yields_none() {
        let store = MemoryChatStore::new();
        let result = enrich_talk(&store, TALK_TYPE_PRIVATE, 20, 99).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn file_message_fills_file_and_leaves_others_empty() {
        let store = MemoryChatStore::new();
        store.add_record(record(99, TALK_TYPE_PRIVATE, MSG_TYPE_FILE));
        store.add_user(user(10, "alice"));
        store.add_file(TalkRecordFile {
            id: 1,
            record_id: 99,
            user_id: 10,
            file_source: 1,
            file_type: 1,
            save_type: 1,
            original_name: "report.pdf".to_string(),
            file_suffix: "pdf".to_string(),
            file_size: 2048,
            save_dir: "2024/05/report.pdf".to_string(),
        });

        let notify = enrich_talk(&store, TALK_TYPE_PRIVATE, 20, 99)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(notify.file["original_name"], "report.pdf");
        assert_eq!(notify.file["file_size"], 2048);
        assert_eq!(notify.code_block, json!({}));
        assert_eq!(notify.forward, json!({}));
        assert_eq!(notify.invite, json!({}));
        assert_eq!(notify.nickname, "alice");
        assert_eq!(notify.created_at, "2024-05-01 12:00:00");
    }

    #[tokio::test]
    async fn group_talk_includes_group_display() {
        let store = MemoryChatStore::new();
        let mut rec = record(50, TALK_TYPE_GROUP, MSG_TYPE_TEXT);
        rec.receiver_id = 300;
        store.add_record(rec);
        store.add_user(user(10, "alice"));
        store.add_group(Group {
            id: 300,
            group_name: "rustaceans".to_string(),
            avatar: "https://cdn/g300.png".to_string(),
        });

        let notify = enrich_talk(&store, TALK_TYPE_GROUP, 300, 50)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(notify.group_name, "rustaceans");
        assert_eq!(notify.group_avatar, "https://cdn/g300.png");
    }

    #[tokio::test]
    async fn text_message_has_no_sub_objects() {
        let store = MemoryChatStore::new();
        store.add_record(record(1, TALK_TYPE_PRIVATE, MSG_TYPE_TEXT));
        store.add_user(user(10, "alice"));

        let notify = enrich_talk(&store, TALK_TYPE_PRIVATE, 20, 1)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(notify.content, "hello");
        assert_eq!(notify.file, json!({}));
    }

    #[tokio::test]
    async fn friend_apply_new_request_targets_responder() {
        let store = MemoryChatStore::new();
        store.add_apply(FriendApply {
            id: 7,
            user_id: 10,
            friend_id: 20,
            status: 0,
            remark: "hi, add me".to_string(),
        });
        store.add_user(user(10, "alice"));

        let (recipient, body) = enrich_friend_apply(&store, 7, 1).await.unwrap().unwrap();
        assert_eq!(recipient, 20);
        assert_eq!(body["sender_id"], 10);
        assert_eq!(body["friend"]["nickname"], "alice");
    }

    #[tokio::test]
    async fn friend_apply_answer_targets_requester() {
        let store = MemoryChatStore::new();
        store.add_apply(FriendApply {
            id: 7,
            user_id: 10,
            friend_id: 20,
            status: 1,
            remark: "hi".to_string(),
        });
        store.add_user(user(20, "bob"));

        let (recipient, body) = enrich_friend_apply(&store, 7, 2).await.unwrap().unwrap();
        assert_eq!(recipient, 10);
        assert_eq!(body["status"], 1);
        assert_eq!(body["friend"]["user_id"], 20);
    }

    #[tokio::test]
    async fn friend_apply_missing_row_yields_none() {
        let store = MemoryChatStore::new();
        assert!(enrich_friend_apply(&store, 404, 1).await.unwrap().is_none());
    }
}
