use crate::models::ChatRoom;

/// 所有聊天室的根路径
pub const CHATS_ROOT: &str = "chats";

/// 活跃度时间戳的根路径
pub const RELEVANCE_ROOT: &str = "stats/relevance";

/// 房间消息路径：chats/{type}/{id}
pub fn room_path(room: &ChatRoom) -> String {
    format!("{}/{}/{}", CHATS_ROOT, room.room_type, room.room_id)
}

/// 单条消息路径：chats/{type}/{id}/{key}
pub fn message_path(room: &ChatRoom, message_key: &str) -> String {
    format!("{}/{}", room_path(room), message_key)
}

/// 房间活跃度路径：stats/relevance/{type}/{id}
pub fn room_relevance_path(room: &ChatRoom) -> String {
    format!("{}/{}/{}", RELEVANCE_ROOT, room.room_type, room.room_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_scoped_paths() {
        let room = ChatRoom::train("2613");
        assert_eq!(room_path(&room), "chats/train/2613");
        assert_eq!(message_path(&room, "k1"), "chats/train/2613/k1");
        assert_eq!(room_relevance_path(&room), "stats/relevance/train/2613");
    }
}
