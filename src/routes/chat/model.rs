use serde::{Deserialize, Serialize};

use crate::cache::ChildEventKind;
use crate::models::message::find_report;
use crate::models::{ChatRoom, ChatRoomType, Message, NewMessage};

/// 发送消息请求；带 reportId 时用预设报告覆盖类型、内容和颜色
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(default)]
    pub report_id: Option<String>,
    #[serde(flatten)]
    pub message: NewMessage,
}

impl SendMessageRequest {
    pub fn into_new_message(self) -> Result<NewMessage, String> {
        let Some(report_id) = self.report_id else {
            return Ok(self.message);
        };
        let report =
            find_report(&report_id).ok_or_else(|| format!("unknown report: {}", report_id))?;

        Ok(NewMessage {
            message_type: report.message_type,
            content: report.content.to_string(),
            color: report.color,
            ..self.message
        })
    }
}

/// 推送给 SSE 连接的房间事件
#[derive(Debug, Serialize)]
pub struct RoomEvent {
    pub kind: ChildEventKind,
    pub message: Message,
}

impl RoomEvent {
    pub fn event_name(&self) -> &'static str {
        match self.kind {
            ChildEventKind::Added => "added",
            ChildEventKind::Removed => "removed",
        }
    }
}

pub fn parse_room(room_type: &str, room_id: &str) -> Result<ChatRoom, String> {
    let room = ChatRoom::new(room_type.parse::<ChatRoomType>()?, room_id);
    if !room.is_valid() {
        return Err(format!("invalid room id: {:?}", room_id));
    }
    Ok(room)
}
