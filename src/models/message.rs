use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cache::keys::is_valid_segment;

/// 聊天室类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRoomType {
    Territory,
    Train,
}

impl ChatRoomType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRoomType::Territory => "territory",
            ChatRoomType::Train => "train",
        }
    }
}

impl fmt::Display for ChatRoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatRoomType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "territory" => Ok(ChatRoomType::Territory),
            "train" => Ok(ChatRoomType::Train),
            other => Err(format!("unknown chat room type: {}", other)),
        }
    }
}

/// 聊天室：类型 + 标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRoom {
    pub room_type: ChatRoomType,
    pub room_id: String,
}

impl ChatRoom {
    pub fn new(room_type: ChatRoomType, room_id: impl Into<String>) -> Self {
        Self {
            room_type,
            room_id: room_id.into(),
        }
    }

    pub fn train(room_id: impl Into<String>) -> Self {
        Self::new(ChatRoomType::Train, room_id)
    }

    pub fn territory(room_id: impl Into<String>) -> Self {
        Self::new(ChatRoomType::Territory, room_id)
    }

    /// 房间标识会直接成为存储路径的一段
    pub fn is_valid(&self) -> bool {
        is_valid_segment(&self.room_id)
    }
}

impl fmt::Display for ChatRoom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.room_type, self.room_id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Text,
    Report,
    LocationPing,
}

/// 消息颜色标签（ARGB）
pub struct MessageColor;

impl MessageColor {
    pub const DEFAULT: u32 = 0x0000_0000;
    pub const WARNING: u32 = 0xFFFF_A500;
    pub const ERROR: u32 = 0xFFFF_0000;
    pub const BLUE: u32 = 0xFF00_00FF;
}

/// 已存储的聊天消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// 服务器键，不写入消息体
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub timestamp: i64,
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub color: u32,
}

impl Message {
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// 内容长度按字符计
    pub fn content_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// 发送方提交的新消息
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub sender_id: String,
    #[serde(default)]
    pub sender_name: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub color: u32,
    /// 不提供时使用当前时间
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl NewMessage {
    pub fn text(sender_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender_id: sender_id.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn from_report(sender_id: impl Into<String>, report: &PredefinedReport) -> Self {
        Self {
            sender_id: sender_id.into(),
            message_type: report.message_type,
            content: report.content.to_string(),
            color: report.color,
            ..Self::default()
        }
    }

    pub fn into_message(self, timestamp: i64) -> Message {
        Message {
            key: None,
            timestamp: self.timestamp.filter(|ts| *ts > 0).unwrap_or(timestamp),
            sender_id: self.sender_id,
            sender_name: self.sender_name,
            message_type: self.message_type,
            content: self.content,
            location: self.location,
            color: self.color,
        }
    }
}

/// 预设的乘客报告
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredefinedReport {
    pub id: &'static str,
    pub message_type: MessageType,
    pub content: &'static str,
    pub color: u32,
}

const fn report(id: &'static str, content: &'static str, color: u32) -> PredefinedReport {
    PredefinedReport {
        id,
        message_type: MessageType::Report,
        content,
        color,
    }
}

pub const LOCATION_PING: PredefinedReport = PredefinedReport {
    id: "LOCATION_PING",
    message_type: MessageType::LocationPing,
    content: "Hely küldése üzenet nélkül",
    color: MessageColor::DEFAULT,
};

pub const REPORT_OPTIONS: [PredefinedReport; 14] = [
    LOCATION_PING,
    report("REPORT_SEAT_TICKET", "Helyjeggyel utazom", MessageColor::ERROR),
    report("REPORT_REPLACEMENT_BUS", "Pótlóbusz", MessageColor::ERROR),
    report(
        "REPORT_OPTION_DELAY_MINOR",
        "Kis késés (5-15 perc)",
        MessageColor::WARNING,
    ),
    report(
        "REPORT_OPTION_DELAY_MODERATE",
        "Közepes késés (15-60 perc)",
        MessageColor::WARNING,
    ),
    report("REPORT_OPTION_DELAY_MAJOR", "Nagy késés (1 óra+)", MessageColor::ERROR),
    report(
        "REPORT_TEMPERATURE_HIGH",
        "Nincs légkondi / meleg van",
        MessageColor::WARNING,
    ),
    report(
        "REPORT_TEMPERATURE_LOW",
        "Nincs fűtés / hideg van",
        MessageColor::WARNING,
    ),
    report("REPORT_TRAIN_STOPPED", "Vonat megállt", MessageColor::ERROR),
    report("REPORT_TRACK_BLOCKED", "Pálya elzárva", MessageColor::ERROR),
    report("REPORT_TECHNICAL_ISSUE", "Műszaki hiba", MessageColor::ERROR),
    report(
        "REPORT_EMERGENCY_ACCIDENT",
        "Vészhelyzet / baleset",
        MessageColor::ERROR,
    ),
    report("REPORT_CROWDING", "Tömeg / zsúfoltság", MessageColor::WARNING),
    report(
        "REPORT_POLICE_ACTIVITY",
        "Rendőrségi intézkedés",
        MessageColor::BLUE,
    ),
];

pub fn find_report(id: &str) -> Option<&'static PredefinedReport> {
    REPORT_OPTIONS.iter().find(|report| report.id == id)
}

/// 各房间最近活跃时间
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRelevances {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub train: Option<BTreeMap<String, i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub territory: Option<BTreeMap<String, i64>>,
}
