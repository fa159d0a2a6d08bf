// 领域数据模型

pub mod message;
pub mod territory;
pub mod vehicle;

pub use message::{
    ChatRelevances, ChatRoom, ChatRoomType, Message, MessageColor, MessageType, NewMessage,
    PredefinedReport, REPORT_OPTIONS,
};
pub use territory::{TERRITORIES, Territory};
pub use vehicle::{TrainsData, VehiclePosition};
