mod handler;
mod model;

pub use handler::{
    evict_old_messages, get_relevances, get_reports, remove_message, room_events, send_message,
};
pub use model::{RoomEvent, SendMessageRequest};
