/// 缓存键模块
/// 远程缓存路径与本地缓存键

// 车辆位置路径
pub mod vehicle_keys;

// 聊天路径
pub mod chat_keys;

// 远程配置路径
pub mod config_keys;

pub use chat_keys::{CHATS_ROOT, RELEVANCE_ROOT, message_path, room_path, room_relevance_path};
pub use config_keys::{
    ACTIVE_FILTER_DURATION_MILLIS, EMMA_API_CALL_COOLDOWN, MOTD, WISECRACKS, config_path,
};
pub use vehicle_keys::{
    LOCAL_TRAINS_KEY, LOCAL_TRAINS_LAST_UPDATED_KEY, VEHICLE_POSITIONS_PATH,
    VEHICLE_POSITIONS_RELEVANCE_PATH,
};

/// 路径段中不允许出现的字符
const FORBIDDEN_SEGMENT_CHARS: [char; 6] = ['/', '.', '#', '$', '[', ']'];

/// 判断字符串能否作为路径中的一段
pub fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment
            .chars()
            .any(|c| c.is_control() || FORBIDDEN_SEGMENT_CHARS.contains(&c))
}

/// 拆分路径，忽略多余的斜杠
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// 规范化路径："/a//b/" -> "a/b"
pub fn normalize(path: &str) -> String {
    segments(path).join("/")
}

pub fn join(parent: &str, child: &str) -> String {
    let parent = normalize(parent);
    if parent.is_empty() {
        normalize(child)
    } else {
        format!("{}/{}", parent, normalize(child))
    }
}

/// 拆出父路径和最后一段；根路径返回 None
pub fn split_last(path: &str) -> Option<(String, String)> {
    let mut parts = segments(path);
    let last = parts.pop()?;
    Some((parts.join("/"), last.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_reject_reserved_characters() {
        assert!(is_valid_segment("2613"));
        assert!(is_valid_segment("(empty)"));
        assert!(is_valid_segment("Győr-Moson-Sopron"));
        assert!(!is_valid_segment(""));
        assert!(!is_valid_segment("a/b"));
        assert!(!is_valid_segment("a.b"));
        assert!(!is_valid_segment("x$"));
    }

    #[test]
    fn paths_normalize_and_split() {
        assert_eq!(normalize("/chats//train/"), "chats/train");
        assert_eq!(join("chats", "train/42"), "chats/train/42");
        assert_eq!(join("", "config"), "config");
        assert_eq!(
            split_last("chats/train/42"),
            Some(("chats/train".to_string(), "42".to_string()))
        );
        assert_eq!(split_last("config"), Some((String::new(), "config".to_string())));
        assert_eq!(split_last("/"), None);
    }
}
