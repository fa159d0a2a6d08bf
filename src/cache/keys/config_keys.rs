/// 远程配置根路径
const CONFIG_PREFIX: &str = "config/";

/// 筛选器保持激活的时长（毫秒）
pub const ACTIVE_FILTER_DURATION_MILLIS: &str = "ACTIVE_FILTER_DURATION_MILLIS";

/// EMMA 接口调用冷却时间（仅上报给界面，不参与新鲜度判断）
pub const EMMA_API_CALL_COOLDOWN: &str = "EMMA_API_CALL_COOLDOWN";

/// 每日消息
pub const MOTD: &str = "MOTD";

/// 随机俏皮话列表
pub const WISECRACKS: &str = "WISECRACKS";

/// 生成配置路径
pub fn config_path(key: &str) -> String {
    format!("{}{}", CONFIG_PREFIX, key)
}
