/// 远程缓存中的车辆位置集合（以车次名为键）
pub const VEHICLE_POSITIONS_PATH: &str = "vehiclePositions";

/// 车辆位置集合的新鲜度记录
pub const VEHICLE_POSITIONS_RELEVANCE_PATH: &str = "stats/relevance/vehiclePositions";

/// 本地缓存：序列化后的车辆位置数组
pub const LOCAL_TRAINS_KEY: &str = "trains";

/// 本地缓存：最后更新时间（毫秒，十进制字符串）
pub const LOCAL_TRAINS_LAST_UPDATED_KEY: &str = "trainsLastUpdated";
