mod handler;
mod model;

pub use handler::{clear_cache, get_cache_status, get_trains, set_connectivity};
pub use model::{CacheStatus, ConnectivityRequest, ConnectivityStatus};
