mod handler;
mod model;

pub use handler::{get_config, get_territories};
pub use model::ClientConfig;
