// 路由处理

pub mod chat;
pub mod config;
pub mod trains;
