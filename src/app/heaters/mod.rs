// 加热器配置模块
// Heater Configuration Module

pub mod models;
pub mod handlers;
pub mod routes;

pub use models::*;
pub use handlers::*;
pub use routes::*;
