// 远程命令模块
// Remote Command Module

pub mod models;
pub mod handlers;
pub mod routes;

pub use models::*;
pub use handlers::*;
pub use routes::*;
