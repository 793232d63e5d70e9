// 服务器模块入口
// Relay server: listener setup, client registry, readiness wait, accept/relay dispatch

pub mod acceptor;
pub mod connection;
pub mod listener;
pub mod multiplexer;
pub mod relay;
pub mod signal;
pub mod stats;
pub mod table;

// Rust 不允许 loop 作为模块名（关键字），改用 server_loop
#[path = "loop.rs"]
pub mod server_loop;

// 重新导出常用类型
pub use connection::ConnectionId;
pub use listener::create_listener;
pub use server_loop::ServerLoop;
pub use signal::shutdown_signal;
