//! MCP adapter: exposes the lifecycle manager's operations as tools over
//! stdio.

pub mod server;
pub mod tools;

#[cfg(test)]
mod tests;

pub use server::ParleyMcpServer;
