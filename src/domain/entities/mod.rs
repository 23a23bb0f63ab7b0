pub mod health;
pub mod inbound_address;
pub mod inbound_connection;
pub mod job;
pub mod marketplace_oauth;

pub use health::*;
pub use inbound_address::*;
pub use inbound_connection::*;
pub use job::*;
pub use marketplace_oauth::*;
