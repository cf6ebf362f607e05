//! TCP serving and request dispatch.
//!
//! - [`server`] - accepts connections and runs one framed request/response
//!   loop per connection
//! - [`handler`] - answers ApiVersions, DescribeTopicPartitions and Fetch
//!   from the metadata index and the partition logs
//!
//! Requests on one connection are answered strictly in order. Connections
//! are independent: a malformed frame closes only the connection it arrived
//! on.

pub mod handler;
pub mod server;

pub use handler::*;
pub use server::*;
