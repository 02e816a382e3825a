pub mod tcp;

pub use tcp::{TcpConnection, TcpConnector};
