mod connection;

pub use connection::{Connection, ConnectionReceiver, ConnectionSender};
