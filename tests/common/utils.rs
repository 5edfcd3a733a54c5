use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

/// True when nothing accepts connections on `port` any more.
pub fn is_refused(port: u16) -> bool {
    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    TcpStream::connect_timeout(&addr, Duration::from_millis(500)).is_err()
}
