//! Control surface configuration

use std::net::{Ipv4Addr, SocketAddr};

/// Default control surface port
pub const DEFAULT_PORT: u16 = 8091;

/// Control surface options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self { bind_addr: addr }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set only the port, keeping the bind IP
    pub fn port(mut self, port: u16) -> Self {
        self.bind_addr.set_port(port);
        self
    }
}
