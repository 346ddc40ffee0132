//! Free local port discovery for isolated renderer instances

use crate::PreviewError;
use std::net::{Ipv4Addr, TcpListener};
use tracing::debug;

/// Source of ports for binding one renderer process per request
#[cfg_attr(test, mockall::automock)]
pub trait PortAllocator: Send + Sync {
    fn allocate(&self) -> Result<u16, PreviewError>;
}

/// Asks the OS for an ephemeral port on the loopback interface
///
/// The probe listener is closed before returning, so the port is free but not
/// reserved; the renderer binds it immediately after.
#[derive(Debug, Clone, Default)]
pub struct LocalPortAllocator;

impl PortAllocator for LocalPortAllocator {
    fn allocate(&self) -> Result<u16, PreviewError> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).map_err(|e| {
            PreviewError::ResourceUnavailable(format!("no free local port: {e}"))
        })?;
        let port = listener
            .local_addr()
            .map_err(|e| PreviewError::ResourceUnavailable(format!("no free local port: {e}")))?
            .port();

        debug!("Allocated renderer port {}", port);
        Ok(port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocates_nonzero_port() {
        let port = LocalPortAllocator.allocate().unwrap();
        assert_ne!(port, 0);
    }

    #[test]
    fn test_allocated_port_is_bindable() {
        let port = LocalPortAllocator.allocate().unwrap();
        assert!(TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_ok());
    }
}
