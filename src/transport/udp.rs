//! UDP transport for real processes.
//!
//! Endpoint `(id, port)` lives at `host:(base_port + id)`. The logical port is
//! carried in messages but does not take part in addressing.
//!
//! Sends go through a non-blocking clone of the node's socket so the engine can
//! call them synchronously from inside a tick; the async half of the same
//! socket is read by the node runtime.

use bytes::Bytes;
use std::net::{IpAddr, SocketAddr, UdpSocket};

use super::Transport;
use crate::membership::error::{MembershipError, Result};
use crate::membership::types::Endpoint;

/// Maps endpoints onto socket addresses.
#[derive(Debug, Clone, Copy)]
pub struct AddressPlan {
    pub host: IpAddr,
    pub base_port: u16,
}

impl AddressPlan {
    pub fn new(host: IpAddr, base_port: u16) -> Self {
        Self { host, base_port }
    }

    pub fn socket_addr(&self, endpoint: Endpoint) -> Result<SocketAddr> {
        u16::try_from(endpoint.id)
            .ok()
            .filter(|id| *id > 0)
            .and_then(|id| self.base_port.checked_add(id))
            .map(|port| SocketAddr::new(self.host, port))
            .ok_or(MembershipError::UnknownEndpoint(endpoint))
    }
}

pub struct UdpTransport {
    socket: UdpSocket,
    plan: AddressPlan,
}

impl UdpTransport {
    pub fn new(socket: UdpSocket, plan: AddressPlan) -> Self {
        Self { socket, plan }
    }

    /// Bind `addr` and split it into a sender and a tokio receiver.
    pub fn bind(addr: SocketAddr, plan: AddressPlan) -> std::io::Result<(Self, tokio::net::UdpSocket)> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_nonblocking(true)?;
        let sender = socket.try_clone()?;
        let receiver = tokio::net::UdpSocket::from_std(socket)?;
        Ok((Self::new(sender, plan), receiver))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl Transport for UdpTransport {
    fn send(&self, _from: Endpoint, to: Endpoint, payload: Bytes) -> Result<()> {
        let addr = self.plan.socket_addr(to)?;
        self.socket
            .send_to(&payload, addr)
            .map_err(|e| MembershipError::Transport(format!("send to {} failed: {}", addr, e)))?;
        Ok(())
    }
}
