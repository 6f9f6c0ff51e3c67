//! JSON-RPC 2.0 control socket.
//!
//! Newline-delimited JSON over TCP. Clients (the TUI, `ditd ctl`, scripts)
//! read the card collection and send operator commands through it.
//!
//! - `protocol`: request/response types and error codes
//! - `transport`: TCP listener and line framing
//! - `methods`: method dispatch onto the engine and the transcode desk
//! - `client`: client used by the CLI and TUI

pub mod client;
pub mod methods;
mod protocol;
mod transport;

use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;

use crate::context::AppContext;
use transport::Transport;

pub use client::{ClientError, RpcClient};
pub use methods::{CommandResult, DaemonStatus, MethodHandler, SizeEstimate};
pub use protocol::{Request, Response, RpcError, codes};

pub struct RpcServer {
    transport: Transport,
}

impl RpcServer {
    pub fn new(ctx: AppContext, bind_addr: SocketAddr) -> Self {
        Self::with_handler(MethodHandler::new(ctx), bind_addr)
    }

    pub fn with_handler(handler: MethodHandler, bind_addr: SocketAddr) -> Self {
        Self {
            transport: Transport::new(bind_addr, handler),
        }
    }

    /// Bind and serve until `cancel` fires.
    pub async fn start(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        let listener = self.transport.bind().await?;
        self.transport.serve(listener, cancel).await
    }

    /// Bind now, serve in the background. Returns the bound address, useful with port 0.
    pub async fn spawn(self, cancel: CancellationToken) -> anyhow::Result<SocketAddr> {
        let listener = self.transport.bind().await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            if let Err(e) = self.transport.serve(listener, cancel).await {
                tracing::warn!(error = %e, "RPC server stopped");
            }
        });
        Ok(addr)
    }
}
