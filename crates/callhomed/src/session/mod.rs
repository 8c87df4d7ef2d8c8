//! Session handoff
//!
//! A worker's job ends at the TCP connect; everything protocol-shaped —
//! handshake, authentication, keep-alive enforcement — belongs to the
//! session handler the established socket is handed to.

mod subprocess;

pub use subprocess::SubprocessSessionHandler;

use async_trait::async_trait;
use tokio::net::TcpStream;

use callhome_core::error::SessionError;
use callhome_core::types::Application;

/// Runs the secured protocol session over an established connection.
///
/// The call blocks until the session terminates, by any cause. Dropping the
/// returned future must tear the session down, so that worker cancellation
/// propagates.
#[async_trait]
pub trait SessionHandler: Send + Sync {
    /// Run one session to completion
    async fn run_session(&self, app: &Application, stream: TcpStream) -> Result<(), SessionError>;
}
