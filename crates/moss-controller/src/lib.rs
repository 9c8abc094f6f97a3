//! ---
//! moss_section: "05-networking-external-interfaces"
//! moss_subsection: "module"
//! moss_type: "source"
//! moss_scope: "code"
//! moss_description: "Controller link trait and its network/simulator variants."
//! moss_version: "v0.0.0-prealpha"
//! moss_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

use moss_common::{SensorKind, StoragePartition, TcpipConfig};

/// Connect timeout applied by the simulator-backed link. The simulator is
/// loopback-local, so the configured device timeout does not apply.
const SIM_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors raised by controller link operations.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("connection to {endpoint} timed out after {timeout:?}")]
    Timeout {
        endpoint: String,
        timeout: Duration,
    },
    #[error("connection to {endpoint} refused: {source}")]
    Refused {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },
    #[error("protocol mismatch: {0}")]
    Protocol(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stateful session to the device controller.
///
/// Variants are selected at construction time: [`NetworkControllerLink`] talks
/// to the real device endpoint, [`SimulatorControllerLink`] to the local
/// simulator. Connect failures are not retried here; the caller decides.
#[async_trait]
pub trait ControllerLink: Send {
    /// Establish a session with the device. No-op when already connected.
    async fn connect(&mut self) -> Result<(), ControllerError>;
    /// Drop the session. Idempotent: disconnecting while disconnected is a no-op.
    async fn disconnect(&mut self) -> Result<(), ControllerError>;
    /// Whether a session is currently established.
    fn connected(&self) -> bool;
    /// Device sub-type this link is configured for.
    fn kind(&self) -> SensorKind;
    /// Storage partition used to archive this device's data products.
    fn partition(&self) -> StoragePartition;
}

type Session = BufReader<TcpStream>;

/// Connect to `endpoint` and consume the device banner.
///
/// The device identifies itself with `MOSS,<beams>,ready` on accept; a banner
/// for a different beam count means the endpoint is not the configured device.
async fn open_session(
    endpoint: &str,
    connect_timeout: Duration,
    kind: SensorKind,
) -> Result<Session, ControllerError> {
    let stream = timeout(connect_timeout, TcpStream::connect(endpoint))
        .await
        .map_err(|_| ControllerError::Timeout {
            endpoint: endpoint.to_owned(),
            timeout: connect_timeout,
        })?
        .map_err(|source| ControllerError::Refused {
            endpoint: endpoint.to_owned(),
            source,
        })?;

    let mut session = BufReader::new(stream);
    let mut banner = String::new();
    timeout(connect_timeout, session.read_line(&mut banner))
        .await
        .map_err(|_| ControllerError::Timeout {
            endpoint: endpoint.to_owned(),
            timeout: connect_timeout,
        })??;

    let expected = format!("MOSS,{},ready", kind.beams());
    let received = banner.trim_end();
    if received != expected {
        return Err(ControllerError::Protocol(format!(
            "expected banner {expected:?}, device sent {received:?}"
        )));
    }
    info!(endpoint, banner = received, "controller session established");
    Ok(session)
}

async fn close_session(session: &mut Option<Session>) -> Result<(), ControllerError> {
    let Some(mut session) = session.take() else {
        debug!("disconnect requested while already disconnected");
        return Ok(());
    };
    session.get_mut().shutdown().await?;
    Ok(())
}

/// Link to the real device controller at the configured `hostname:port`.
#[derive(Debug)]
pub struct NetworkControllerLink {
    endpoint: String,
    connect_timeout: Duration,
    kind: SensorKind,
    partition: StoragePartition,
    session: Option<Session>,
}

impl NetworkControllerLink {
    pub fn new(tcpip: &TcpipConfig, kind: SensorKind, partition: StoragePartition) -> Self {
        Self {
            endpoint: tcpip.endpoint(),
            connect_timeout: tcpip.timeout(),
            kind,
            partition,
            session: None,
        }
    }
}

#[async_trait]
impl ControllerLink for NetworkControllerLink {
    async fn connect(&mut self) -> Result<(), ControllerError> {
        if self.session.is_some() {
            debug!(endpoint = %self.endpoint, "connect requested while already connected");
            return Ok(());
        }
        let session = open_session(&self.endpoint, self.connect_timeout, self.kind).await?;
        self.session = Some(session);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ControllerError> {
        close_session(&mut self.session).await
    }

    fn connected(&self) -> bool {
        self.session.is_some()
    }

    fn kind(&self) -> SensorKind {
        self.kind
    }

    fn partition(&self) -> StoragePartition {
        self.partition
    }
}

/// Link to the local simulator's endpoint, used while simulation is active.
#[derive(Debug)]
pub struct SimulatorControllerLink {
    addr: SocketAddr,
    kind: SensorKind,
    partition: StoragePartition,
    session: Option<Session>,
}

impl SimulatorControllerLink {
    pub fn new(addr: SocketAddr, kind: SensorKind, partition: StoragePartition) -> Self {
        Self {
            addr,
            kind,
            partition,
            session: None,
        }
    }
}

#[async_trait]
impl ControllerLink for SimulatorControllerLink {
    async fn connect(&mut self) -> Result<(), ControllerError> {
        if self.session.is_some() {
            debug!(addr = %self.addr, "connect requested while already connected");
            return Ok(());
        }
        let endpoint = self.addr.to_string();
        let session = open_session(&endpoint, SIM_CONNECT_TIMEOUT, self.kind).await?;
        self.session = Some(session);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ControllerError> {
        close_session(&mut self.session).await
    }

    fn connected(&self) -> bool {
        self.session.is_some()
    }

    fn kind(&self) -> SensorKind {
        self.kind
    }

    fn partition(&self) -> StoragePartition {
        self.partition
    }
}
