//! ---
//! moss_section: "11-simulation"
//! moss_subsection: "module"
//! moss_type: "source"
//! moss_scope: "code"
//! moss_description: "Local simulator for the sensor controller endpoint."
//! moss_version: "v0.0.0-prealpha"
//! moss_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use moss_common::SensorKind;

/// Bound on how long [`SensorSimulator::start`] waits for the listening
/// endpoint to accept connections.
const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// Seed for the seeing-sample generator. Fixed so simulated runs replay the
/// same measurement stream.
const SEEING_SEED: u64 = 0x5EE1_u64;

/// Errors raised while bringing the simulator endpoint up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind simulator endpoint: {0}")]
    Bind(#[from] std::io::Error),
    #[error("simulator endpoint did not accept connections within {0:?}")]
    Timeout(Duration),
}

/// In-process stand-in for the device controller endpoint.
///
/// Serves the device line protocol on an ephemeral loopback port: a banner on
/// accept, then `MEAS` and `STAT` commands. Measurement framing is
/// parameterized by [`SensorKind`], one seeing sample per beam.
///
/// At most one simulator may be alive per process; the orchestrator owns the
/// only reference and must [`close`](SensorSimulator::close) it before
/// starting another.
#[derive(Debug)]
pub struct SensorSimulator {
    kind: SensorKind,
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    accept_task: Option<JoinHandle<()>>,
}

impl SensorSimulator {
    /// Bind a loopback listener and serve the device protocol for `kind`.
    ///
    /// Resolves once the endpoint demonstrably accepts connections; fails
    /// with [`StartupError`] after an internal timeout otherwise.
    pub async fn start(kind: SensorKind) -> Result<Self, StartupError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let local_addr = listener.local_addr()?;
        let (shutdown, shutdown_rx) = watch::channel(false);
        let accept_task = tokio::spawn(accept_loop(listener, kind, shutdown_rx));

        // Probe the endpoint so callers only proceed once connects succeed.
        match timeout(READY_TIMEOUT, TcpStream::connect(local_addr)).await {
            Ok(Ok(probe)) => drop(probe),
            Ok(Err(err)) => {
                accept_task.abort();
                return Err(StartupError::Bind(err));
            }
            Err(_) => {
                accept_task.abort();
                return Err(StartupError::Timeout(READY_TIMEOUT));
            }
        }

        debug!(%local_addr, kind = %kind, "simulator listening");
        Ok(Self {
            kind,
            local_addr,
            shutdown,
            accept_task: Some(accept_task),
        })
    }

    /// Device sub-type this simulator emulates.
    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    /// Address of the listening endpoint.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop listening and release the port. Idempotent.
    pub async fn close(&mut self) {
        let Some(task) = self.accept_task.take() else {
            return;
        };
        let _ = self.shutdown.send(true);
        if let Err(err) = task.await {
            if !err.is_cancelled() {
                warn!(error = %err, "simulator accept loop ended abnormally");
            }
        }
        debug!(local_addr = %self.local_addr, "simulator closed");
    }
}

impl Drop for SensorSimulator {
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.take() {
            let _ = self.shutdown.send(true);
            task.abort();
        }
    }
}

async fn accept_loop(listener: TcpListener, kind: SensorKind, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("simulator shutdown signal received");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "simulator client connected");
                        tokio::spawn(serve_client(stream, kind));
                    }
                    Err(err) => {
                        warn!(error = %err, "simulator accept failed");
                    }
                }
            }
        }
    }
}

async fn serve_client(stream: TcpStream, kind: SensorKind) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let mut rng = StdRng::seed_from_u64(SEEING_SEED);

    let banner = format!("MOSS,{},ready\r\n", kind.beams());
    if writer.write_all(banner.as_bytes()).await.is_err() {
        return;
    }

    while let Ok(Some(line)) = lines.next_line().await {
        let reply = match line.trim() {
            "MEAS" => measurement_frame(kind, &mut rng),
            "STAT" => format!("STATUS,ready,beams={}\r\n", kind.beams()),
            "" => continue,
            other => {
                debug!(command = other, "simulator received unknown command");
                "ERR,unknown command\r\n".to_owned()
            }
        };
        if writer.write_all(reply.as_bytes()).await.is_err() {
            break;
        }
    }
}

/// One seeing sample per beam, arcseconds, comma separated.
fn measurement_frame(kind: SensorKind, rng: &mut StdRng) -> String {
    let samples: Vec<String> = (0..kind.beams())
        .map(|_| format!("{:.3}", rng.gen_range(0.4_f64..1.2_f64)))
        .collect();
    format!("SEEING,{}\r\n", samples.join(","))
}
