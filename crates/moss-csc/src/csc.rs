//! ---
//! moss_section: "01-core-functionality"
//! moss_subsection: "module"
//! moss_type: "source"
//! moss_scope: "code"
//! moss_description: "State-transition handler driving simulator, bucket, and controller."
//! moss_version: "v0.0.0-prealpha"
//! moss_owner: "tbd"
//! ---
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use moss_common::{ConfigError, FaultCode, InstanceConfig, MossConfig, SensorKind, State};
use moss_controller::{ControllerLink, NetworkControllerLink, SimulatorControllerLink};
use moss_sim::{SensorSimulator, StartupError};
use moss_storage::{ArchiveBucket, StorageError};

use crate::fault::FaultSink;

/// Errors that escape the orchestrator to its caller.
///
/// Controller connection failures are deliberately absent: those are reported
/// through the [`FaultSink`] side channel, never propagated.
#[derive(Debug, Error)]
pub enum CscError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("simulator startup failed: {0}")]
    SimulatorStartup(#[from] StartupError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("component has not been configured")]
    NotConfigured,
}

/// Resource orchestration core of the MOSS control component.
///
/// Owns the controller link, the optional local simulator, and the archive
/// bucket handle, and acquires or releases them in lock-step with the
/// operational state machine driven by the enclosing framework. All mutation
/// goes through `&mut self`; the framework serializes state transitions, so
/// at most one transition is ever in flight.
pub struct MossCsc {
    sal_index: u32,
    kind: SensorKind,
    simulation_mode: bool,
    fault: Arc<dyn FaultSink>,
    instance: Option<InstanceConfig>,
    controller: Option<Box<dyn ControllerLink>>,
    simulator: Option<SensorSimulator>,
    bucket: Option<ArchiveBucket>,
}

impl MossCsc {
    /// Create the component for the given runtime index.
    ///
    /// `fault` is the framework's fault-transition entry point; `simulation_mode`
    /// selects the simulator-backed controller variant for the whole process
    /// lifetime.
    pub fn new(
        sal_index: u32,
        kind: SensorKind,
        simulation_mode: bool,
        fault: Arc<dyn FaultSink>,
    ) -> Self {
        debug!(sal_index, kind = %kind, simulation_mode, "component initialized");
        Self {
            sal_index,
            kind,
            simulation_mode,
            fault,
            instance: None,
            controller: None,
            simulator: None,
            bucket: None,
        }
    }

    /// Resolve this runtime's instance record from a validated configuration.
    ///
    /// Fails with [`ConfigError::NotFound`] when no record matches; that is a
    /// fatal, operator-visible configuration error.
    pub fn configure(&mut self, config: &MossConfig) -> Result<(), CscError> {
        let instance = config.resolve(self.sal_index)?.clone();
        debug!(sal_index = self.sal_index, endpoint = %instance.tcpip.endpoint(), partition = %instance.s3_instance, "instance resolved");
        if !self.simulation_mode {
            self.controller = Some(Box::new(NetworkControllerLink::new(
                &instance.tcpip,
                self.kind,
                instance.s3_instance,
            )));
        }
        self.instance = Some(instance);
        Ok(())
    }

    /// React to an operational state transition.
    ///
    /// Entering an operating state (DISABLED or ENABLED):
    /// * start the simulator if simulation mode is on and none is running,
    /// * obtain the archive bucket handle if none exists yet,
    /// * connect the controller if it is not connected; a connect failure is
    ///   reported through the fault side channel, not returned.
    ///
    /// Leaving the operating states:
    /// * disconnect the controller, best effort,
    /// * close and discard the simulator,
    /// * keep the bucket handle for the remainder of the process.
    pub async fn handle_summary_state(&mut self, state: State) -> Result<(), CscError> {
        debug!(%state, "handling summary state");
        if state.is_disabled_or_enabled() {
            self.acquire_resources().await
        } else {
            self.release_resources().await;
            Ok(())
        }
    }

    async fn acquire_resources(&mut self) -> Result<(), CscError> {
        let instance = self
            .instance
            .as_ref()
            .ok_or(CscError::NotConfigured)?
            .clone();

        if self.simulation_mode && self.simulator.is_none() {
            let simulator = SensorSimulator::start(self.kind).await?;
            info!(addr = %simulator.local_addr(), kind = %self.kind, "simulator ready");
            // A fresh simulator means a fresh endpoint; retarget the link.
            self.controller = Some(Box::new(SimulatorControllerLink::new(
                simulator.local_addr(),
                self.kind,
                instance.s3_instance,
            )));
            self.simulator = Some(simulator);
        }

        if self.bucket.is_none() {
            let bucket = ArchiveBucket::obtain(
                instance.s3_instance,
                self.simulation_mode,
                self.simulation_mode,
            )
            .await?;
            info!(bucket = %bucket.name(), mock = bucket.is_mock(), "archive bucket obtained");
            self.bucket = Some(bucket);
        }

        let controller = self.controller.as_mut().ok_or(CscError::NotConfigured)?;
        if !controller.connected() {
            if let Err(err) = controller.connect().await {
                warn!(error = %err, "controller connection failed");
                self.fault
                    .enter_fault(FaultCode::Connection, "Connection failed.")
                    .await;
            }
        }
        Ok(())
    }

    async fn release_resources(&mut self) {
        if let Some(controller) = self.controller.as_mut() {
            if controller.connected() {
                if let Err(err) = controller.disconnect().await {
                    // Teardown must run to completion; log and move on.
                    warn!(error = %err, "controller disconnect failed during teardown");
                }
            }
        }
        if let Some(mut simulator) = self.simulator.take() {
            simulator.close().await;
            info!("simulator closed");
        }
        // The bucket handle persists for the life of the process.
    }

    pub fn sal_index(&self) -> u32 {
        self.sal_index
    }

    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    pub fn simulation_mode(&self) -> bool {
        self.simulation_mode
    }

    /// The resolved instance record, once configured.
    pub fn instance(&self) -> Option<&InstanceConfig> {
        self.instance.as_ref()
    }

    /// Whether the local simulator is currently alive.
    pub fn simulator_alive(&self) -> bool {
        self.simulator.is_some()
    }

    /// The archive bucket handle, once obtained.
    pub fn bucket(&self) -> Option<&ArchiveBucket> {
        self.bucket.as_ref()
    }

    /// Whether the controller session is currently established.
    pub fn connected(&self) -> bool {
        self.controller
            .as_ref()
            .is_some_and(|controller| controller.connected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use moss_common::StoragePartition;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingFaultSink {
        faults: Mutex<Vec<(FaultCode, String)>>,
    }

    #[async_trait]
    impl FaultSink for RecordingFaultSink {
        async fn enter_fault(&self, code: FaultCode, report: &str) {
            self.faults.lock().await.push((code, report.to_owned()));
        }
    }

    fn config_for(sal_index: u32) -> MossConfig {
        format!(
            r#"
instances:
  - sal_index: {sal_index}
    tcpip:
      hostname: "127.0.0.1"
      port: 9999
      timeout: 1
    s3_instance: tuc
"#
        )
        .parse()
        .unwrap()
    }

    #[tokio::test]
    async fn configure_resolves_instance_record() {
        let sink = Arc::new(RecordingFaultSink::default());
        let mut csc = MossCsc::new(1, SensorKind::FourBeam, true, sink);
        csc.configure(&config_for(1)).unwrap();
        let instance = csc.instance().unwrap();
        assert_eq!(instance.sal_index, 1);
        assert_eq!(instance.s3_instance, StoragePartition::Tuc);
    }

    #[tokio::test]
    async fn configure_fails_for_absent_index() {
        let sink = Arc::new(RecordingFaultSink::default());
        let mut csc = MossCsc::new(2, SensorKind::FourBeam, true, sink);
        let err = csc.configure(&config_for(1)).unwrap_err();
        assert!(matches!(
            err,
            CscError::Config(ConfigError::NotFound { sal_index: 2 })
        ));
        assert!(csc.instance().is_none());
    }

    #[tokio::test]
    async fn operating_transition_before_configure_is_rejected() {
        let sink = Arc::new(RecordingFaultSink::default());
        let mut csc = MossCsc::new(1, SensorKind::FourBeam, false, sink);
        let err = csc.handle_summary_state(State::Disabled).await.unwrap_err();
        assert!(matches!(err, CscError::NotConfigured));
        assert!(!csc.simulator_alive());
        assert!(csc.bucket().is_none());
    }

    #[tokio::test]
    async fn non_operating_transition_acquires_nothing() {
        let sink = Arc::new(RecordingFaultSink::default());
        let mut csc = MossCsc::new(1, SensorKind::FourBeam, true, sink.clone());
        csc.configure(&config_for(1)).unwrap();

        csc.handle_summary_state(State::Standby).await.unwrap();
        csc.handle_summary_state(State::Offline).await.unwrap();

        assert!(!csc.simulator_alive());
        assert!(csc.bucket().is_none());
        assert!(!csc.connected());
        assert!(sink.faults.lock().await.is_empty());
    }

    #[tokio::test]
    async fn simulated_operating_cycle_acquires_and_releases() {
        let sink = Arc::new(RecordingFaultSink::default());
        let mut csc = MossCsc::new(1, SensorKind::EightBeam, true, sink.clone());
        csc.configure(&config_for(1)).unwrap();

        csc.handle_summary_state(State::Disabled).await.unwrap();
        assert!(csc.simulator_alive());
        assert!(csc.connected());
        let bucket = csc.bucket().expect("bucket handle should exist");
        assert!(bucket.is_mock());
        assert_eq!(bucket.name(), "rubinobs-lfa-tuc");
        assert!(sink.faults.lock().await.is_empty());

        csc.handle_summary_state(State::Standby).await.unwrap();
        assert!(!csc.simulator_alive());
        assert!(!csc.connected());
        assert!(csc.bucket().is_some(), "bucket persists across teardown");
    }

    #[tokio::test]
    async fn reentry_restarts_simulator_and_reconnects() {
        let sink = Arc::new(RecordingFaultSink::default());
        let mut csc = MossCsc::new(1, SensorKind::FourBeam, true, sink.clone());
        csc.configure(&config_for(1)).unwrap();

        csc.handle_summary_state(State::Disabled).await.unwrap();
        csc.handle_summary_state(State::Standby).await.unwrap();
        csc.handle_summary_state(State::Enabled).await.unwrap();

        assert!(csc.simulator_alive());
        assert!(csc.connected());
        assert!(sink.faults.lock().await.is_empty());

        csc.handle_summary_state(State::Offline).await.unwrap();
        assert!(!csc.simulator_alive());
        assert!(!csc.connected());
    }

    #[tokio::test]
    async fn enabled_after_disabled_keeps_existing_session() {
        let sink = Arc::new(RecordingFaultSink::default());
        let mut csc = MossCsc::new(1, SensorKind::FourBeam, true, sink.clone());
        csc.configure(&config_for(1)).unwrap();

        csc.handle_summary_state(State::Disabled).await.unwrap();
        csc.handle_summary_state(State::Enabled).await.unwrap();

        assert!(csc.simulator_alive());
        assert!(csc.connected());
        assert!(sink.faults.lock().await.is_empty());
        csc.handle_summary_state(State::Standby).await.unwrap();
    }

    #[tokio::test]
    async fn connect_failure_escalates_through_fault_sink_once() {
        // The gateway is never contacted with create=false; the handle is lazy.
        std::env::set_var(moss_storage::ENV_S3_ENDPOINT, "http://127.0.0.1:9");

        // Bind then drop to obtain an endpoint that actively refuses.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config: MossConfig = format!(
            r#"
instances:
  - sal_index: 1
    tcpip:
      hostname: "127.0.0.1"
      port: {port}
      timeout: 1
    s3_instance: tuc
"#
        )
        .parse()
        .unwrap();

        let sink = Arc::new(RecordingFaultSink::default());
        let mut csc = MossCsc::new(1, SensorKind::FourBeam, false, sink.clone());
        csc.configure(&config).unwrap();

        csc.handle_summary_state(State::Enabled).await.unwrap();

        let faults = sink.faults.lock().await;
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].0, FaultCode::Connection);
        assert_eq!(faults[0].1, "Connection failed.");
        drop(faults);

        assert!(!csc.connected());
        assert!(!csc.simulator_alive());
        let bucket = csc.bucket().expect("bucket precedes the connect attempt");
        assert!(!bucket.is_mock());
    }
}
