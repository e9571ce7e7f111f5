//! The annotation server process and its HTTP interface.
//!
//! [`CoreNlpService`] talks to a CoreNLP-compatible server:
//!
//! - `GET  <endpoint>/ready` answers 200 once the server accepts work
//! - `POST <endpoint>/?properties=<json>` with the raw text as body returns
//!   the annotated document as JSON
//!
//! With a [`LaunchConfig`] the service spawns the server itself, unless one is
//! already answering on the endpoint, in which case it attaches to it.

use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use tracing::{debug, info, warn};

use crate::error::{AnnotateError, Result};
use crate::protocol::{AnnotatedDocument, AnnotationProperties};

const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Lifecycle and request surface of one annotation server instance.
pub trait AnnotationService: Send + Sync {
    /// Bring the server up and block until it accepts requests.
    fn start(&self) -> Result<()>;

    /// Shut the server down. A no-op when it was never started.
    fn stop(&self) -> Result<()>;

    fn annotate(&self, text: &str) -> Result<AnnotatedDocument>;
}

/// How to launch a local server process.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchConfig {
    /// Usually `java`.
    pub command: String,
    pub classpath: String,
    /// JVM heap size, e.g. `8G`.
    pub memory: String,
    pub server_class: String,
}

#[derive(Debug, Clone)]
pub struct CoreNlpConfig {
    pub endpoint: String,
    /// Per-request timeout. Also passed to a launched server.
    pub timeout: Duration,
    /// How long `start` waits for the server to report ready.
    pub startup_timeout: Duration,
    pub threads: usize,
    pub properties: AnnotationProperties,
    pub launch: Option<LaunchConfig>,
}

pub struct CoreNlpService {
    config: CoreNlpConfig,
    client: Client,
    properties_json: String,
    server: Mutex<Option<Child>>,
}

impl std::fmt::Debug for CoreNlpService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreNlpService")
            .field("endpoint", &self.config.endpoint)
            .field("launch", &self.config.launch.is_some())
            .finish()
    }
}

impl CoreNlpService {
    pub fn new(config: CoreNlpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AnnotateError::Startup(e.to_string()))?;
        let properties_json = config
            .properties
            .to_json()
            .map_err(|e| AnnotateError::Startup(format!("invalid properties: {e}")))?;

        Ok(Self {
            config,
            client,
            properties_json,
            server: Mutex::new(None),
        })
    }

    fn server(&self) -> MutexGuard<'_, Option<Child>> {
        self.server.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_ready(&self) -> bool {
        let url = format!("{}/ready", self.config.endpoint.trim_end_matches('/'));
        match self.client.get(&url).timeout(READY_POLL_INTERVAL * 4).send() {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn wait_until_ready(&self) -> Result<()> {
        let deadline = Instant::now() + self.config.startup_timeout;
        loop {
            if self.is_ready() {
                return Ok(());
            }
            if let Some(child) = self.server().as_mut() {
                if let Ok(Some(status)) = child.try_wait() {
                    return Err(AnnotateError::Startup(format!(
                        "server process exited during startup ({status})"
                    )));
                }
            }
            if Instant::now() >= deadline {
                return Err(AnnotateError::Startup(format!(
                    "{} not ready after {:?}",
                    self.config.endpoint, self.config.startup_timeout
                )));
            }
            std::thread::sleep(READY_POLL_INTERVAL);
        }
    }

    fn launch(&self, launch: &LaunchConfig) -> Result<()> {
        let port = endpoint_port(&self.config.endpoint)?;
        let args = launch_args(launch, port, self.config.timeout, self.config.threads);
        info!(command = %launch.command, port, memory = %launch.memory, "Launching annotation server");

        let child = Command::new(&launch.command)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AnnotateError::Startup(format!("{}: {e}", launch.command)))?;
        *self.server() = Some(child);
        Ok(())
    }
}

impl AnnotationService for CoreNlpService {
    fn start(&self) -> Result<()> {
        if self.is_ready() {
            info!(endpoint = %self.config.endpoint, "Attached to running annotation server");
            return Ok(());
        }
        if let Some(launch) = &self.config.launch {
            self.launch(launch)?;
        }
        self.wait_until_ready()?;
        info!(endpoint = %self.config.endpoint, "Annotation server ready");
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        let Some(mut child) = self.server().take() else {
            debug!("No launched server to stop");
            return Ok(());
        };
        if let Err(e) = child.kill() {
            warn!(error = %e, "Failed to kill annotation server");
        }
        child
            .wait()
            .map_err(|e| AnnotateError::Http(format!("reaping server process: {e}")))?;
        info!("Annotation server stopped");
        Ok(())
    }

    fn annotate(&self, text: &str) -> Result<AnnotatedDocument> {
        let resp = self
            .client
            .post(&self.config.endpoint)
            .query(&[("properties", self.properties_json.as_str())])
            .body(text.to_string())
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(AnnotateError::Protocol(format!("HTTP {status}: {body}")));
        }
        Ok(resp.json::<AnnotatedDocument>()?)
    }
}

fn endpoint_port(endpoint: &str) -> Result<u16> {
    let url = reqwest::Url::parse(endpoint)
        .map_err(|e| AnnotateError::Startup(format!("invalid endpoint {endpoint}: {e}")))?;
    url.port_or_known_default()
        .ok_or_else(|| AnnotateError::Startup(format!("no port in endpoint {endpoint}")))
}

fn launch_args(launch: &LaunchConfig, port: u16, timeout: Duration, threads: usize) -> Vec<String> {
    vec![
        format!("-mx{}", launch.memory),
        "-cp".to_string(),
        launch.classpath.clone(),
        launch.server_class.clone(),
        "-port".to_string(),
        port.to_string(),
        "-timeout".to_string(),
        timeout.as_millis().to_string(),
        "-threads".to_string(),
        threads.to_string(),
        "-quiet".to_string(),
    ]
}
