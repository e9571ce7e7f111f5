//! Lifecycle wrapper around one annotation service instance.
//!
//! The gateway starts the service on first use and restarts it when the host
//! runs short of memory. Memory is checked lazily, once per call, before the
//! request goes out. All lifecycle transitions happen behind a single mutex;
//! a caller that finds the service starting or restarting waits on the
//! condition variable for the transition to finish.
//!
//! ```text
//! Uninitialized -> Starting -> Ready <-> Degraded -> Restarting -> Ready
//!                     |                                  |
//!                     +------------> Failed <------------+
//! ```

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::error::{AnnotateError, Result};
use crate::memory::MemoryProbe;
use crate::protocol::AnnotatedDocument;
use crate::service::AnnotationService;

/// Anything that turns raw text into an annotated document.
pub trait Annotator: Send + Sync {
    fn annotate(&self, text: &str) -> Result<AnnotatedDocument>;

    /// True once the annotator can no longer serve any request.
    fn is_failed(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    Uninitialized,
    Starting,
    Ready,
    /// Memory over threshold, restart held back by the cooldown.
    Degraded,
    Restarting,
    Failed,
}

impl GatewayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayState::Uninitialized => "uninitialized",
            GatewayState::Starting      => "starting",
            GatewayState::Ready         => "ready",
            GatewayState::Degraded      => "degraded",
            GatewayState::Restarting    => "restarting",
            GatewayState::Failed        => "failed",
        }
    }

    fn in_transition(&self) -> bool {
        matches!(self, GatewayState::Starting | GatewayState::Restarting)
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Restart when used memory exceeds this percentage.
    pub memory_threshold_percent: f32,
    /// Minimum time between restarts. Zero disables the cooldown.
    pub restart_cooldown: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            memory_threshold_percent: 90.0,
            restart_cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct Lifecycle {
    state: GatewayState,
    restarts: u64,
    last_restart: Option<Instant>,
    failure: Option<String>,
}

pub struct AnnotationGateway<S, P> {
    service: S,
    probe: P,
    config: GatewayConfig,
    lifecycle: Mutex<Lifecycle>,
    changed: Condvar,
}

impl<S, P> std::fmt::Debug for AnnotationGateway<S, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationGateway")
            .field("config", &self.config)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

impl<S: AnnotationService, P: MemoryProbe> AnnotationGateway<S, P> {
    pub fn new(service: S, probe: P, config: GatewayConfig) -> Self {
        Self {
            service,
            probe,
            config,
            lifecycle: Mutex::new(Lifecycle {
                state: GatewayState::Uninitialized,
                restarts: 0,
                last_restart: None,
                failure: None,
            }),
            changed: Condvar::new(),
        }
    }

    pub fn state(&self) -> GatewayState {
        self.lock().state
    }

    /// Completed memory-pressure restarts.
    pub fn restarts(&self) -> u64 {
        self.lock().restarts
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Annotate `text`, starting or restarting the service first if needed.
    ///
    /// Timeouts and protocol errors fail only this call.
    pub fn annotate(&self, text: &str) -> Result<AnnotatedDocument> {
        self.ensure_ready()?;
        self.service.annotate(text)
    }

    /// Stop the service and return to `Uninitialized`.
    pub fn shutdown(&self) -> Result<()> {
        let mut lc = self.wait_for_transition(self.lock());
        let was = lc.state;
        lc.state = GatewayState::Uninitialized;
        lc.failure = None;
        drop(lc);
        self.changed.notify_all();

        if was != GatewayState::Uninitialized {
            self.service.stop()?;
            info!(previous = was.as_str(), "Annotation gateway shut down");
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wait_for_transition<'a>(&'a self, mut lc: MutexGuard<'a, Lifecycle>) -> MutexGuard<'a, Lifecycle> {
        while lc.state.in_transition() {
            lc = self.changed.wait(lc).unwrap_or_else(|e| e.into_inner());
        }
        lc
    }

    fn ensure_ready(&self) -> Result<()> {
        let mut lc = self.wait_for_transition(self.lock());
        let state = lc.state;
        match state {
            GatewayState::Failed => Err(AnnotateError::Unavailable(
                lc.failure.clone().unwrap_or_else(|| "gateway failed".to_string()),
            )),
            GatewayState::Uninitialized => {
                lc.state = GatewayState::Starting;
                drop(lc);
                info!("Starting annotation service");
                let started = self.service.start();
                self.finish_transition(started, false)
            }
            GatewayState::Ready | GatewayState::Degraded => {
                let usage = self.probe.used_percent();
                if usage <= self.config.memory_threshold_percent {
                    lc.state = GatewayState::Ready;
                    return Ok(());
                }

                let cooling = lc
                    .last_restart
                    .map(|t| t.elapsed() < self.config.restart_cooldown)
                    .unwrap_or(false);
                if cooling {
                    if state == GatewayState::Ready {
                        debug!(usage, "Memory over threshold inside restart cooldown");
                    }
                    lc.state = GatewayState::Degraded;
                    return Ok(());
                }

                warn!(
                    usage,
                    threshold = self.config.memory_threshold_percent,
                    "Restarting annotation service (memory over threshold)"
                );
                lc.state = GatewayState::Restarting;
                drop(lc);
                if let Err(e) = self.service.stop() {
                    warn!(error = %e, "Stopping annotation service failed; starting anyway");
                }
                let started = self.service.start();
                self.finish_transition(started, true)
            }
            // wait_for_transition only returns outside a transition
            GatewayState::Starting | GatewayState::Restarting => Ok(()),
        }
    }

    fn finish_transition(&self, started: Result<()>, restart: bool) -> Result<()> {
        let mut lc = self.lock();
        let outcome = match started {
            Ok(()) => {
                lc.state = GatewayState::Ready;
                if restart {
                    lc.restarts += 1;
                    lc.last_restart = Some(Instant::now());
                    info!(restarts = lc.restarts, "Annotation service restarted");
                }
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Annotation service failed to start");
                lc.state = GatewayState::Failed;
                lc.failure = Some(e.to_string());
                Err(e)
            }
        };
        drop(lc);
        self.changed.notify_all();
        outcome
    }
}

impl<S: AnnotationService, P: MemoryProbe> Annotator for AnnotationGateway<S, P> {
    fn annotate(&self, text: &str) -> Result<AnnotatedDocument> {
        AnnotationGateway::annotate(self, text)
    }

    fn is_failed(&self) -> bool {
        self.state() == GatewayState::Failed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    use super::*;

    /// Memory usage shared between the fake service and the fake probe:
    /// starting the service frees memory.
    #[derive(Default)]
    struct Host {
        usage: AtomicU32,
    }

    struct FakeService {
        host: Arc<Host>,
        starts: AtomicUsize,
        stops: AtomicUsize,
        fail_start: AtomicBool,
        start_delay: Duration,
    }

    impl FakeService {
        fn new(host: Arc<Host>) -> Self {
            Self {
                host,
                starts: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
                fail_start: AtomicBool::new(false),
                start_delay: Duration::ZERO,
            }
        }
    }

    impl AnnotationService for FakeService {
        fn start(&self) -> Result<()> {
            std::thread::sleep(self.start_delay);
            if self.fail_start.load(Ordering::SeqCst) {
                return Err(AnnotateError::Startup("port in use".to_string()));
            }
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.host.usage.store(20, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) -> Result<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn annotate(&self, text: &str) -> Result<AnnotatedDocument> {
            if text == "slow" {
                return Err(AnnotateError::Timeout("60000 ms".to_string()));
            }
            Ok(AnnotatedDocument::default())
        }
    }

    struct FakeProbe(Arc<Host>);

    impl MemoryProbe for FakeProbe {
        fn used_percent(&self) -> f32 {
            self.0.usage.load(Ordering::SeqCst) as f32
        }
    }

    fn gateway(cooldown: Duration) -> (Arc<Host>, AnnotationGateway<FakeService, FakeProbe>) {
        let host = Arc::new(Host::default());
        let config = GatewayConfig { memory_threshold_percent: 90.0, restart_cooldown: cooldown };
        let gw = AnnotationGateway::new(FakeService::new(host.clone()), FakeProbe(host.clone()), config);
        (host, gw)
    }

    #[test]
    fn test_first_call_starts_service() {
        let (_, gw) = gateway(Duration::ZERO);
        assert_eq!(gw.state(), GatewayState::Uninitialized);
        gw.annotate("BRCA1 causes cancer").unwrap();
        assert_eq!(gw.state(), GatewayState::Ready);
        assert_eq!(gw.service().starts.load(Ordering::SeqCst), 1);
        assert_eq!(gw.restarts(), 0);
    }

    #[test]
    fn test_memory_pressure_restarts_before_call() {
        let (host, gw) = gateway(Duration::ZERO);
        gw.annotate("a").unwrap();
        host.usage.store(95, Ordering::SeqCst);
        gw.annotate("b").unwrap();
        assert_eq!(gw.restarts(), 1);
        assert_eq!(gw.service().stops.load(Ordering::SeqCst), 1);
        assert_eq!(gw.service().starts.load(Ordering::SeqCst), 2);
        assert_eq!(gw.state(), GatewayState::Ready);
    }

    #[test]
    fn test_cooldown_holds_restart_back() {
        let (host, gw) = gateway(Duration::from_secs(3600));
        gw.annotate("a").unwrap();
        host.usage.store(95, Ordering::SeqCst);
        gw.annotate("b").unwrap();
        assert_eq!(gw.restarts(), 1);

        // Still over threshold right after the restart: no second restart.
        host.usage.store(95, Ordering::SeqCst);
        gw.annotate("c").unwrap();
        assert_eq!(gw.restarts(), 1);
        assert_eq!(gw.state(), GatewayState::Degraded);

        host.usage.store(50, Ordering::SeqCst);
        gw.annotate("d").unwrap();
        assert_eq!(gw.state(), GatewayState::Ready);
    }

    #[test]
    fn test_timeout_fails_only_that_call() {
        let (_, gw) = gateway(Duration::ZERO);
        let err = gw.annotate("slow").unwrap_err();
        assert!(err.is_per_call());
        assert_eq!(gw.state(), GatewayState::Ready);
        assert!(gw.annotate("fine").is_ok());
    }

    #[test]
    fn test_failed_start_is_terminal() {
        let (_, gw) = gateway(Duration::ZERO);
        gw.service().fail_start.store(true, Ordering::SeqCst);
        assert!(matches!(gw.annotate("a"), Err(AnnotateError::Startup(_))));
        assert_eq!(gw.state(), GatewayState::Failed);
        assert!(Annotator::is_failed(&gw));

        gw.service().fail_start.store(false, Ordering::SeqCst);
        assert!(matches!(gw.annotate("b"), Err(AnnotateError::Unavailable(_))));
        assert_eq!(gw.service().starts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_concurrent_pressure_restarts_once() {
        let host = Arc::new(Host::default());
        let mut service = FakeService::new(host.clone());
        service.start_delay = Duration::from_millis(50);
        let gw = Arc::new(AnnotationGateway::new(
            service,
            FakeProbe(host.clone()),
            GatewayConfig { memory_threshold_percent: 90.0, restart_cooldown: Duration::ZERO },
        ));
        gw.annotate("warmup").unwrap();
        host.usage.store(99, Ordering::SeqCst);

        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let gw = gw.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    gw.annotate("text").is_ok()
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(gw.restarts(), 1);
        assert_eq!(gw.service().starts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_shutdown_returns_to_uninitialized() {
        let (_, gw) = gateway(Duration::ZERO);
        gw.annotate("a").unwrap();
        gw.shutdown().unwrap();
        assert_eq!(gw.state(), GatewayState::Uninitialized);
        assert_eq!(gw.service().stops.load(Ordering::SeqCst), 1);
        gw.annotate("b").unwrap();
        assert_eq!(gw.service().starts.load(Ordering::SeqCst), 2);
    }
}
