//! Lifecycle coordinator for the pipeline stages.
//!
//! The host moves through `Idle -> Running -> Stopping -> Stopped`. The move
//! out of `Running` happens exactly once no matter how many stages (or
//! signals) report a terminal status concurrently; the first error that
//! accompanied such a report is what [`PipelineHost::wait`] returns.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::component::{Component, StatusEvent};
use crate::error::LifecycleError;
use crate::extension::Extensions;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum HostState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// OS signal that requested termination.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
}

struct Inner {
    state: watch::Sender<HostState>,
    // Guards the Running -> Stopping transition together with the error slot.
    first_error: Mutex<Option<LifecycleError>>,
    extensions: Extensions,
}

/// Cheap to clone; all clones share one state machine.
#[derive(Clone)]
pub struct PipelineHost {
    inner: Arc<Inner>,
}

impl PipelineHost {
    pub fn new(extensions: Extensions) -> Self {
        let (state, _) = watch::channel(HostState::Idle);
        Self {
            inner: Arc::new(Inner {
                state,
                first_error: Mutex::new(None),
                extensions,
            }),
        }
    }

    pub fn state(&self) -> HostState {
        *self.inner.state.borrow()
    }

    /// Registry other stages use to resolve optional capabilities.
    pub fn extensions(&self) -> &Extensions {
        &self.inner.extensions
    }

    /// Moves to `Running` and starts listening for SIGINT/SIGTERM.
    ///
    /// The listener lives for the rest of the process and reports `Stopping`
    /// on the first signal. Calling `start` again is a no-op.
    pub fn start(&self) -> std::io::Result<()> {
        if self.state() != HostState::Idle {
            debug!(state = ?self.state(), "host already started");
            return Ok(());
        }
        let signal = termination_signal()?;

        let started = self.inner.state.send_if_modified(|state| {
            if *state == HostState::Idle {
                *state = HostState::Running;
                true
            } else {
                false
            }
        });
        if !started {
            return Ok(());
        }

        let host = self.clone();
        tokio::spawn(async move {
            let signal = signal.await;
            info!(?signal, "received termination signal");
            host.report(StatusEvent::stopping());
        });

        info!(extensions = self.inner.extensions.len(), "pipeline host running");
        Ok(())
    }

    /// Records a status change from any stage. Safe to call concurrently.
    ///
    /// Terminal statuses begin shutdown. Returns `true` only for the single
    /// call that performed the transition to `Stopping`.
    pub fn report(&self, event: StatusEvent) -> bool {
        let status = event.status();

        if !status.is_terminal() {
            if let Some(err) = event.error() {
                warn!(?status, error = %err, "component reported error");
            } else {
                debug!(?status, "component status");
            }
            return false;
        }

        let mut first_error = self
            .inner
            .first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let fired = self.inner.state.send_if_modified(|state| {
            if *state < HostState::Stopping {
                *state = HostState::Stopping;
                true
            } else {
                false
            }
        });

        match event.into_error() {
            Some(err) if fired => {
                error!(?status, error = %err, "component reported fatal error");
                *first_error = Some(err);
            }
            Some(err) => {
                warn!(?status, error = %err, "error reported after shutdown began");
            }
            None => {}
        }

        if fired {
            info!(?status, "pipeline stopping");
        }
        fired
    }

    /// Resolves once shutdown has been triggered, returning the first fatal
    /// error reported, if any.
    pub async fn wait(&self) -> Result<(), LifecycleError> {
        let mut rx = self.inner.state.subscribe();
        // The sender lives as long as `self`, so this only returns once the state matches.
        let _ = rx.wait_for(|state| *state >= HostState::Stopping).await;

        let first_error = self
            .inner
            .first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match first_error.as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Shuts every stage down in order. Individual failures are logged and
    /// discarded so the remaining stages still get cleaned up.
    pub async fn shutdown_components(&self, components: &[Arc<dyn Component>]) {
        for component in components {
            match component.shutdown().await {
                Ok(()) => debug!(component = %component.id(), "component stopped"),
                Err(e) => warn!(component = %component.id(), error = %e, "component shutdown failed"),
            }
        }
        self.inner.state.send_replace(HostState::Stopped);
        info!("pipeline stopped");
    }
}

impl Default for PipelineHost {
    fn default() -> Self {
        Self::new(Extensions::new())
    }
}

/// Future resolving on the first interrupt or terminate signal.
#[cfg(unix)]
fn termination_signal(
) -> std::io::Result<futures::future::BoxFuture<'static, TerminationSignal>> {
    use futures::future::{select_all, BoxFuture};
    use futures::FutureExt;
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    let set: Vec<BoxFuture<'static, TerminationSignal>> = vec![
        Box::pin(async move { sigint.recv().map(|_| TerminationSignal::Interrupt).await }),
        Box::pin(async move { sigterm.recv().map(|_| TerminationSignal::Terminate).await }),
    ];

    Ok(select_all(set).map(|(signal, _, _)| signal).boxed())
}

#[cfg(windows)]
fn termination_signal(
) -> std::io::Result<futures::future::BoxFuture<'static, TerminationSignal>> {
    use futures::FutureExt;

    let mut ctrl_c = tokio::signal::windows::ctrl_c()?;
    Ok(async move {
        ctrl_c.recv().await;
        TerminationSignal::Interrupt
    }
    .boxed())
}

#[cfg(not(any(unix, windows)))]
fn termination_signal(
) -> std::io::Result<futures::future::BoxFuture<'static, TerminationSignal>> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "termination signals are not supported on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{ComponentId, ComponentStatus};
    use crate::error::ComponentError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    #[tokio::test]
    async fn start_moves_to_running_once() {
        let host = PipelineHost::default();
        assert_eq!(host.state(), HostState::Idle);
        host.start().unwrap();
        assert_eq!(host.state(), HostState::Running);
        host.start().unwrap();
        assert_eq!(host.state(), HostState::Running);
    }

    #[tokio::test]
    async fn signal_listener_does_not_fire_on_its_own() {
        let host = PipelineHost::default();
        host.start().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(host.state(), HostState::Running);
        assert!(host.report(StatusEvent::stopping()));
    }

    #[tokio::test]
    async fn wait_blocks_until_stopping_is_reported() {
        let host = PipelineHost::default();
        host.start().unwrap();

        let pending = tokio::time::timeout(Duration::from_millis(50), host.wait()).await;
        assert!(pending.is_err(), "wait returned before any report");

        assert!(host.report(StatusEvent::stopping()));
        assert!(host.wait().await.is_ok());
        assert_eq!(host.state(), HostState::Stopping);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_stopping_reports_fire_exactly_once() {
        const CALLERS: usize = 64;

        let host = PipelineHost::default();
        host.start().unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(CALLERS));
        let threads: Vec<_> = (0..CALLERS)
            .map(|i| {
                let host = host.clone();
                let fired = fired.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    let event = if i % 2 == 0 {
                        StatusEvent::stopping()
                    } else {
                        StatusEvent::stopping()
                            .with_error(LifecycleError::new(format!("caller {i}")))
                    };
                    if host.report(event) {
                        fired.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        let waited = tokio::time::timeout(Duration::from_secs(1), host.wait())
            .await
            .expect("wait must not block after shutdown fired");
        // Whatever the winner carried is what every waiter observes.
        let again = host.wait().await;
        assert_eq!(
            waited.as_ref().err().map(|e| e.message.clone()),
            again.as_ref().err().map(|e| e.message.clone())
        );
    }

    #[tokio::test]
    async fn fatal_error_is_returned_from_wait() {
        let host = PipelineHost::default();
        host.start().unwrap();

        let fired = host.report(StatusEvent::fatal(LifecycleError::new("listener died")));
        assert!(fired);
        // A later error does not replace the first one.
        assert!(!host.report(StatusEvent::fatal(LifecycleError::new("second"))));

        let err = host.wait().await.unwrap_err();
        assert_eq!(err.message, "listener died");
    }

    #[tokio::test]
    async fn recoverable_error_keeps_running() {
        let host = PipelineHost::default();
        host.start().unwrap();

        let event = StatusEvent::new(ComponentStatus::RecoverableError)
            .with_error(LifecycleError::new("transient"));
        assert!(!host.report(event));
        assert_eq!(host.state(), HostState::Running);
    }

    #[tokio::test]
    async fn report_before_start_still_stops() {
        let host = PipelineHost::default();
        assert!(host.report(StatusEvent::stopping()));
        assert!(host.wait().await.is_ok());
    }

    struct FailingStage {
        id: ComponentId,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Component for FailingStage {
        fn id(&self) -> &ComponentId {
            &self.id
        }

        async fn start(&self, _host: &PipelineHost) -> Result<(), ComponentError> {
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), ComponentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(ComponentError::Other {
                id: self.id.clone(),
                message: "boom".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn shutdown_errors_do_not_stop_remaining_stages() {
        let host = PipelineHost::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let stages: Vec<Arc<dyn Component>> = (0..3)
            .map(|i| {
                Arc::new(FailingStage {
                    id: ComponentId::with_name("stage", i.to_string()),
                    calls: calls.clone(),
                }) as Arc<dyn Component>
            })
            .collect();

        host.report(StatusEvent::stopping());
        host.wait().await.unwrap();
        host.shutdown_components(&stages).await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(host.state(), HostState::Stopped);
    }
}
