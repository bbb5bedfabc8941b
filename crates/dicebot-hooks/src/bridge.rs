//! Hook bridge - routes capability calls to the right executor.
//!
//! Native capabilities run inline on the calling task; a panic there
//! unwinds into the caller. Scripted capabilities are queued onto the
//! [`ScriptWorker`], where panics are caught and reported as
//! [`HookError::Panicked`].

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use dicebot_config::ScriptingSection;
use dicebot_extensions::Capability;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{HookError, HookResult};
use crate::panic::{panic_message, take_panic_backtrace};
use crate::point::HookPoint;
use crate::result::{HookExecution, HookExecutionResult};
use crate::worker::ScriptWorker;

/// Default bound on waiting for a scripted hook.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A scripted hook's panic: payload text and captured backtrace.
type ScriptPanic = (String, Option<String>);

/// Invokes capability hooks and command handlers.
#[derive(Debug, Clone)]
pub struct HookBridge {
    worker: Option<ScriptWorker>,
    timeout: Duration,
}

impl HookBridge {
    /// Build a bridge from the `[scripting]` section, starting the worker
    /// when scripting is enabled.
    ///
    /// # Panics
    ///
    /// Panics if scripting is enabled and this is called outside a tokio
    /// runtime.
    #[must_use]
    pub fn new(section: &ScriptingSection) -> Self {
        let worker = section.enabled.then(|| ScriptWorker::spawn(section.queue_capacity));
        info!(
            scripting = section.enabled,
            timeout_secs = section.timeout_secs,
            "Hook bridge ready"
        );
        Self {
            worker,
            timeout: Duration::from_secs(section.timeout_secs),
        }
    }

    /// A bridge without a scripting worker. Scripted hooks are skipped.
    #[must_use]
    pub fn native_only() -> Self {
        Self {
            worker: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the scripted-hook wait bound.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether scripted hooks can run.
    #[must_use]
    pub fn scripting_enabled(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_closed())
    }

    /// Run `hook` on behalf of `capability`.
    ///
    /// The capability's storage is opened first if it has one. Native hooks
    /// run inline. Scripted hooks are queued on the worker; the timeout
    /// bounds the whole wait, including waiting for room in a full queue. A
    /// job whose caller has already timed out is dropped unrun.
    ///
    /// # Errors
    ///
    /// - [`HookError::HandlerFailed`] if storage cannot be opened
    /// - [`HookError::Disabled`] if the capability is scripted and scripting is off
    /// - [`HookError::Timeout`] if the worker does not answer in time
    /// - [`HookError::Panicked`] if a scripted hook panics
    /// - [`HookError::WorkerClosed`] if the worker has stopped
    pub async fn invoke<T, F>(
        &self,
        capability: &Arc<Capability>,
        point: HookPoint,
        hook: F,
    ) -> HookResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if let Err(e) = capability.ensure_storage_open() {
            return Err(HookError::HandlerFailed {
                capability: capability.name().to_string(),
                point,
                message: e.to_string(),
            });
        }

        if !capability.is_scripted() {
            return Ok(hook());
        }

        let Some(worker) = &self.worker else {
            info!(capability = %capability.name(), %point, "Scripting disabled, skipping hook");
            return Err(HookError::Disabled {
                capability: capability.name().to_string(),
                point,
            });
        };

        let (tx, rx) = oneshot::channel::<Result<T, ScriptPanic>>();
        let job = Box::new(move || {
            if tx.is_closed() {
                return;
            }
            let outcome = catch_unwind(AssertUnwindSafe(hook))
                .map_err(|p| (panic_message(p.as_ref()), take_panic_backtrace()));
            // The caller may have timed out and gone away.
            let _ = tx.send(outcome);
        });
        let waited = tokio::time::timeout(self.timeout, async {
            match worker.submit(job).await {
                Ok(()) => rx.await.map_err(|_| HookError::WorkerClosed),
                Err(e) => Err(e),
            }
        })
        .await;

        match waited {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err((message, backtrace)))) => {
                error!(
                    capability = %capability.name(),
                    %point,
                    panic = %message,
                    backtrace = backtrace.as_deref().unwrap_or("unavailable"),
                    "Scripted hook panicked"
                );
                Err(HookError::Panicked {
                    capability: capability.name().to_string(),
                    point,
                    message,
                })
            },
            Ok(Err(e)) => Err(e),
            Err(_) => {
                let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(capability = %capability.name(), %point, timeout_ms, "Scripted hook timed out");
                Err(HookError::Timeout {
                    capability: capability.name().to_string(),
                    point,
                    timeout_ms,
                })
            },
        }
    }

    /// Like [`invoke`](Self::invoke), but folds the outcome into a timed
    /// [`HookExecution`] record.
    pub async fn execute<T, F>(
        &self,
        capability: &Arc<Capability>,
        point: HookPoint,
        hook: F,
    ) -> HookExecution<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let started = Instant::now();
        let result = match self.invoke(capability, point, hook).await {
            Ok(value) => HookExecutionResult::Success(value),
            Err(HookError::Timeout { timeout_ms, .. }) => HookExecutionResult::Timeout { timeout_ms },
            Err(e @ HookError::Disabled { .. }) => HookExecutionResult::Skipped {
                reason: e.to_string(),
            },
            Err(e) => HookExecutionResult::Failure {
                error: e.to_string(),
            },
        };
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(
            capability = %capability.name(),
            %point,
            duration_ms,
            success = result.is_success(),
            "Hook executed"
        );
        HookExecution {
            capability: capability.name().to_string(),
            point,
            duration_ms,
            result,
        }
    }
}

impl Default for HookBridge {
    fn default() -> Self {
        Self::native_only()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicebot_extensions::{CapabilityStorage, ExtensionError, ExtensionResult};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn native() -> Arc<Capability> {
        Arc::new(Capability::builder("native").build())
    }

    fn scripted() -> Arc<Capability> {
        Arc::new(Capability::builder("script").scripted().build())
    }

    fn enabled_bridge() -> HookBridge {
        HookBridge::new(&ScriptingSection::default())
    }

    #[tokio::test]
    async fn test_native_runs_inline() {
        let bridge = HookBridge::native_only();
        let value = bridge.invoke(&native(), HookPoint::Command, || 42).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_scripted_runs_on_worker() {
        let bridge = enabled_bridge();
        assert!(bridge.scripting_enabled());
        let caller = std::thread::current().id();
        let worker_thread = bridge
            .invoke(&scripted(), HookPoint::NotCommand, || std::thread::current().id())
            .await
            .unwrap();
        assert_ne!(worker_thread, caller);
    }

    #[tokio::test]
    async fn test_scripted_jobs_run_in_order() {
        let bridge = enabled_bridge();
        let cap = scripted();
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        for i in 0..5 {
            let log = Arc::clone(&log);
            bridge
                .invoke(&cap, HookPoint::MessageReceived, move || log.lock().unwrap().push(i))
                .await
                .unwrap();
        }
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_scripted_panic_is_caught() {
        let bridge = enabled_bridge();
        let cap = scripted();
        let err = bridge
            .invoke(&cap, HookPoint::Command, || -> u8 { panic!("script exploded") })
            .await
            .unwrap_err();
        assert!(matches!(err, HookError::Panicked { ref message, .. } if message == "script exploded"));

        // The worker survives.
        assert_eq!(bridge.invoke(&cap, HookPoint::Command, || 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_scripted_timeout() {
        let bridge = enabled_bridge().with_timeout(Duration::from_millis(20));
        let execution = bridge
            .execute(&scripted(), HookPoint::Command, || {
                std::thread::sleep(Duration::from_millis(200));
            })
            .await;
        assert!(matches!(execution.result, HookExecutionResult::Timeout { .. }));
        assert!(execution.is_failure());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timeout_covers_waiting_for_queue_space() {
        let section = ScriptingSection {
            queue_capacity: 1,
            ..ScriptingSection::default()
        };
        let patient = HookBridge::new(&section);
        let hasty = patient.clone().with_timeout(Duration::from_millis(50));
        let cap = scripted();

        // One job running, one filling the queue.
        for _ in 0..2 {
            let bridge = patient.clone();
            let cap = Arc::clone(&cap);
            tokio::spawn(async move {
                bridge
                    .invoke(&cap, HookPoint::Command, || std::thread::sleep(Duration::from_millis(600)))
                    .await
            });
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = std::time::Instant::now();
        let err = hasty.invoke(&cap, HookPoint::Command, || ()).await.unwrap_err();
        assert!(started.elapsed() < Duration::from_millis(400), "waited {:?}", started.elapsed());
        assert!(matches!(err, HookError::Timeout { timeout_ms: 50, .. }));
        assert_eq!(err.to_string(), "script:command timed out after 50ms");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_job_abandoned_by_its_caller_is_not_run() {
        let patient = enabled_bridge();
        let hasty = patient.clone().with_timeout(Duration::from_millis(30));
        let cap = scripted();

        let busy = {
            let bridge = patient.clone();
            let cap = Arc::clone(&cap);
            tokio::spawn(async move {
                bridge
                    .invoke(&cap, HookPoint::Command, || std::thread::sleep(Duration::from_millis(200)))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let err = hasty
            .invoke(&cap, HookPoint::Command, move || flag.store(true, Ordering::SeqCst))
            .await
            .unwrap_err();
        assert!(matches!(err, HookError::Timeout { .. }));

        busy.await.unwrap().unwrap();
        // The worker is idle again; anything queued behind the busy job has been drained.
        patient.invoke(&cap, HookPoint::Command, || ()).await.unwrap();
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_disabled_scripting_skips() {
        let bridge = HookBridge::native_only();
        let execution = bridge.execute(&scripted(), HookPoint::NotCommand, || 1).await;
        assert!(matches!(execution.result, HookExecutionResult::Skipped { .. }));
        assert!(!execution.is_failure());
        assert_eq!(execution.into_value(), None);
    }

    struct FlagStorage {
        open: AtomicBool,
        fail: bool,
    }

    impl CapabilityStorage for FlagStorage {
        fn open(&self) -> ExtensionResult<()> {
            if self.fail {
                return Err(ExtensionError::Storage {
                    capability: "db".into(),
                    message: "locked".into(),
                });
            }
            self.open.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn close(&self) -> ExtensionResult<()> {
            self.open.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_storage_opened_before_invoke() {
        let storage = Arc::new(FlagStorage {
            open: AtomicBool::new(false),
            fail: false,
        });
        let cap = Arc::new(Capability::builder("db").storage(storage.clone()).build());
        let bridge = HookBridge::native_only();
        let observed = Arc::clone(&storage);
        let was_open = bridge
            .invoke(&cap, HookPoint::Command, move || observed.open.load(Ordering::SeqCst))
            .await
            .unwrap();
        assert!(was_open);
    }

    #[tokio::test]
    async fn test_storage_failure_is_handler_failure() {
        let storage = Arc::new(FlagStorage {
            open: AtomicBool::new(false),
            fail: true,
        });
        let cap = Arc::new(Capability::builder("db").storage(storage).build());
        let execution = HookBridge::native_only()
            .execute(&cap, HookPoint::Command, || ())
            .await;
        assert!(matches!(execution.result, HookExecutionResult::Failure { .. }));
    }
}
