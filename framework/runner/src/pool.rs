use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::Context as _;
use surge_core::prelude::AgentBailError;

use crate::context::{AgentContext, RunnerContext, UserValuesConstraint};
use crate::definition::AgentHookMut;
use crate::shutdown::{ShutdownHandle, ShutdownSignalError};

/// How a virtual user thread ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VuExit {
    /// Stopped because it was retired or the run ended.
    Stopped,
    /// Returned an [AgentBailError] from its behaviour.
    Bailed,
    /// Its setup hook failed so it never ran the behaviour.
    SetupFailed,
}

/// The hooks every virtual user runs.
pub(crate) struct VuHooks<RV: UserValuesConstraint, V: UserValuesConstraint> {
    pub setup: Option<AgentHookMut<RV, V>>,
    pub behaviour: Option<AgentHookMut<RV, V>>,
    pub teardown: Option<AgentHookMut<RV, V>>,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> Clone for VuHooks<RV, V> {
    fn clone(&self) -> Self {
        Self {
            setup: self.setup,
            behaviour: self.behaviour,
            teardown: self.teardown,
        }
    }
}

struct VuHandle {
    agent_id: String,
    /// Tells the virtual user not to start another iteration.
    stop: ShutdownHandle,
    /// Cancels whatever the virtual user has in flight.
    abandon: ShutdownHandle,
    join_handle: JoinHandle<VuExit>,
}

impl VuHandle {
    fn stop(&self) {
        self.stop.shutdown();
    }

    fn abandon(&self) {
        self.abandon.shutdown();
    }
}

/// Totals across every virtual user the pool has started.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PoolOutcome {
    pub started_vus: usize,
    pub peak_vus: usize,
    pub bailed_vus: usize,
    pub failed_setups: usize,
    pub iterations: u64,
}

/// The set of running virtual users, each on its own thread.
///
/// New virtual users are appended and retirement always takes the most recently started ones, so
/// the longest running virtual users survive a ramp down.
pub(crate) struct VuPool<RV: UserValuesConstraint, V: UserValuesConstraint> {
    runner_context: Arc<RunnerContext<RV>>,
    hooks: VuHooks<RV, V>,
    run_shutdown: ShutdownHandle,
    active: Vec<VuHandle>,
    retired: Vec<VuHandle>,
    next_index: usize,
    active_count: Arc<AtomicUsize>,
    iterations: Arc<AtomicU64>,
    outcome: PoolOutcome,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> VuPool<RV, V> {
    pub(crate) fn new(
        runner_context: Arc<RunnerContext<RV>>,
        hooks: VuHooks<RV, V>,
        run_shutdown: ShutdownHandle,
    ) -> Self {
        Self {
            runner_context,
            hooks,
            run_shutdown,
            active: Vec::new(),
            retired: Vec::new(),
            next_index: 0,
            active_count: Arc::new(AtomicUsize::new(0)),
            iterations: Arc::new(AtomicU64::new(0)),
            outcome: PoolOutcome::default(),
        }
    }

    /// Live count of active virtual users, for display while the run is going.
    pub(crate) fn active_count(&self) -> Arc<AtomicUsize> {
        self.active_count.clone()
    }

    /// Live count of completed iterations.
    pub(crate) fn iterations(&self) -> Arc<AtomicU64> {
        self.iterations.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.active.len()
    }

    /// Start or retire virtual users until exactly `target` are active.
    pub(crate) fn scale_to(
        &mut self,
        target: usize,
        graceful_ramp_down: Duration,
    ) -> anyhow::Result<()> {
        if target > self.active.len() {
            log::debug!(
                "Ramping up from {} to {} virtual users",
                self.active.len(),
                target
            );
            while self.active.len() < target {
                self.spawn_vu()?;
            }
        } else if target < self.active.len() {
            log::debug!(
                "Ramping down from {} to {} virtual users",
                self.active.len(),
                target
            );
            let retiring = self.active.split_off(target);
            self.retire(retiring, graceful_ramp_down);
        }

        self.active_count.store(self.active.len(), Ordering::Relaxed);
        self.outcome.peak_vus = self.outcome.peak_vus.max(self.active.len());
        self.reap_retired();

        Ok(())
    }

    /// Retire every virtual user, giving in-flight iterations up to `grace` to finish, and wait for
    /// all of them to exit.
    pub(crate) fn stop_all(mut self, grace: Duration) -> PoolOutcome {
        let retiring = std::mem::take(&mut self.active);
        self.retire(retiring, grace);
        self.active_count.store(0, Ordering::Relaxed);

        for handle in self.retired.drain(..) {
            Self::record_exit(&mut self.outcome, handle);
        }

        self.outcome.iterations = self.iterations.load(Ordering::Relaxed);
        self.outcome
    }

    fn retire(&mut self, retiring: Vec<VuHandle>, grace: Duration) {
        for handle in &retiring {
            log::trace!("Retiring {}", handle.agent_id);
            handle.stop();
        }

        if grace.is_zero() {
            retiring.iter().for_each(VuHandle::abandon);
        } else if !retiring.is_empty() {
            let abandon = retiring.iter().map(|h| h.abandon.clone()).collect::<Vec<_>>();
            self.runner_context.executor().spawn(async move {
                tokio::time::sleep(grace).await;
                for handle in abandon {
                    handle.shutdown();
                }
            });
        }

        self.retired.extend(retiring);
    }

    /// Join retired virtual users that have already exited so their handles don't pile up.
    fn reap_retired(&mut self) {
        let (finished, still_running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.retired)
            .into_iter()
            .partition(|h| h.join_handle.is_finished());
        self.retired = still_running;

        for handle in finished {
            Self::record_exit(&mut self.outcome, handle);
        }
    }

    fn record_exit(outcome: &mut PoolOutcome, handle: VuHandle) {
        match handle.join_handle.join() {
            Ok(VuExit::Stopped) => {}
            Ok(VuExit::Bailed) => outcome.bailed_vus += 1,
            Ok(VuExit::SetupFailed) => outcome.failed_setups += 1,
            Err(e) => log::error!("Virtual user {} panicked: {:?}", handle.agent_id, e),
        }
    }

    fn spawn_vu(&mut self) -> anyhow::Result<()> {
        let agent_index = self.next_index;
        let agent_id = format!("vu-{agent_index}");

        let stop = ShutdownHandle::new();
        let abandon = ShutdownHandle::new();

        // For the loop to check if the virtual user should stop between iterations
        let mut stop_listener = stop.new_listener();
        let mut run_stop_listener = self.run_shutdown.new_listener();
        // For the behaviour to cancel in-flight work when the virtual user is abandoned
        let abandon_listener = abandon.new_listener();

        let runner_context = self.runner_context.clone();
        let hooks = self.hooks.clone();
        let iterations = self.iterations.clone();
        let thread_agent_id = agent_id.clone();

        let join_handle = std::thread::Builder::new()
            .name(agent_id.clone())
            .spawn(move || {
                let agent_id = thread_agent_id;
                let mut context = AgentContext::new(
                    agent_index,
                    agent_id.clone(),
                    runner_context,
                    abandon_listener,
                );

                if let Some(setup_agent_fn) = hooks.setup {
                    if let Err(e) = setup_agent_fn(&mut context) {
                        log::error!("Setup failed for virtual user {}: {:?}", agent_id, e);
                        return VuExit::SetupFailed;
                    }
                }

                let mut exit = VuExit::Stopped;
                if let Some(behaviour) = hooks.behaviour {
                    loop {
                        if stop_listener.should_shutdown() || run_stop_listener.should_shutdown() {
                            log::trace!("Stopping virtual user {}", agent_id);
                            break;
                        }

                        match behaviour(&mut context) {
                            Ok(()) => {}
                            Err(e) if e.is::<ShutdownSignalError>() => {
                                // The iteration was abandoned. The check at the top of the loop
                                // will catch this and break out.
                                continue;
                            }
                            Err(e) if e.is::<AgentBailError>() => {
                                log::warn!("Virtual user {} bailed: {}", agent_id, e);
                                exit = VuExit::Bailed;
                                break;
                            }
                            Err(e) => {
                                log::error!("Virtual user {} behaviour failed: {:?}", agent_id, e);
                            }
                        }

                        context.next_iteration();
                        iterations.fetch_add(1, Ordering::Relaxed);
                    }
                }

                if let Some(teardown_agent_fn) = hooks.teardown {
                    if let Err(e) = teardown_agent_fn(&mut context) {
                        log::error!("Teardown failed for virtual user {}: {:?}", agent_id, e);
                    }
                }

                exit
            })
            .with_context(|| format!("Failed to spawn thread for virtual user {agent_id}"))?;

        self.active.push(VuHandle {
            agent_id,
            stop,
            abandon,
            join_handle,
        });
        self.next_index += 1;
        self.outcome.started_vus += 1;

        Ok(())
    }
}
