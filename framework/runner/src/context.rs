use std::future::Future;
use std::{fmt::Debug, sync::Arc};

use surge_instruments::prelude::{CheckRecord, Reporter};

use crate::definition::RunOptions;
use crate::executor::Executor;
use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle};

pub trait UserValuesConstraint: Default + Debug + Send + Sync + 'static {}

/// Run-wide context, shared read-only by every virtual user once the setup hook has run.
#[derive(Debug)]
pub struct RunnerContext<RV: UserValuesConstraint> {
    executor: Arc<Executor>,
    reporter: Arc<Reporter>,
    shutdown_handle: ShutdownHandle,
    options: Arc<RunOptions>,
    connection_string: Option<String>,
    run_id: String,
    value: RV,
}

impl<RV: UserValuesConstraint> RunnerContext<RV> {
    pub(crate) fn new(
        executor: Arc<Executor>,
        reporter: Arc<Reporter>,
        shutdown_handle: ShutdownHandle,
        options: Arc<RunOptions>,
        connection_string: Option<String>,
        run_id: String,
    ) -> Self {
        Self {
            executor,
            reporter,
            shutdown_handle,
            options,
            connection_string,
            run_id,
            value: Default::default(),
        }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn reporter(&self) -> Arc<Reporter> {
        self.reporter.clone()
    }

    /// The options this run was configured with, after command line overrides.
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// The connection string given on the command line.
    ///
    /// Returns an error if none was given, because scenarios that call this depend on it.
    pub fn get_connection_string(&self) -> anyhow::Result<&str> {
        self.connection_string
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No connection string was provided for this run"))
    }

    pub fn get_run_id(&self) -> &str {
        &self.run_id
    }

    /// Stop the run now. In-flight iterations are abandoned.
    pub fn force_stop_scenario(&self) {
        self.shutdown_handle.shutdown();
    }

    pub fn get_mut(&mut self) -> &mut RV {
        &mut self.value
    }

    pub fn get(&self) -> &RV {
        &self.value
    }
}

/// Context for one virtual user, passed to its setup, behaviour and teardown hooks.
pub struct AgentContext<RV: UserValuesConstraint, V: UserValuesConstraint> {
    agent_index: usize,
    agent_id: String,
    iteration: u64,
    runner_context: Arc<RunnerContext<RV>>,
    abandon_listener: DelegatedShutdownListener,
    value: V,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> AgentContext<RV, V> {
    pub(crate) fn new(
        agent_index: usize,
        agent_id: String,
        runner_context: Arc<RunnerContext<RV>>,
        abandon_listener: DelegatedShutdownListener,
    ) -> Self {
        Self {
            agent_index,
            agent_id,
            iteration: 0,
            runner_context,
            abandon_listener,
            value: Default::default(),
        }
    }

    /// The position of this virtual user in start order, starting at 0.
    pub fn agent_index(&self) -> usize {
        self.agent_index
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// The number of iterations this virtual user has completed.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub(crate) fn next_iteration(&mut self) {
        self.iteration += 1;
    }

    pub fn runner_context(&self) -> &Arc<RunnerContext<RV>> {
        &self.runner_context
    }

    /// Fires when this virtual user's in-flight work should be abandoned, either because it was
    /// retired or because the run is stopping.
    pub fn shutdown_listener(&mut self) -> &mut DelegatedShutdownListener {
        &mut self.abandon_listener
    }

    /// Run async code for this virtual user, blocking until it completes.
    ///
    /// The future is cancelled with a [crate::prelude::ShutdownSignalError] if this virtual user is
    /// retired or the run stops while it is still pending.
    pub fn execute_in_place<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        self.runner_context
            .executor()
            .execute_in_place_until(fut, self.abandon_listener.clone())
    }

    /// Record the outcome of a named check and return it, so it can be used inline.
    pub fn check(&self, name: &str, passed: bool) -> bool {
        self.runner_context.reporter.add_check(CheckRecord::new(
            name,
            passed,
            self.agent_id.as_str(),
            self.iteration,
        ));
        passed
    }

    pub fn get_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub fn get(&self) -> &V {
        &self.value
    }
}
