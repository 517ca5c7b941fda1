use crate::cli::SurgeHttpScenarioCli;
use clap::Parser;
use surge_runner::prelude::{ScenarioDefinitionBuilder, UserValuesConstraint};

pub struct HttpScenarioDefinitionBuilder<RV: UserValuesConstraint, AV: UserValuesConstraint> {
    inner: ScenarioDefinitionBuilder<RV, AV>,
}

impl<RV: UserValuesConstraint, AV: UserValuesConstraint> HttpScenarioDefinitionBuilder<RV, AV> {
    /// See [ScenarioDefinitionBuilder::new_with_init].
    ///
    /// This function uses [SurgeHttpScenarioCli] instead of [surge_runner::prelude::SurgeScenarioCli].
    pub fn new_with_init(name: &str, default_target_url: &str) -> anyhow::Result<Self> {
        env_logger::init();
        Self::new(name, SurgeHttpScenarioCli::parse(), default_target_url)
    }

    pub fn new(
        name: &str,
        cli: SurgeHttpScenarioCli,
        default_target_url: &str,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            inner: ScenarioDefinitionBuilder::new(name, cli.into_scenario_cli(default_target_url)?),
        })
    }

    /// Once the HTTP customisations have been made, use this function to switch back to
    /// configuring default properties for the scenario.
    pub fn into_std(self) -> ScenarioDefinitionBuilder<RV, AV> {
        self.inner
    }
}
