use breaking_point::{configure, TARGET_URL};
use http_surge_runner::prelude::*;

fn main() -> SurgeResult<()> {
    let builder =
        HttpScenarioDefinitionBuilder::new_with_init(env!("CARGO_PKG_NAME"), TARGET_URL)?;

    run(configure(builder))?;

    Ok(())
}
