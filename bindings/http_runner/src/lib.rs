use prelude::{HttpAgentContext, HttpRunnerContext};

mod cli;
mod common;
mod context;
mod definition;
mod runner_context;

pub mod prelude {
    pub use super::{
        cli::SurgeHttpScenarioCli,
        common::{check_status, configure_http_client, http_get, run, HttpTarget},
        context::HttpAgentContext,
        definition::HttpScenarioDefinitionBuilder,
        runner_context::HttpRunnerContext,
    };

    pub use http_client_instrumented::{HttpClientInstrumented, HttpResponse};
    pub use surge_runner::prelude::*;
}
