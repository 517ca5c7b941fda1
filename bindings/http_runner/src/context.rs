use surge_runner::prelude::UserValuesConstraint;

/// HTTP specific values for one virtual user.
#[derive(Debug, Default)]
pub struct HttpAgentContext {
    pub(crate) last_status: Option<u16>,
}

impl UserValuesConstraint for HttpAgentContext {}

impl HttpAgentContext {
    /// The status of this virtual user's most recent response, if the most recent request got one.
    pub fn last_status(&self) -> Option<u16> {
        self.last_status
    }
}
