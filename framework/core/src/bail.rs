/// Return this error from a virtual user's behaviour function to retire that virtual user.
///
/// Use it when a virtual user hits a problem it cannot recover from but which says nothing about
/// the rest of the run. The other virtual users keep going and the slot is not refilled.
#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct AgentBailError {
    msg: String,
}

impl AgentBailError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

impl Default for AgentBailError {
    fn default() -> Self {
        Self::new("Virtual user is bailing")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bail_error_is_detectable_through_anyhow() {
        let err: anyhow::Error = AgentBailError::new("target gone").into();

        assert!(err.is::<AgentBailError>());
        assert_eq!("target gone", err.to_string());
    }
}
