/// A single historical request extracted from one access-log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    client_ip: String,
    path: String,
    user_agent: String,
}

impl RequestRecord {
    pub fn new(
        client_ip: impl Into<String>,
        path: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            client_ip: client_ip.into(),
            path: path.into(),
            user_agent: user_agent.into(),
        }
    }

    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}
