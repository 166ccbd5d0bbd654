/// Caller address and agent as seen by the HTTP layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// One row of the access log: a login attempt or an access decision.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessLogEntry {
    pub user_id: Option<i64>,
    pub username: String,
    pub action: String,
    pub success: bool,
    pub failure_reason: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AccessLogEntry {
    pub fn new(user_id: Option<i64>, username: Option<&str>, action: impl Into<String>) -> Self {
        let username = match (username, user_id) {
            (Some(name), _) if !name.is_empty() => name.to_string(),
            (_, Some(id)) => format!("user:{}", id),
            _ => "anonymous".to_string(),
        };
        Self {
            user_id,
            username,
            action: action.into(),
            success: true,
            failure_reason: None,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn failed(mut self, reason: impl Into<String>) -> Self {
        self.success = false;
        self.failure_reason = Some(reason.into());
        self
    }

    pub fn outcome(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    pub fn from_client(mut self, client: &ClientInfo) -> Self {
        self.ip_address = client.ip_address.clone();
        self.user_agent = client.user_agent.clone();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_falls_back_to_id_then_anonymous() {
        assert_eq!(AccessLogEntry::new(Some(4), None, "login").username, "user:4");
        assert_eq!(AccessLogEntry::new(None, None, "login").username, "anonymous");
        assert_eq!(AccessLogEntry::new(Some(4), Some("alice"), "login").username, "alice");
    }
}
