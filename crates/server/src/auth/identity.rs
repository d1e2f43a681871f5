/// The authenticated caller of an admin endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// Key name, or `"anonymous"` when auth is disabled.
    pub id: String,
    /// `"api_key"` or `"none"`.
    pub auth_method: String,
}

impl CallerIdentity {
    /// Identity used when authentication is disabled.
    pub fn anonymous() -> Self {
        Self {
            id: "anonymous".to_owned(),
            auth_method: "none".to_owned(),
        }
    }
}
