use crate::config::Config;

/// Session context carried from the startup gate into the UI.
///
/// The chat surfaces never read the token themselves; they only run once a
/// `Session` exists. `main` turns a missing token into an early exit with
/// instructions.
#[derive(Debug, Clone)]
pub struct Session {
    token: String,
}

impl Session {
    /// Resolve the session token, env var first, config file second.
    pub fn resolve(config: &Config) -> Option<Self> {
        let env_token = std::env::var("AGRICHAT_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());

        Self::from_token(env_token.or_else(|| config.api_token.clone()))
    }

    fn from_token(token: Option<String>) -> Option<Self> {
        token
            .filter(|token| !token.trim().is_empty())
            .map(|token| Self { token })
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_present_token_opens_a_session() {
        let session = Session::from_token(Some("abc123".to_string())).unwrap();
        assert_eq!(session.token(), "abc123");
    }

    #[test]
    fn missing_token_means_no_session() {
        assert!(Session::from_token(None).is_none());
    }

    #[test]
    fn blank_tokens_are_rejected() {
        assert!(Session::from_token(Some(String::new())).is_none());
        assert!(Session::from_token(Some("   ".to_string())).is_none());
    }
}
