use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Access/refresh token pair returned by login and refresh.
///
/// `Debug` never prints token values.
///
/// # Examples
///
/// ```
/// use core_auth::TokenPair;
///
/// let tokens = TokenPair::new("access", Some("refresh".to_string()));
/// assert_eq!(
///     format!("{:?}", tokens),
///     "TokenPair { access_token: \"[REDACTED]\", refresh_token: Some(\"[REDACTED]\") }"
/// );
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
        }
    }

    /// Extract tokens from a login/refresh `data` payload.
    ///
    /// The access token is read from `token`, falling back to `accessToken`.
    pub fn from_auth_data(data: &Value) -> Option<Self> {
        let access = data
            .get("token")
            .or_else(|| data.get("accessToken"))
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())?;

        let refresh = data
            .get("refreshToken")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string);

        Some(Self::new(access, refresh))
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Authentication state machine.
///
/// ```text
/// Anonymous ──login──> Authenticating ──ok──> Authenticated
///     ^                      │                     │
///     └──────── failure ─────┘   logout / expiry ──┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthState {
    Anonymous,
    Authenticating,
    Authenticated,
}

/// Current user session.
///
/// `is_logged_in` always equals `access_token.is_some()`; sessions are only
/// built through the constructors below.
#[derive(Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(skip_serializing)]
    access_token: Option<String>,
    #[serde(skip_serializing)]
    refresh_token: Option<String>,
    user: Option<Value>,
    is_logged_in: bool,
}

impl Session {
    pub fn anonymous() -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            user: None,
            is_logged_in: false,
        }
    }

    pub fn authenticated(tokens: TokenPair, user: Option<Value>) -> Self {
        Self {
            access_token: Some(tokens.access_token),
            refresh_token: tokens.refresh_token,
            user,
            is_logged_in: true,
        }
    }

    /// Replace tokens after a refresh, keeping the user profile.
    ///
    /// A pair without a refresh token keeps the previous refresh token.
    pub fn with_tokens(mut self, tokens: TokenPair) -> Self {
        self.access_token = Some(tokens.access_token);
        if tokens.refresh_token.is_some() {
            self.refresh_token = tokens.refresh_token;
        }
        self.is_logged_in = true;
        self
    }

    pub fn with_user(mut self, user: Option<Value>) -> Self {
        self.user = user;
        self
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn user(&self) -> Option<&Value> {
        self.user.as_ref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.is_logged_in
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("is_logged_in", &self.is_logged_in)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("has_user", &self.user.is_some())
            .finish()
    }
}

/// Credentials embedded into tunnel URLs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelCredentials {
    pub udid: String,
    pub token: Option<String>,
}

impl fmt::Debug for TunnelCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TunnelCredentials")
            .field("udid", &self.udid)
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_token_pair_reads_either_field_name() {
        let a = TokenPair::from_auth_data(&json!({"token": "t1", "refreshToken": "r1"})).unwrap();
        assert_eq!(a.access_token, "t1");
        assert_eq!(a.refresh_token.as_deref(), Some("r1"));

        let b = TokenPair::from_auth_data(&json!({"accessToken": "t2"})).unwrap();
        assert_eq!(b.access_token, "t2");
        assert!(b.refresh_token.is_none());

        assert!(TokenPair::from_auth_data(&json!({"refreshToken": "r"})).is_none());
        assert!(TokenPair::from_auth_data(&json!({"token": ""})).is_none());
    }

    #[test]
    fn test_session_invariant() {
        let anon = Session::anonymous();
        assert!(!anon.is_logged_in());
        assert!(anon.access_token().is_none());

        let session = Session::authenticated(TokenPair::new("a", Some("r".into())), None);
        assert!(session.is_logged_in());
        assert_eq!(session.access_token(), Some("a"));

        let refreshed = session.with_tokens(TokenPair::new("b", None));
        assert_eq!(refreshed.access_token(), Some("b"));
        assert_eq!(refreshed.refresh_token(), Some("r"));
    }

    #[test]
    fn test_session_serialization_hides_tokens() {
        let session = Session::authenticated(
            TokenPair::new("secret", Some("also-secret".into())),
            Some(json!({"email": "a@b.c"})),
        );
        let json = serde_json::to_string(&session).unwrap();

        assert!(!json.contains("secret"));
        assert!(json.contains("\"isLoggedIn\":true"));
    }

    #[test]
    fn test_auth_state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(AuthState::Authenticating).unwrap(),
            json!("authenticating")
        );
    }
}
