use oogiri_contracts::cookies::{CookieController, CookiePolicy, LOGIN_COOKIE};
use tracing::{debug, info};

const LOGIN_COOKIE_VALUE: &str = "1";

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Both halves are trimmed; the pair exists only if neither ends up empty.
    pub fn new(username: impl AsRef<str>, password: impl AsRef<str>) -> Option<Self> {
        let username = username.as_ref().trim();
        let password = password.as_ref().trim();
        if username.is_empty() || password.is_empty() {
            return None;
        }
        Some(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    LoggedOut,
    LoggedIn,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Incorrect ID or password.")]
    Mismatch,
}

/// Per-session login flag guarding the studio.
///
/// With no configured credentials the gate starts (and stays) open.
#[derive(Debug, Clone)]
pub struct AuthGate {
    configured: Option<Credentials>,
    state: AuthState,
}

impl AuthGate {
    pub fn new(configured: Option<Credentials>) -> Self {
        let state = if configured.is_some() {
            AuthState::LoggedOut
        } else {
            AuthState::LoggedIn
        };
        Self { configured, state }
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn is_logged_in(&self) -> bool {
        self.state == AuthState::LoggedIn
    }

    pub fn configured(&self) -> Option<&Credentials> {
        self.configured.as_ref()
    }

    /// Returns `Ok(true)` only on the `LoggedOut -> LoggedIn` transition.
    pub fn submit(&mut self, username: &str, password: &str) -> Result<bool, AuthError> {
        if self.is_logged_in() {
            return Ok(false);
        }
        let Some(configured) = self.configured.as_ref() else {
            self.state = AuthState::LoggedIn;
            return Ok(true);
        };
        if !configured.matches(username, password) {
            return Err(AuthError::Mismatch);
        }
        self.state = AuthState::LoggedIn;
        Ok(true)
    }

    /// `submit`, then remember the login in a durable cookie.
    pub fn login(
        &mut self,
        username: &str,
        password: &str,
        cookies: Option<&mut dyn CookieController>,
        policy: &CookiePolicy,
    ) -> Result<bool, AuthError> {
        let transitioned = self.submit(username, password)?;
        if transitioned {
            info!(username, "login succeeded");
            persist_login(cookies, policy);
        }
        Ok(transitioned)
    }

    /// Accepts a previously written login cookie as authoritative.
    pub fn restore_from_cookie(
        &mut self,
        cookies: Option<&mut dyn CookieController>,
        policy: &CookiePolicy,
    ) -> bool {
        if self.is_logged_in() {
            return true;
        }
        let Some(cookies) = cookies else {
            return false;
        };
        let attempts = policy.read_attempts.max(1);
        for attempt in 0..attempts {
            if let Err(err) = cookies.refresh() {
                debug!(error = %err, "cookie refresh failed; login not restored");
                return false;
            }
            if cookies.get(LOGIN_COOKIE).as_deref() == Some(LOGIN_COOKIE_VALUE) {
                self.state = AuthState::LoggedIn;
                return true;
            }
            if attempt + 1 < attempts {
                policy.pause_between_reads();
            }
        }
        false
    }

    /// Swaps the configured pair. A change logs the session out (and forgets the
    /// login cookie) unless the new configuration is open access.
    pub fn reconfigure(
        &mut self,
        configured: Option<Credentials>,
        cookies: Option<&mut dyn CookieController>,
    ) {
        if configured == self.configured {
            return;
        }
        self.configured = configured;
        if self.configured.is_none() {
            self.state = AuthState::LoggedIn;
            return;
        }
        self.state = AuthState::LoggedOut;
        forget_login(cookies);
    }
}

fn persist_login(cookies: Option<&mut dyn CookieController>, policy: &CookiePolicy) {
    let Some(cookies) = cookies else {
        return;
    };
    match cookies.set(LOGIN_COOKIE, LOGIN_COOKIE_VALUE) {
        Ok(()) => policy.settle_after_write(),
        Err(err) => debug!(error = %err, "login cookie not written"),
    }
}

fn forget_login(cookies: Option<&mut dyn CookieController>) {
    let Some(cookies) = cookies else {
        return;
    };
    if let Err(err) = cookies.remove(LOGIN_COOKIE) {
        debug!(error = %err, "login cookie not removed");
    }
}
