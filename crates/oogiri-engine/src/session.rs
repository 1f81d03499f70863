use oogiri_contracts::cookies::{reborrow, CookieController, CookiePolicy, BROWSER_SESSION_COOKIE};
use oogiri_contracts::history::{GenerationRecord, HistoryStore};
use oogiri_contracts::session::mint_session_id;
use tracing::debug;

use crate::auth::{AuthGate, Credentials};

/// Reads the browser session id cookie, minting and writing one when `create`
/// is set and none exists. `None` means cookies are unusable for this request.
pub fn browser_session_id(
    cookies: Option<&mut dyn CookieController>,
    create: bool,
    policy: &CookiePolicy,
) -> Option<String> {
    let cookies = cookies?;
    let existing = match cookies.refresh() {
        Ok(()) => cookies.get(BROWSER_SESSION_COOKIE),
        Err(err) => {
            debug!(error = %err, "cookie refresh failed");
            None
        }
    };
    if let Some(session_id) = existing.filter(|value| !value.is_empty()) {
        return Some(session_id);
    }
    if !create {
        return None;
    }
    let session_id = mint_session_id();
    if let Err(err) = cookies.set(BROWSER_SESSION_COOKIE, &session_id) {
        debug!(error = %err, "browser session cookie not written");
        return None;
    }
    policy.settle_after_write();
    Some(session_id)
}

pub fn load_history(
    cookies: Option<&mut dyn CookieController>,
    store: &dyn HistoryStore,
    policy: &CookiePolicy,
) -> Option<Vec<GenerationRecord>> {
    let session_id = browser_session_id(cookies, false, policy)?;
    store.load(&session_id)
}

pub fn persist_history(
    history: &[GenerationRecord],
    cookies: Option<&mut dyn CookieController>,
    store: &dyn HistoryStore,
    policy: &CookiePolicy,
) {
    let Some(session_id) = browser_session_id(cookies, true, policy) else {
        debug!("no browser session; history kept in memory only");
        return;
    };
    store.save(&session_id, history);
}

pub fn clear_stored_history(
    cookies: Option<&mut dyn CookieController>,
    store: &dyn HistoryStore,
    policy: &CookiePolicy,
) {
    if let Some(session_id) = browser_session_id(cookies, false, policy) {
        store.clear(&session_id);
    }
}

/// Everything one browser session carries between requests: the login gate,
/// the newest-first history and the API key typed into the settings panel.
#[derive(Debug, Clone)]
pub struct SessionContext {
    auth: AuthGate,
    history: Vec<GenerationRecord>,
    history_loaded: bool,
    api_key_override: Option<String>,
}

impl SessionContext {
    pub fn new(credentials: Option<Credentials>) -> Self {
        Self {
            auth: AuthGate::new(credentials),
            history: Vec::new(),
            history_loaded: false,
            api_key_override: None,
        }
    }

    pub fn auth(&self) -> &AuthGate {
        &self.auth
    }

    pub fn auth_mut(&mut self) -> &mut AuthGate {
        &mut self.auth
    }

    pub fn history(&self) -> &[GenerationRecord] {
        &self.history
    }

    pub fn history_loaded(&self) -> bool {
        self.history_loaded
    }

    pub fn find_record(&self, id: &str) -> Option<&GenerationRecord> {
        self.history.iter().find(|record| record.id == id)
    }

    pub fn api_key_override(&self) -> Option<&str> {
        self.api_key_override.as_deref()
    }

    pub fn set_api_key_override(&mut self, api_key: Option<&str>) {
        self.api_key_override = api_key
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
    }

    /// Login restore plus history restore, run at the start of every request.
    pub fn restore(
        &mut self,
        mut cookies: Option<&mut dyn CookieController>,
        store: &dyn HistoryStore,
        policy: &CookiePolicy,
    ) {
        if !self.auth.is_logged_in() {
            self.auth.restore_from_cookie(reborrow(&mut cookies), policy);
        }
        self.init_history(cookies, store, policy);
    }

    /// Restores stored history at most once, so later in-memory edits are never
    /// clobbered. Stays unloaded only while cookies exist but carry no session id
    /// yet, so the restore is retried on a later request.
    pub fn init_history(
        &mut self,
        mut cookies: Option<&mut dyn CookieController>,
        store: &dyn HistoryStore,
        policy: &CookiePolicy,
    ) {
        if self.history_loaded {
            return;
        }
        let cookies_available = cookies.is_some();
        if let Some(restored) = load_history(reborrow(&mut cookies), store, policy) {
            debug!(records = restored.len(), "history restored");
            self.history = restored;
            self.history_loaded = true;
            return;
        }
        if !cookies_available || browser_session_id(cookies, false, policy).is_some() {
            self.history_loaded = true;
        }
    }

    /// Newest first, then mirrored to the store.
    pub fn record_generation(
        &mut self,
        record: GenerationRecord,
        cookies: Option<&mut dyn CookieController>,
        store: &dyn HistoryStore,
        policy: &CookiePolicy,
    ) {
        self.history.insert(0, record);
        persist_history(&self.history, cookies, store, policy);
    }

    pub fn clear_history(
        &mut self,
        cookies: Option<&mut dyn CookieController>,
        store: &dyn HistoryStore,
        policy: &CookiePolicy,
    ) {
        self.history.clear();
        clear_stored_history(cookies, store, policy);
    }
}
