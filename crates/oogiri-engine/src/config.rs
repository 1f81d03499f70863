use std::env;
use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::auth::Credentials;

const API_KEY_NAMES: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];
const AUTH_SECTION: &str = "auth";
const AUTH_USERNAME_KEYS: [&str; 4] = ["username", "id", "user", "name"];
const AUTH_PASSWORD_KEYS: [&str; 3] = ["password", "pass", "pwd"];
const TOP_LEVEL_USERNAME_KEYS: [&str; 2] = ["USERNAME", "ID"];
const TOP_LEVEL_PASSWORD_KEYS: [&str; 2] = ["PASSWORD", "PASS"];

/// TOML secret file: flat keys plus an optional `[auth]` table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SecretStore {
    table: toml::Table,
}

impl SecretStore {
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        Ok(Self {
            table: raw.parse::<toml::Table>()?,
        })
    }

    /// A missing or unparsable file means there is no store.
    pub fn load(path: &Path) -> Option<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "no secret store");
                return None;
            }
        };
        match Self::from_toml(&raw) {
            Ok(store) => Some(store),
            Err(err) => {
                debug!(path = %path.display(), error = %err, "secret store unparsable");
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.table.get(key).and_then(scalar_text)
    }

    pub fn get_in(&self, section: &str, key: &str) -> Option<String> {
        self.table
            .get(section)
            .and_then(toml::Value::as_table)
            .and_then(|table| table.get(key))
            .and_then(scalar_text)
    }

    fn first_in(&self, section: &str, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.get_in(section, key))
    }

    fn first(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.get(key))
    }
}

/// Layered lookup: session override, then secret store, then environment.
#[derive(Clone)]
pub struct SecretResolver {
    store: Option<SecretStore>,
    env_lookup: fn(&str) -> Option<String>,
}

impl fmt::Debug for SecretResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretResolver")
            .field("store", &self.store.is_some())
            .finish_non_exhaustive()
    }
}

impl SecretResolver {
    pub fn new(store: Option<SecretStore>) -> Self {
        Self {
            store,
            env_lookup: non_empty_env,
        }
    }

    pub fn with_env_lookup(mut self, env_lookup: fn(&str) -> Option<String>) -> Self {
        self.env_lookup = env_lookup;
        self
    }

    pub fn store(&self) -> Option<&SecretStore> {
        self.store.as_ref()
    }

    pub fn resolve(&self, key: &str, session_override: Option<&str>) -> Option<String> {
        normalize(session_override)
            .or_else(|| self.store.as_ref().and_then(|store| store.get(key)))
            .and_then(|value| normalize(Some(&value)))
            .or_else(|| (self.env_lookup)(key).and_then(|value| normalize(Some(&value))))
    }

    pub fn resolve_api_key(&self, session_override: Option<&str>) -> Option<String> {
        if let Some(value) = normalize(session_override) {
            return Some(value);
        }
        let from_store = self.store.as_ref().and_then(|store| {
            API_KEY_NAMES
                .iter()
                .find_map(|key| store.get(key).and_then(|value| normalize(Some(&value))))
        });
        from_store.or_else(|| {
            API_KEY_NAMES
                .iter()
                .find_map(|key| (self.env_lookup)(key).and_then(|value| normalize(Some(&value))))
        })
    }

    /// Store credentials when both halves are present, else the fallback pair.
    pub fn resolve_credentials(&self, fallback: Option<Credentials>) -> Option<Credentials> {
        self.store
            .as_ref()
            .and_then(store_credentials)
            .or(fallback)
    }
}

fn store_credentials(store: &SecretStore) -> Option<Credentials> {
    let username = store
        .first_in(AUTH_SECTION, &AUTH_USERNAME_KEYS)
        .or_else(|| store.first(&TOP_LEVEL_USERNAME_KEYS));
    let password = store
        .first_in(AUTH_SECTION, &AUTH_PASSWORD_KEYS)
        .or_else(|| store.first(&TOP_LEVEL_PASSWORD_KEYS));
    Credentials::new(username?, password?)
}

fn scalar_text(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(text) => Some(text.clone()),
        toml::Value::Integer(number) => Some(number.to_string()),
        toml::Value::Float(number) => Some(number.to_string()),
        toml::Value::Boolean(flag) => Some(flag.to_string()),
        toml::Value::Datetime(stamp) => Some(stamp.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}

fn normalize(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
