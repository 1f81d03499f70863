use std::collections::HashMap;
use std::time::Duration;

pub const LOGIN_COOKIE: &str = "logged_in";
pub const BROWSER_SESSION_COOKIE: &str = "browser_session_id";

/// Client-side key/value cookie access.
///
/// Writes may become visible to `get` only after a `refresh`, so callers follow a
/// write with `CookiePolicy::write_settle` and retry reads per `read_attempts`.
pub trait CookieController {
    fn refresh(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&mut self, key: &str) -> anyhow::Result<()>;
}

/// Reborrows an optional controller so it can be handed to several calls in turn.
pub fn reborrow<'a>(
    cookies: &'a mut Option<&mut dyn CookieController>,
) -> Option<&'a mut dyn CookieController> {
    match cookies {
        Some(cookies) => {
            let cookies: &'a mut dyn CookieController = &mut **cookies;
            Some(cookies)
        }
        None => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CookiePolicy {
    pub read_attempts: u32,
    pub read_delay: Duration,
    pub write_settle: Duration,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            read_attempts: 2,
            read_delay: Duration::from_millis(300),
            write_settle: Duration::from_millis(600),
        }
    }
}

impl CookiePolicy {
    pub fn immediate() -> Self {
        Self {
            read_attempts: 1,
            read_delay: Duration::ZERO,
            write_settle: Duration::ZERO,
        }
    }

    pub fn settle_after_write(&self) {
        if !self.write_settle.is_zero() {
            std::thread::sleep(self.write_settle);
        }
    }

    pub fn pause_between_reads(&self) {
        if !self.read_delay.is_zero() {
            std::thread::sleep(self.read_delay);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryCookies {
    values: HashMap<String, String>,
}

impl MemoryCookies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl CookieController for MemoryCookies {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.values.remove(key);
        Ok(())
    }
}
