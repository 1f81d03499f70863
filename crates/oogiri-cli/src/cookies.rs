use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use oogiri_contracts::cookies::CookieController;

/// Cookie controller over one request's jar. Writes land in the jar that is
/// sent back with the response and are readable for the rest of the request.
#[derive(Debug, Clone, Default)]
pub struct RequestCookies {
    jar: CookieJar,
}

impl RequestCookies {
    pub fn new(jar: CookieJar) -> Self {
        Self { jar }
    }

    pub fn into_jar(self) -> CookieJar {
        self.jar
    }
}

impl CookieController for RequestCookies {
    fn get(&self, key: &str) -> Option<String> {
        self.jar
            .get(key)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let cookie = Cookie::build((key.to_string(), value.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .permanent();
        self.jar = self.jar.clone().add(cookie);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        let cookie = Cookie::build((key.to_string(), String::new())).path("/");
        self.jar = self.jar.clone().remove(cookie);
        Ok(())
    }
}
