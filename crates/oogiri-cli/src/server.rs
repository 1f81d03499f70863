use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use axum_extra::extract::cookie::CookieJar;
use oogiri_contracts::cookies::{CookieController, CookiePolicy, BROWSER_SESSION_COOKIE};
use oogiri_contracts::history::HistoryStore;
use oogiri_contracts::session::mint_session_id;
use oogiri_engine::session::browser_session_id;
use oogiri_engine::{
    generate, Credentials, GenerationRequest, ImageBackend, SecretResolver, SessionContext,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::cookies::RequestCookies;
use crate::page::{self, Notice, NoticeLevel, StudioView};
use crate::registry::{lock, SessionRegistry, SharedSession};

pub struct AppState {
    sessions: SessionRegistry,
    store: Arc<dyn HistoryStore>,
    backend: Arc<dyn ImageBackend>,
    secrets: SecretResolver,
    credentials: Option<Credentials>,
    cookie_policy: CookiePolicy,
    model: String,
}

impl AppState {
    pub fn new(
        store: Arc<dyn HistoryStore>,
        backend: Arc<dyn ImageBackend>,
        secrets: SecretResolver,
        credentials: Option<Credentials>,
        cookie_policy: CookiePolicy,
        model: impl Into<String>,
    ) -> Self {
        Self {
            sessions: SessionRegistry::default(),
            store,
            backend,
            secrets,
            credentials,
            cookie_policy,
            model: model.into(),
        }
    }

    pub fn with_sessions(mut self, sessions: SessionRegistry) -> Self {
        self.sessions = sessions;
        self
    }

    /// Finds or creates the context for this browser and runs the per-request
    /// login and history restore. Only browsers that sent a session cookie back
    /// get a registry entry; first contact runs on a throwaway context.
    fn session(&self, cookies: &mut RequestCookies) -> SharedSession {
        let returning = cookies.get(BROWSER_SESSION_COOKIE).is_some();
        let key = browser_session_id(Some(&mut *cookies), true, &self.cookie_policy)
            .unwrap_or_else(mint_session_id);
        let fresh = || SessionContext::new(self.credentials.clone());
        let session = if returning {
            self.sessions.get_or_insert(&key, fresh)
        } else {
            Arc::new(Mutex::new(fresh()))
        };
        lock(&session).restore(Some(&mut *cookies), self.store.as_ref(), &self.cookie_policy);
        session
    }

    fn render(
        &self,
        context: &SessionContext,
        form: &GenerateForm,
        notices: &[Notice],
    ) -> String {
        if !context.auth().is_logged_in() {
            return page::render_login(None);
        }
        let view = StudioView {
            history: context.history(),
            prompt: &form.prompt,
            no_text: form.no_text(),
            notices,
            model: &self.model,
            api_key_ready: self
                .secrets
                .resolve_api_key(context.api_key_override())
                .is_some(),
            api_key_overridden: context.api_key_override().is_some(),
            username: context.auth().configured().map(Credentials::username),
        };
        page::render_studio(&view)
    }
}

#[derive(Debug, Default, Deserialize)]
struct GenerateForm {
    #[serde(default)]
    prompt: String,
    #[serde(default)]
    no_text: Option<String>,
}

impl GenerateForm {
    fn no_text(&self) -> bool {
        self.no_text.is_some()
    }
}

#[derive(Debug, Default, Deserialize)]
struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

#[derive(Debug, Default, Deserialize)]
struct SettingsForm {
    #[serde(default)]
    api_key: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/login", post(login_submit))
        .route("/settings", post(settings_submit))
        .route("/generate", post(generate_submit))
        .route("/history/clear", post(history_clear))
        .route("/history/:id/image", get(history_image))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(bind: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(%bind, "studio listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server stopped unexpectedly")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

/// Session work sleeps on cookie delays and calls Gemini synchronously.
async fn blocking<F>(job: F) -> Response
where
    F: FnOnce() -> Response + Send + 'static,
{
    match tokio::task::spawn_blocking(job).await {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "request worker failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn index(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    blocking(move || {
        let mut cookies = RequestCookies::new(jar);
        let session = state.session(&mut cookies);
        let html = state.render(&lock(&session), &GenerateForm::default(), &[]);
        (cookies.into_jar(), Html(html)).into_response()
    })
    .await
}

async fn login_submit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    blocking(move || {
        let mut cookies = RequestCookies::new(jar);
        let session = state.session(&mut cookies);
        let outcome = lock(&session).auth_mut().login(
            &form.username,
            &form.password,
            Some(&mut cookies),
            &state.cookie_policy,
        );
        match outcome {
            Ok(_) => (cookies.into_jar(), Redirect::to("/")).into_response(),
            Err(err) => {
                warn!("login rejected");
                let html = page::render_login(Some(&err.to_string()));
                (cookies.into_jar(), Html(html)).into_response()
            }
        }
    })
    .await
}

async fn settings_submit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<SettingsForm>,
) -> Response {
    blocking(move || {
        let mut cookies = RequestCookies::new(jar);
        let session = state.session(&mut cookies);
        let mut context = lock(&session);
        if !context.auth().is_logged_in() {
            drop(context);
            return (cookies.into_jar(), Redirect::to("/")).into_response();
        }
        context.set_api_key_override(Some(form.api_key.as_str()));
        if let Some(edited) = Credentials::new(&form.username, &form.password) {
            context.auth_mut().reconfigure(Some(edited), Some(&mut cookies));
            if !context.auth().is_logged_in() {
                info!("session credentials changed; login required");
            }
        }
        let notices = [Notice::new(NoticeLevel::Success, "Settings saved.")];
        let html = state.render(&context, &GenerateForm::default(), &notices);
        drop(context);
        (cookies.into_jar(), Html(html)).into_response()
    })
    .await
}

async fn generate_submit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<GenerateForm>,
) -> Response {
    blocking(move || {
        let mut cookies = RequestCookies::new(jar);
        let session = state.session(&mut cookies);
        let api_key = {
            let context = lock(&session);
            if !context.auth().is_logged_in() {
                drop(context);
                return (cookies.into_jar(), Redirect::to("/")).into_response();
            }
            state.secrets.resolve_api_key(context.api_key_override())
        };

        let request = GenerationRequest {
            prompt: form.prompt.clone(),
            no_text: form.no_text(),
        };
        let outcome = generate(
            state.backend.as_ref(),
            &state.model,
            &request,
            api_key.as_deref(),
        );

        let mut context = lock(&session);
        let notices = match outcome {
            Ok(record) => {
                context.record_generation(
                    record,
                    Some(&mut cookies),
                    state.store.as_ref(),
                    &state.cookie_policy,
                );
                vec![Notice::new(NoticeLevel::Success, "Image generated.")]
            }
            Err(err) => Notice::for_generate_error(&err),
        };
        let html = state.render(&context, &form, &notices);
        drop(context);
        (cookies.into_jar(), Html(html)).into_response()
    })
    .await
}

async fn history_clear(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    blocking(move || {
        let mut cookies = RequestCookies::new(jar);
        let session = state.session(&mut cookies);
        {
            let mut context = lock(&session);
            if context.auth().is_logged_in() {
                context.clear_history(
                    Some(&mut cookies),
                    state.store.as_ref(),
                    &state.cookie_policy,
                );
                info!("history cleared");
            }
        }
        (cookies.into_jar(), Redirect::to("/")).into_response()
    })
    .await
}

async fn history_image(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> Response {
    blocking(move || {
        let mut cookies = RequestCookies::new(jar);
        let session = state.session(&mut cookies);
        let found = {
            let context = lock(&session);
            if !context.auth().is_logged_in() {
                None
            } else {
                context
                    .find_record(&id)
                    .filter(|record| record.has_image())
                    .map(|record| record.image.clone())
            }
        };
        match found {
            Some(bytes) => {
                let mime = image_mime_type(&bytes);
                (cookies.into_jar(), [(header::CONTENT_TYPE, mime)], bytes).into_response()
            }
            None => (cookies.into_jar(), StatusCode::NOT_FOUND).into_response(),
        }
    })
    .await
}

fn image_mime_type(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or("application/octet-stream")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use oogiri_contracts::cookies::{CookiePolicy, BROWSER_SESSION_COOKIE};
    use oogiri_contracts::history::{FileHistoryStore, HistoryStore, MemoryHistoryStore};
    use oogiri_engine::{
        BackendError, Credentials, GenerateContentResponse, ImageBackend, SecretResolver,
        SecretStore,
    };
    use serde_json::json;
    use tower::ServiceExt;

    use super::{image_mime_type, router, AppState};
    use crate::registry::SessionRegistry;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";

    struct FakeBackend {
        payload: Option<serde_json::Value>,
        calls: Mutex<usize>,
    }

    impl FakeBackend {
        fn image() -> Self {
            Self {
                payload: Some(json!({
                    "candidates": [{"content": {"parts": [
                        {"text": "A fox in the snow."},
                        {"inlineData": {"mimeType": "image/png", "data": "iVBORw0KGgo="}},
                    ]}}]
                })),
                calls: Mutex::new(0),
            }
        }

        fn quota() -> Self {
            Self {
                payload: None,
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.lock().map(|calls| *calls).unwrap_or_default()
        }
    }

    impl ImageBackend for FakeBackend {
        fn generate_content(
            &self,
            _api_key: &str,
            _model: &str,
            _prompt: &str,
        ) -> Result<GenerateContentResponse, BackendError> {
            if let Ok(mut calls) = self.calls.lock() {
                *calls += 1;
            }
            match &self.payload {
                Some(value) => serde_json::from_value(value.clone())
                    .map_err(|err| BackendError::Unexpected(err.into())),
                None => Err(BackendError::QuotaExhausted {
                    message: "Resource has been exhausted".to_string(),
                }),
            }
        }
    }

    fn no_env(_key: &str) -> Option<String> {
        None
    }

    fn app(
        store: Arc<dyn HistoryStore>,
        backend: Arc<FakeBackend>,
        credentials: Option<Credentials>,
    ) -> anyhow::Result<AppState> {
        let secrets = SecretResolver::new(Some(SecretStore::from_toml(
            "GEMINI_API_KEY = \"test-key\"",
        )?))
        .with_env_lookup(no_env);
        Ok(AppState::new(
            store,
            backend,
            secrets,
            credentials,
            CookiePolicy::immediate(),
            "models/test",
        ))
    }

    fn state(
        store: Arc<dyn HistoryStore>,
        backend: Arc<FakeBackend>,
        credentials: Option<Credentials>,
    ) -> anyhow::Result<Arc<AppState>> {
        Ok(Arc::new(app(store, backend, credentials)?))
    }

    /// Minimal browser: remembers cookies between requests.
    #[derive(Default)]
    struct Browser {
        cookies: BTreeMap<String, String>,
    }

    struct Reply {
        status: StatusCode,
        content_type: Option<String>,
        body: Vec<u8>,
    }

    impl Reply {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.body).into_owned()
        }
    }

    impl Browser {
        async fn send(
            &mut self,
            state: &Arc<AppState>,
            method: &str,
            uri: &str,
            form: Option<&str>,
        ) -> anyhow::Result<Reply> {
            let mut builder = Request::builder().method(method).uri(uri);
            if !self.cookies.is_empty() {
                let header_value = self
                    .cookies
                    .iter()
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect::<Vec<_>>()
                    .join("; ");
                builder = builder.header(header::COOKIE, header_value);
            }
            let body = match form {
                Some(form) => {
                    builder = builder
                        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
                    Body::from(form.to_string())
                }
                None => Body::empty(),
            };
            let response = router(state.clone()).oneshot(builder.body(body)?).await?;

            for value in response.headers().get_all(header::SET_COOKIE) {
                let raw = value.to_str()?;
                let pair = raw.split(';').next().unwrap_or_default();
                if let Some((name, value)) = pair.split_once('=') {
                    if value.is_empty() {
                        self.cookies.remove(name);
                    } else {
                        self.cookies.insert(name.to_string(), value.to_string());
                    }
                }
            }
            let status = response.status();
            let content_type = response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            let body = response.into_body().collect().await?.to_bytes().to_vec();
            Ok(Reply {
                status,
                content_type,
                body,
            })
        }
    }

    #[tokio::test]
    async fn open_access_shows_studio_and_mints_session_cookie() -> anyhow::Result<()> {
        let app = state(
            Arc::new(MemoryHistoryStore::new()),
            Arc::new(FakeBackend::image()),
            None,
        )?;
        let mut browser = Browser::default();

        let reply = browser.send(&app, "GET", "/", None).await?;
        assert_eq!(reply.status, StatusCode::OK);
        assert!(reply.text().contains("action=\"/generate\""));
        let session_id = browser.cookies.get("browser_session_id").cloned();
        assert_eq!(session_id.map(|id| id.len()), Some(32));
        Ok(())
    }

    #[tokio::test]
    async fn login_gates_the_studio() -> anyhow::Result<()> {
        let app = state(
            Arc::new(MemoryHistoryStore::new()),
            Arc::new(FakeBackend::image()),
            Credentials::new("alice", "secret"),
        )?;
        let mut browser = Browser::default();

        let first = browser.send(&app, "GET", "/", None).await?;
        assert!(first.text().contains("action=\"/login\""));

        let wrong = browser
            .send(&app, "POST", "/login", Some("username=alice&password=nope"))
            .await?;
        assert!(wrong.text().contains("Incorrect ID or password."));
        assert!(!browser.cookies.contains_key("logged_in"));

        let right = browser
            .send(&app, "POST", "/login", Some("username=alice&password=secret"))
            .await?;
        assert_eq!(right.status, StatusCode::SEE_OTHER);
        assert_eq!(browser.cookies.get("logged_in").map(String::as_str), Some("1"));

        let studio = browser.send(&app, "GET", "/", None).await?;
        assert!(studio.text().contains("action=\"/generate\""));
        Ok(())
    }

    #[tokio::test]
    async fn login_cookie_is_honored_after_restart() -> anyhow::Result<()> {
        let store: Arc<dyn HistoryStore> = Arc::new(MemoryHistoryStore::new());
        let credentials = Credentials::new("alice", "secret");
        let mut browser = Browser::default();

        let before = state(store.clone(), Arc::new(FakeBackend::image()), credentials.clone())?;
        browser
            .send(&before, "POST", "/login", Some("username=alice&password=secret"))
            .await?;

        let after = state(store, Arc::new(FakeBackend::image()), credentials)?;
        let reply = browser.send(&after, "GET", "/", None).await?;
        assert!(reply.text().contains("action=\"/generate\""));
        Ok(())
    }

    #[tokio::test]
    async fn generated_image_is_listed_served_and_restored() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let store: Arc<dyn HistoryStore> = Arc::new(FileHistoryStore::new(temp.path()));
        let backend = Arc::new(FakeBackend::image());
        let app = state(store.clone(), backend.clone(), None)?;
        let mut browser = Browser::default();

        let reply = browser
            .send(&app, "POST", "/generate", Some("prompt=a+red+fox&no_text=on"))
            .await?;
        let html = reply.text();
        assert!(html.contains("Image generated."));
        assert!(html.contains("A fox in the snow."));
        assert_eq!(backend.calls(), 1);

        let session_id = browser
            .cookies
            .get("browser_session_id")
            .cloned()
            .unwrap_or_default();
        assert!(temp.path().join(format!("{session_id}.json")).exists());

        let marker = "src=\"";
        let start = html
            .find("src=\"/history/")
            .map(|index| index + marker.len())
            .unwrap_or_default();
        let image_path: String = html[start..].chars().take_while(|ch| *ch != '"').collect();
        let image = browser.send(&app, "GET", &image_path, None).await?;
        assert_eq!(image.status, StatusCode::OK);
        assert_eq!(image.content_type.as_deref(), Some("image/png"));
        assert_eq!(image.body, PNG.to_vec());

        let restarted = state(store, Arc::new(FakeBackend::image()), None)?;
        let page = browser.send(&restarted, "GET", "/", None).await?;
        assert!(page.text().contains("<p>a red fox</p>"));
        Ok(())
    }

    #[tokio::test]
    async fn empty_prompt_warns_without_calling_backend() -> anyhow::Result<()> {
        let backend = Arc::new(FakeBackend::image());
        let app = state(Arc::new(MemoryHistoryStore::new()), backend.clone(), None)?;
        let mut browser = Browser::default();

        let reply = browser
            .send(&app, "POST", "/generate", Some("prompt=+++"))
            .await?;
        let html = reply.text();
        assert!(html.contains("notice warning"));
        assert!(html.contains("Enter a prompt first."));
        assert_eq!(backend.calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn quota_failure_keeps_prompt_and_links_docs() -> anyhow::Result<()> {
        let app = state(
            Arc::new(MemoryHistoryStore::new()),
            Arc::new(FakeBackend::quota()),
            None,
        )?;
        let mut browser = Browser::default();

        let reply = browser
            .send(&app, "POST", "/generate", Some("prompt=a+fox"))
            .await?;
        let html = reply.text();
        assert!(html.contains("class=\"notice error\""));
        assert!(html.contains("class=\"notice info\""));
        assert!(html.contains("ai.google.dev/gemini-api/docs/rate-limits"));
        assert!(html.contains(">a fox</textarea>"));
        assert!(html.contains("Nothing generated yet."));
        Ok(())
    }

    #[tokio::test]
    async fn clear_history_empties_list_and_store() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let app = state(
            Arc::new(FileHistoryStore::new(temp.path())),
            Arc::new(FakeBackend::image()),
            None,
        )?;
        let mut browser = Browser::default();

        browser
            .send(&app, "POST", "/generate", Some("prompt=a+fox"))
            .await?;
        let cleared = browser.send(&app, "POST", "/history/clear", None).await?;
        assert_eq!(cleared.status, StatusCode::SEE_OTHER);

        let page = browser.send(&app, "GET", "/", None).await?;
        assert!(page.text().contains("Nothing generated yet."));
        assert_eq!(std::fs::read_dir(temp.path())?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn logged_out_sessions_cannot_generate_or_fetch_images() -> anyhow::Result<()> {
        let backend = Arc::new(FakeBackend::image());
        let app = state(
            Arc::new(MemoryHistoryStore::new()),
            backend.clone(),
            Credentials::new("alice", "secret"),
        )?;
        let mut browser = Browser::default();

        let reply = browser
            .send(&app, "POST", "/generate", Some("prompt=a+fox"))
            .await?;
        assert_eq!(reply.status, StatusCode::SEE_OTHER);
        assert_eq!(backend.calls(), 0);

        let image = browser
            .send(&app, "GET", "/history/abc/image", None)
            .await?;
        assert_eq!(image.status, StatusCode::NOT_FOUND);
        Ok(())
    }

    #[tokio::test]
    async fn editing_credentials_logs_the_session_out() -> anyhow::Result<()> {
        let app = state(
            Arc::new(MemoryHistoryStore::new()),
            Arc::new(FakeBackend::image()),
            Credentials::new("alice", "secret"),
        )?;
        let mut browser = Browser::default();
        browser
            .send(&app, "POST", "/login", Some("username=alice&password=secret"))
            .await?;

        let reply = browser
            .send(
                &app,
                "POST",
                "/settings",
                Some("api_key=&username=bob&password=hunter2"),
            )
            .await?;
        assert!(reply.text().contains("action=\"/login\""));
        assert!(!browser.cookies.contains_key("logged_in"));

        browser
            .send(&app, "POST", "/login", Some("username=bob&password=hunter2"))
            .await?;
        let studio = browser.send(&app, "GET", "/", None).await?;
        assert!(studio.text().contains("action=\"/generate\""));
        Ok(())
    }

    #[tokio::test]
    async fn first_contact_does_not_register_a_session() -> anyhow::Result<()> {
        let app = state(
            Arc::new(MemoryHistoryStore::new()),
            Arc::new(FakeBackend::image()),
            None,
        )?;

        for _ in 0..50 {
            let reply = Browser::default().send(&app, "GET", "/", None).await?;
            assert_eq!(reply.status, StatusCode::OK);
        }
        assert_eq!(app.sessions.live_sessions(), 0);

        let mut browser = Browser::default();
        for _ in 0..3 {
            browser
                .send(&app, "POST", "/generate", Some("prompt=a+fox"))
                .await?;
        }
        assert_eq!(app.sessions.live_sessions(), 1);
        let page = browser.send(&app, "GET", "/", None).await?;
        assert_eq!(page.text().matches("<p>a fox</p>").count(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn forged_session_ids_stay_within_capacity() -> anyhow::Result<()> {
        let app = Arc::new(
            app(
                Arc::new(MemoryHistoryStore::new()),
                Arc::new(FakeBackend::image()),
                None,
            )?
            .with_sessions(SessionRegistry::new(Duration::from_secs(3600), 4)),
        );

        for index in 0..20 {
            let mut browser = Browser::default();
            browser
                .cookies
                .insert(BROWSER_SESSION_COOKIE.to_string(), format!("forged{index}"));
            browser.send(&app, "GET", "/", None).await?;
        }
        assert_eq!(app.sessions.live_sessions(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn evicted_session_recovers_login_and_history() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let app = Arc::new(
            app(
                Arc::new(FileHistoryStore::new(temp.path())),
                Arc::new(FakeBackend::image()),
                Credentials::new("alice", "secret"),
            )?
            .with_sessions(SessionRegistry::new(Duration::ZERO, 8)),
        );

        let mut alice = Browser::default();
        alice.send(&app, "GET", "/", None).await?;
        alice
            .send(&app, "POST", "/login", Some("username=alice&password=secret"))
            .await?;
        alice
            .send(&app, "POST", "/generate", Some("prompt=a+fox"))
            .await?;

        let mut other = Browser::default();
        other.send(&app, "GET", "/", None).await?;
        other.send(&app, "GET", "/", None).await?;
        assert_eq!(app.sessions.live_sessions(), 1);

        let page = alice.send(&app, "GET", "/", None).await?;
        let html = page.text();
        assert!(html.contains("action=\"/generate\""));
        assert!(html.contains("<p>a fox</p>"));
        Ok(())
    }

    #[test]
    fn mime_type_is_sniffed_from_bytes() {
        assert_eq!(image_mime_type(PNG), "image/png");
        assert_eq!(image_mime_type(b"\xff\xd8\xff\xe0"), "image/jpeg");
        assert_eq!(image_mime_type(b"plain"), "application/octet-stream");
    }
}
