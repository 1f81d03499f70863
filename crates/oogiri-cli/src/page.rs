use std::fmt::Write as _;

use oogiri_contracts::history::GenerationRecord;
use oogiri_engine::GenerateError;

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; max-width: 760px; margin: 2rem auto; padding: 0 1rem; color: #222; }
h1 { font-size: 1.6rem; }
textarea { width: 100%; min-height: 7rem; font: inherit; }
input[type=text], input[type=password] { width: 100%; font: inherit; }
button { font: inherit; padding: .4rem 1rem; }
.notice { padding: .6rem .8rem; border-radius: 4px; margin: 1rem 0; }
.notice.success { background: #e6f4ea; }
.notice.info { background: #e8f0fe; }
.notice.warning { background: #fef7e0; }
.notice.error { background: #fce8e6; }
.record { border-top: 1px solid #ddd; padding: 1rem 0; }
.record img { max-width: 100%; }
.caption { color: #555; font-size: .9rem; }
details { margin: 1rem 0; }
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl NoticeLevel {
    fn class(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// One-shot message shown above the history list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub link: Option<String>,
    pub details: Vec<String>,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            link: None,
            details: Vec::new(),
        }
    }

    /// Notices for a failed generation: the failure itself, then a separate
    /// pointer to the quota docs when one applies.
    pub fn for_generate_error(err: &GenerateError) -> Vec<Self> {
        let level = if err.is_warning() {
            NoticeLevel::Warning
        } else {
            NoticeLevel::Error
        };
        let mut failure = Self::new(level, err.to_string());
        if let GenerateError::QuotaExhausted { detail } = err {
            if !detail.is_empty() {
                failure.details.push(detail.clone());
            }
        }
        failure.details.extend(err.texts().iter().cloned());

        let mut notices = vec![failure];
        if let Some(link) = err.reference_link() {
            let mut pointer = Self::new(NoticeLevel::Info, "Rate limits and quotas:");
            pointer.link = Some(link.to_string());
            notices.push(pointer);
        }
        notices
    }
}

/// Everything the studio page shows for one session.
#[derive(Debug, Clone, Copy)]
pub struct StudioView<'a> {
    pub history: &'a [GenerationRecord],
    pub prompt: &'a str,
    pub no_text: bool,
    pub notices: &'a [Notice],
    pub model: &'a str,
    pub api_key_ready: bool,
    pub api_key_overridden: bool,
    pub username: Option<&'a str>,
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn document(body: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>Oogiri Studio</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{body}</body>\n</html>\n"
    )
}

fn notice_html(notice: &Notice) -> String {
    let mut html = format!(
        "<div class=\"notice {}\"><p>{}</p>",
        notice.level.class(),
        escape_html(&notice.message)
    );
    if let Some(link) = &notice.link {
        let link = escape_html(link);
        let _ = write!(html, "<p><a href=\"{link}\" target=\"_blank\" rel=\"noopener\">{link}</a></p>");
    }
    for detail in &notice.details {
        let _ = write!(html, "<p class=\"caption\">{}</p>", escape_html(detail));
    }
    html.push_str("</div>\n");
    html
}

pub fn render_login(error: Option<&str>) -> String {
    let mut body = String::from("<h1>Oogiri Studio</h1>\n<p>Sign in to continue.</p>\n");
    if let Some(message) = error {
        body.push_str(&notice_html(&Notice::new(NoticeLevel::Error, message)));
    }
    body.push_str(
        "<form method=\"post\" action=\"/login\">\n\
         <p><label>ID<br><input type=\"text\" name=\"username\" autocomplete=\"username\"></label></p>\n\
         <p><label>Password<br><input type=\"password\" name=\"password\" autocomplete=\"current-password\"></label></p>\n\
         <p><button type=\"submit\">Log in</button></p>\n\
         </form>\n",
    );
    document(&body)
}

fn settings_html(view: &StudioView<'_>) -> String {
    let key_status = match (view.api_key_overridden, view.api_key_ready) {
        (true, _) => "using the key entered for this session",
        (false, true) => "using the configured key",
        (false, false) => "no key configured",
    };
    let username = view.username.map(escape_html).unwrap_or_default();
    format!(
        "<details>\n<summary>Settings</summary>\n\
         <form method=\"post\" action=\"/settings\">\n\
         <p><label>Gemini API key ({key_status})<br>\
         <input type=\"password\" name=\"api_key\" autocomplete=\"off\"></label></p>\n\
         <p><label>ID<br><input type=\"text\" name=\"username\" value=\"{username}\"></label></p>\n\
         <p><label>Password<br><input type=\"password\" name=\"password\" autocomplete=\"new-password\"></label></p>\n\
         <p class=\"caption\">Model: {model}. Changing the ID or password signs this session out.</p>\n\
         <p><button type=\"submit\">Save settings</button></p>\n\
         </form>\n</details>\n",
        model = escape_html(view.model),
    )
}

fn record_html(record: &GenerationRecord) -> String {
    let mut html = String::from("<div class=\"record\">\n");
    if record.has_image() && !record.id.is_empty() {
        let _ = writeln!(
            html,
            "<img src=\"/history/{id}/image\" alt=\"{alt}\">",
            id = escape_html(&record.id),
            alt = escape_html(&record.prompt)
        );
    }
    let _ = writeln!(html, "<p>{}</p>", escape_html(&record.prompt));
    for text in &record.texts {
        let _ = writeln!(html, "<p class=\"caption\">{}</p>", escape_html(text));
    }
    let flag = if record.no_text { " · no text" } else { "" };
    let _ = writeln!(
        html,
        "<p class=\"caption\">{}{flag}</p>",
        escape_html(&record.model)
    );
    html.push_str("</div>\n");
    html
}

pub fn render_studio(view: &StudioView<'_>) -> String {
    let mut body = String::from("<h1>Oogiri Studio</h1>\n");
    body.push_str(&settings_html(view));

    let checked = if view.no_text { " checked" } else { "" };
    let _ = write!(
        body,
        "<form method=\"post\" action=\"/generate\">\n\
         <p><textarea name=\"prompt\" placeholder=\"Describe the image\">{prompt}</textarea></p>\n\
         <p><label><input type=\"checkbox\" name=\"no_text\" value=\"on\"{checked}> No text in the image</label></p>\n\
         <p><button type=\"submit\">Generate</button></p>\n\
         </form>\n",
        prompt = escape_html(view.prompt),
    );

    for notice in view.notices {
        body.push_str(&notice_html(notice));
    }

    body.push_str("<h2>History</h2>\n");
    if view.history.is_empty() {
        body.push_str("<p class=\"caption\">Nothing generated yet.</p>\n");
    } else {
        body.push_str(
            "<form method=\"post\" action=\"/history/clear\">\
             <button type=\"submit\">Clear history</button></form>\n",
        );
        for record in view.history {
            body.push_str(&record_html(record));
        }
    }
    document(&body)
}
