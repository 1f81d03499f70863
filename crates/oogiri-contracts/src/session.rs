use uuid::Uuid;

/// Fresh browser session token: 32 lowercase hex characters.
pub fn mint_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Keeps only alphanumerics, `-` and `_`, so the id is safe as a file stem.
pub fn sanitize_session_id(raw: &str) -> String {
    raw.chars()
        .filter(|ch| ch.is_alphanumeric() || matches!(ch, '-' | '_'))
        .collect()
}
