pub mod auth;
pub mod config;
pub mod gemini;
pub mod generate;
pub mod prompt;
pub mod session;

pub use auth::{AuthError, AuthGate, AuthState, Credentials};
pub use config::{SecretResolver, SecretStore};
pub use gemini::{BackendError, GeminiClient, GenerateContentResponse, ImageBackend};
pub use generate::{generate, GenerateError, GenerationRequest};
pub use session::SessionContext;
