pub mod cookies;
pub mod history;
pub mod session;
