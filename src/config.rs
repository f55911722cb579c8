//! Configuration handling for the application.

use clap::Parser;

/// File tree mirror and Google Drive gateway for the CTS backend.
#[derive(Parser, Debug, Clone)]
#[command(name = "cts-drive")]
#[command(about = "File tree mirror, share links and Google Drive gateway")]
pub struct Config {
    /// Google OAuth2 client ID
    #[arg(long, env = "GOOGLE_OAUTH2_CLIENT_ID")]
    pub google_client_id: String,

    /// Google OAuth2 client secret
    #[arg(long, env = "GOOGLE_OAUTH2_CLIENT_SECRET")]
    pub google_client_secret: String,

    /// Redirect URI registered for the OAuth callback
    #[arg(
        long,
        env = "GOOGLE_OAUTH2_REDIRECT_URI",
        default_value = "http://127.0.0.1:8000/users/google/callback"
    )]
    pub google_redirect_uri: String,

    /// Comma separated OAuth scopes requested when linking a drive
    #[arg(
        long,
        env = "GOOGLE_OAUTH2_SCOPES",
        default_value = "https://www.googleapis.com/auth/drive",
        value_delimiter = ','
    )]
    pub google_scopes: Vec<String>,

    /// Name of the per-user root folder created on the linked drive
    #[arg(long, env = "DRIVE_ROOT_FOLDER_NAME", default_value = "CTS")]
    pub drive_root_folder_name: String,

    /// Secret used to sign bearer tokens and OAuth state
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: String,

    /// Lifetime of issued access tokens, in minutes
    #[arg(long, env = "ACCESS_TOKEN_TTL_MINUTES", default_value_t = 60)]
    pub access_token_ttl_minutes: i64,

    /// Frontend base URL (OAuth redirect target and allowed CORS origin)
    #[arg(long, env = "FRONTEND_URL", default_value = "http://localhost:5173")]
    pub frontend_url: String,

    /// Server listen address (host or IP)
    #[arg(long, env = "LISTEN_ADDR", default_value = "127.0.0.1")]
    pub listen_addr: String,

    /// Server listen port
    #[arg(long, env = "LISTEN_PORT", default_value_t = 8000)]
    pub listen_port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Path to the SQLite database file
    #[arg(long, env = "DB_PATH", default_value = "cts-drive.db")]
    pub db_path: String,
}

impl Config {
    /// Socket address string for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }

    /// SQLite connection URL, creating the file if missing.
    pub fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.db_path)
    }
}
