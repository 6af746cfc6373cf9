//! CLI arguments and server configuration defaults.

use clap::{ArgAction, Parser};
use shadow_rs::formatcp;

use crate::build;

const VERSION_INFO: &str = formatcp!(
    r#"{}\ncommit_hash: {}\nbuild_time: {}\nbuild_env: {},{}"#,
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION,
    build::RUST_CHANNEL
);

pub const DEFAULT_HTTP_PORT: u16 = 5000;
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_PROFILES_FILE: &str = "data/profiles.json";
pub const DEFAULT_USER: &str = "Anonymous";
pub const UPLOADS_ROUTE: &str = "/uploads";
pub const DEFAULT_STORY_TTL_SECS: u64 = 12 * 60 * 60;
pub const DEFAULT_UPLOAD_MAX_SIZE: usize = 100 * 1024 * 1024;
pub const DEFAULT_TEMP_TTL_SECS: u64 = 60 * 60;
pub const TEMP_CLEAN_INTERVAL_SECS: u64 = 900;

/// CLI arguments and environment configuration for the server.
#[derive(Parser, Debug)]
#[command(name = "media-drop", version = VERSION_INFO, about = "Media Drop server")]
pub struct Args {
    #[arg(
        short = 'u',
        long,
        env = "MEDIA_DROP_UPLOAD_DIR",
        default_value = DEFAULT_UPLOAD_DIR,
        help = "Directory for uploaded files"
    )]
    pub upload_dir: String,
    #[arg(
        short = 'd',
        long,
        env = "MEDIA_DROP_PROFILES_FILE",
        default_value = DEFAULT_PROFILES_FILE,
        help = "JSON file holding the profile set"
    )]
    pub profiles_file: String,
    #[arg(
        short = 'b',
        long,
        env = "MEDIA_DROP_BIND",
        default_value = "0.0.0.0",
        help = "Bind address for HTTP/HTTPS"
    )]
    pub host: String,
    #[arg(
        short = 'p',
        long,
        env = "MEDIA_DROP_HTTP_PORT",
        default_value_t = DEFAULT_HTTP_PORT,
        help = "HTTP port"
    )]
    pub http_port: u16,
    #[arg(
        short = 'P',
        long,
        env = "MEDIA_DROP_HTTPS_PORT",
        help = "HTTPS port (HTTPS is off when unset)"
    )]
    pub https_port: Option<u16>,
    #[arg(short = 'c', long, env = "MEDIA_DROP_TLS_CERT", help = "TLS cert path")]
    pub tls_cert: Option<String>,
    #[arg(short = 'k', long, env = "MEDIA_DROP_TLS_KEY", help = "TLS key path")]
    pub tls_key: Option<String>,
    #[arg(
        long,
        env = "MEDIA_DROP_PUBLIC_URL",
        help = "Base URL used in returned file links (default http://localhost:<http_port>)"
    )]
    pub public_url: Option<String>,
    #[arg(
        long,
        env = "MEDIA_DROP_CORS_ORIGINS",
        default_value = "*",
        help = "Comma separated CORS origins, * for any"
    )]
    pub cors_origins: String,
    #[arg(
        long,
        env = "MEDIA_DROP_MEDIA_FILTER",
        default_value_t = true,
        action = ArgAction::Set,
        help = "Only accept image/* and video/* uploads"
    )]
    pub media_filter: bool,
    #[arg(
        long,
        env = "MEDIA_DROP_STORY_TTL_SECS",
        default_value_t = DEFAULT_STORY_TTL_SECS,
        help = "Story lifetime in seconds"
    )]
    pub story_ttl_secs: u64,
    #[arg(
        long,
        env = "MEDIA_DROP_UPLOAD_MAX_SIZE",
        default_value_t = DEFAULT_UPLOAD_MAX_SIZE,
        help = "Max request body size in bytes"
    )]
    pub upload_max_size: usize,
    #[arg(
        long,
        env = "MEDIA_DROP_TEMP_TTL_SECS",
        default_value_t = DEFAULT_TEMP_TTL_SECS,
        help = "Abandoned temp file cleanup threshold in seconds (0 to disable)"
    )]
    pub temp_ttl_secs: u64,
}

impl Args {
    /// Base URL prefixed to every stored file link, without trailing slash.
    pub fn public_base_url(&self) -> String {
        match self.public_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => format!("http://localhost:{}", self.http_port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Args;
    use clap::Parser;

    #[test]
    fn defaults_match_legacy_server() {
        let args = Args::try_parse_from(["media-drop"]).expect("parse defaults");
        assert_eq!(args.http_port, 5000);
        assert!(args.media_filter);
        assert_eq!(args.story_ttl_secs, 12 * 60 * 60);
        assert_eq!(args.public_base_url(), "http://localhost:5000");
    }

    #[test]
    fn public_url_trims_trailing_slash() {
        let args = Args::try_parse_from([
            "media-drop",
            "--public-url",
            "https://media.example.com/",
            "--media-filter",
            "false",
        ])
        .expect("parse args");
        assert_eq!(args.public_base_url(), "https://media.example.com");
        assert!(!args.media_filter);
    }
}
