//! Configuration for the enrichment service.
//!
//! Settings come from environment variables (optionally via a `.env` file)
//! with sensible defaults, so a bare `lotenrich serve` works against a
//! local SQLite database with a direct-connection-only lane pool.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default port for forward proxies in `PROXY_IPS`.
pub const DEFAULT_PROXY_PORT: u16 = 3128;

/// Default URL used by lane connectivity probes.
pub const DEFAULT_PROBE_URL: &str = "https://httpbin.org/ip";

/// Runtime settings for the enrichment service.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,
    /// Directory where processed images are stored, under per-folder subdirs.
    pub images_dir: PathBuf,
    /// Forward proxy hosts; one proxied lane is created per entry.
    pub proxy_ips: Vec<String>,
    /// Port used for all proxies.
    pub proxy_port: u16,
    /// User agent for crawl and image traffic.
    pub user_agent: String,
    /// Per-request timeout in seconds (crawl pages and image fetches).
    pub request_timeout: u64,
    /// Max idle keep-alive connections per host, per lane.
    pub max_idle_per_host: usize,
    /// Idle connection timeout in seconds.
    pub idle_timeout: u64,
    /// TCP keepalive interval in seconds.
    pub tcp_keepalive: u64,
    /// Concurrent image downloads across all enrichment requests.
    pub concurrent_downloads: usize,
    /// Max attempts per image URL before the slot degrades to null.
    pub image_max_retries: u32,
    /// Background enrichment worker count.
    pub async_workers: usize,
    /// Background enrichment queue depth.
    pub async_queue_depth: usize,
    /// Seconds a finished background job status stays pollable.
    pub status_ttl_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("lotenrich.db"),
            images_dir: PathBuf::from("public/images"),
            proxy_ips: Vec::new(),
            proxy_port: DEFAULT_PROXY_PORT,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15"
                .to_string(),
            request_timeout: 30,
            max_idle_per_host: 10,
            idle_timeout: 30,
            tcp_keepalive: 60,
            concurrent_downloads: 20,
            image_max_retries: 5,
            async_workers: 4,
            async_queue_depth: 64,
            status_ttl_secs: 600,
        }
    }
}

impl Settings {
    /// Load settings from the environment, falling back to defaults.
    pub fn load() -> Self {
        let mut settings = Self::default();

        if let Ok(path) = env::var("DATABASE_PATH") {
            settings.database_path = PathBuf::from(path);
        }
        if let Ok(dir) = env::var("IMAGES_DIR") {
            settings.images_dir = PathBuf::from(dir);
        }
        match env::var("PROXY_IPS") {
            Ok(ips) => {
                settings.proxy_ips = ips
                    .split(',')
                    .map(|ip| ip.trim().to_string())
                    .filter(|ip| !ip.is_empty())
                    .collect();
            }
            Err(_) => {
                tracing::info!("no PROXY_IPS configured, using direct connection only");
            }
        }
        if let Some(port) = env_parse("PROXY_PORT") {
            settings.proxy_port = port;
        }
        if let Ok(ua) = env::var("USER_AGENT") {
            settings.user_agent = ua;
        }
        if let Some(secs) = env_parse("REQUEST_TIMEOUT_SECS") {
            settings.request_timeout = secs;
        }
        if let Some(n) = env_parse("MAX_IDLE_PER_HOST") {
            settings.max_idle_per_host = n;
        }
        if let Some(secs) = env_parse("IDLE_TIMEOUT_SECS") {
            settings.idle_timeout = secs;
        }
        if let Some(secs) = env_parse("TCP_KEEPALIVE_SECS") {
            settings.tcp_keepalive = secs;
        }
        if let Some(n) = env_parse("CONCURRENT_DOWNLOADS") {
            settings.concurrent_downloads = n;
        }
        if let Some(n) = env_parse("IMAGE_MAX_RETRIES") {
            settings.image_max_retries = n;
        }
        if let Some(n) = env_parse("ASYNC_WORKERS") {
            settings.async_workers = n;
        }
        if let Some(n) = env_parse("ASYNC_QUEUE_DEPTH") {
            settings.async_queue_depth = n;
        }
        if let Some(secs) = env_parse("STATUS_TTL_SECS") {
            settings.status_ttl_secs = secs;
        }

        settings
    }

    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Idle connection timeout as a [`Duration`].
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout)
    }

    /// TCP keepalive interval as a [`Duration`].
    pub fn tcp_keepalive(&self) -> Duration {
        Duration::from_secs(self.tcp_keepalive)
    }

    /// Status retention for finished background jobs as a [`Duration`].
    pub fn status_ttl(&self) -> Duration {
        Duration::from_secs(self.status_ttl_secs)
    }

    /// Total lane count: one direct lane plus one per proxy.
    pub fn lane_count(&self) -> usize {
        1 + self.proxy_ips.len()
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_direct_only() {
        let settings = Settings::default();
        assert!(settings.proxy_ips.is_empty());
        assert_eq!(settings.lane_count(), 1);
        assert_eq!(settings.proxy_port, DEFAULT_PROXY_PORT);
    }

    #[test]
    fn env_overrides_apply() {
        env::set_var("MAX_IDLE_PER_HOST", "3");
        env::set_var("ASYNC_QUEUE_DEPTH", "16");
        env::set_var("STATUS_TTL_SECS", "120");

        let settings = Settings::load();
        assert_eq!(settings.max_idle_per_host, 3);
        assert_eq!(settings.async_queue_depth, 16);
        assert_eq!(settings.status_ttl(), Duration::from_secs(120));

        env::remove_var("MAX_IDLE_PER_HOST");
        env::remove_var("ASYNC_QUEUE_DEPTH");
        env::remove_var("STATUS_TTL_SECS");
    }

    #[test]
    fn lane_count_includes_proxies() {
        let settings = Settings {
            proxy_ips: vec!["10.0.0.1".into(), "10.0.0.2".into()],
            ..Settings::default()
        };
        assert_eq!(settings.lane_count(), 3);
    }
}
