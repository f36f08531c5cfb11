//! Process-level configuration (A3): a handful of environment-variable
//! knobs with defaults, loaded once at process start. `.env` is optional —
//! its absence is never an error.

use std::time::Duration;

use uuid::Uuid;

const DEFAULT_ACTIVE_RUN_TTL_SECONDS: u64 = 300;
const DEFAULT_AUTO_CONTINUE_CAP: u32 = 4;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Clone, Debug)]
pub struct Settings {
    pub instance_id: String,
    pub active_run_ttl: Duration,
    pub auto_continue_cap: u32,
    pub webhook_base_url: Option<String>,
    pub bind_addr: String,
}

impl Settings {
    /// Reads `.env` (if present) then the process environment. Call once,
    /// at process start; library code never re-reads the environment.
    pub fn load() -> Self {
        dotenv::dotenv().ok();

        let instance_id = std::env::var("RUNLOOM_INSTANCE_ID").unwrap_or_else(|_| Uuid::new_v4().to_string());
        let active_run_ttl_seconds = std::env::var("RUNLOOM_ACTIVE_RUN_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_ACTIVE_RUN_TTL_SECONDS);
        let auto_continue_cap = std::env::var("RUNLOOM_AUTO_CONTINUE_CAP")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_AUTO_CONTINUE_CAP);
        let webhook_base_url = std::env::var("RUNLOOM_WEBHOOK_BASE_URL").ok();
        let bind_addr = std::env::var("RUNLOOM_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        Self {
            instance_id,
            active_run_ttl: Duration::from_secs(active_run_ttl_seconds),
            auto_continue_cap,
            webhook_base_url,
            bind_addr,
        }
    }
}
