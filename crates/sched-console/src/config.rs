use clap::Parser;
use sched_client::Overrides;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "sched-console", about = "Terminal dashboard for the task scheduler")]
pub struct Args {
    /// Scheduler base url, e.g. http://0.0.0.0:8889
    #[arg(long, env = "SCHED_BASE_URL")]
    pub base_url: Option<String>,
    #[arg(long, env = "SCHED_USER")]
    pub user: Option<String>,
    #[arg(long, env = "SCHED_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    #[arg(long, env = "SCHED_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,
    /// Retries for transport failures and 5xx responses (0 disables)
    #[arg(long, env = "SCHED_RETRIES")]
    pub retries: Option<u32>,
    /// Auto-refresh period of the run log
    #[arg(long, env = "SCHED_REFRESH_SECS")]
    pub refresh_secs: Option<u64>,
    #[arg(long, env = "SCHED_PAGE_SIZE")]
    pub page_size: Option<u64>,
    #[arg(long, env = "SCHED_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
    #[arg(long, env = "SCHED_CONFIG")]
    pub config: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

impl Args {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            base_url: self.base_url.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
            timeout_secs: self.timeout_secs,
            retries: self.retries,
            refresh_secs: self.refresh_secs,
            page_size: self.page_size,
            log_dir: self.log_dir.clone(),
            debug: self.debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_to_overrides() {
        let args = Args::try_parse_from([
            "sched-console",
            "--base-url",
            "http://127.0.0.1:9000",
            "--refresh-secs",
            "15",
            "--debug",
        ])
        .expect("args");
        let overrides = args.overrides();
        assert_eq!(overrides.base_url.as_deref(), Some("http://127.0.0.1:9000"));
        assert_eq!(overrides.refresh_secs, Some(15));
        assert!(overrides.debug);
        assert_eq!(overrides.retries, None);
    }
}
