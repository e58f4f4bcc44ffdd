use chrono::Duration;

/// Typed view of the process environment.
///
/// Only `from_env` reads variables; everything downstream takes the struct.
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    /// 32-byte base64 key for the credential vault
    pub encryption_key: String,
    pub google: Option<GoogleConfig>,
    /// How old a calendar's last sync may be before the background tick
    /// refreshes it, and before covered windows count as stale
    pub stale_after: Duration,
    /// Sleep between background tick runs
    pub background_tick: Duration,
    /// Sleep between worker claim attempts
    pub job_poll: Duration,
    /// Jobs one background tick may enqueue
    pub max_jobs_per_tick: usize,
    /// Consecutive failures that quarantine a calendar
    pub sync_failure_threshold: i32,
    /// Running jobs older than this are returned to pending
    pub job_lease: Duration,
}

#[derive(Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let google = match (
            std::env::var("GOOGLE_CLIENT_ID"),
            std::env::var("GOOGLE_CLIENT_SECRET"),
            std::env::var("GOOGLE_REDIRECT_URL"),
        ) {
            (Ok(client_id), Ok(client_secret), Ok(redirect_url)) => Some(GoogleConfig {
                client_id,
                client_secret,
                redirect_url,
            }),
            _ => None,
        };

        Self {
            database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            port: env_parse("PORT", 8080),
            jwt_secret: std::env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            encryption_key: std::env::var("TIMESHEET_ENCRYPTION_KEY")
                .expect("TIMESHEET_ENCRYPTION_KEY must be set"),
            google,
            stale_after: Duration::hours(env_parse("SYNC_STALE_HOURS", 24)),
            background_tick: Duration::hours(env_parse("BACKGROUND_TICK_HOURS", 24)),
            job_poll: Duration::seconds(env_parse("JOB_POLL_SECONDS", 5)),
            max_jobs_per_tick: env_parse("MAX_JOBS_PER_TICK", 10),
            sync_failure_threshold: env_parse("SYNC_FAILURE_THRESHOLD", 3),
            job_lease: Duration::minutes(env_parse("JOB_LEASE_MINUTES", 10)),
        }
    }
}

fn env_parse<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
