use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub max_failed_logins: i32,
    pub lockout_minutes: i64,
    pub reset_token_ttl_hours: i64,
    pub invitation_ttl_days: i64,
}

/// Outbound mail delivery. Absent entirely when MAIL_API_URL is unset,
/// in which case reset mails are logged instead of sent.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub api_url: String,
    pub api_token: String,
    pub from_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub frontend_url: String,
    pub security: SecurityConfig,
    pub mail: Option<MailConfig>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let frontend_url =
            std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".into());
        let security = SecurityConfig {
            max_failed_logins: env_parse("MAX_FAILED_LOGINS", 5),
            lockout_minutes: env_parse("LOCKOUT_MINUTES", 15),
            reset_token_ttl_hours: env_parse("RESET_TOKEN_TTL_HOURS", 24),
            invitation_ttl_days: env_parse("INVITATION_TTL_DAYS", 7),
        };
        let mail = std::env::var("MAIL_API_URL").ok().map(|api_url| MailConfig {
            api_url,
            api_token: std::env::var("MAIL_API_TOKEN").unwrap_or_default(),
            from_address: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| "no-reply@sernion-mark.local".into()),
        });
        Ok(Self {
            database_url,
            frontend_url,
            security,
            mail,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
