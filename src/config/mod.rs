use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub otp: OtpConfig,
    pub approvers: ApproverConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Absolute session lifetime; expiry = login time + this many hours.
    pub lifetime_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpConfig {
    /// Digit width of the one-time code. The reference deployment uses 4;
    /// widen via OTP_DIGITS for stronger codes.
    pub digits: u32,
    /// Pending registrations older than this are treated as absent at
    /// verification time and dropped.
    pub pending_ttl_minutes: i64,
}

/// Which roles receive approval OTPs. Business roles are always global;
/// IT roles may be restricted to the registrant's branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproverConfig {
    pub business_roles: Vec<String>,
    pub it_roles: Vec<String>,
    pub it_branch_restricted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Environment defaults first, then specific env var overrides
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout_secs =
                v.parse().unwrap_or(self.database.connection_timeout_secs);
        }

        // Session overrides
        if let Ok(v) = env::var("SESSION_LIFETIME_HOURS") {
            self.session.lifetime_hours = v.parse().unwrap_or(self.session.lifetime_hours);
        }

        // OTP overrides
        if let Ok(v) = env::var("OTP_DIGITS") {
            self.otp.digits = v.parse().unwrap_or(self.otp.digits);
        }
        if let Ok(v) = env::var("OTP_PENDING_TTL_MINUTES") {
            self.otp.pending_ttl_minutes = v.parse().unwrap_or(self.otp.pending_ttl_minutes);
        }

        // Approver role set overrides (comma separated role lists)
        if let Ok(v) = env::var("APPROVER_BUSINESS_ROLES") {
            self.approvers.business_roles = split_roles(&v);
        }
        if let Ok(v) = env::var("APPROVER_IT_ROLES") {
            self.approvers.it_roles = split_roles(&v);
        }
        if let Ok(v) = env::var("APPROVER_IT_BRANCH_RESTRICTED") {
            self.approvers.it_branch_restricted =
                v.parse().unwrap_or(self.approvers.it_branch_restricted);
        }

        // Mail overrides
        if let Ok(v) = env::var("SMTP_HOST") {
            self.mail.smtp_host = v;
        }
        if let Ok(v) = env::var("SMTP_PORT") {
            self.mail.smtp_port = v.parse().unwrap_or(self.mail.smtp_port);
        }
        if let Ok(v) = env::var("SMTP_USERNAME") {
            self.mail.username = v;
        }
        if let Ok(v) = env::var("SMTP_PASSWORD") {
            self.mail.password = v;
        }
        if let Ok(v) = env::var("SMTP_FROM") {
            self.mail.from_address = v;
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                max_connections: 10,
                connection_timeout_secs: 30,
            },
            session: SessionConfig { lifetime_hours: 5 },
            otp: OtpConfig {
                digits: 4,
                pending_ttl_minutes: 15,
            },
            approvers: ApproverConfig {
                business_roles: roles(&["MD", "JMD", "GM", "AGM"]),
                it_roles: roles(&["IT HEAD"]),
                it_branch_restricted: true,
            },
            mail: MailConfig {
                smtp_host: "smtp.gmail.com".to_string(),
                smtp_port: 587,
                username: String::new(),
                password: String::new(),
                from_address: String::new(),
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig {
                max_connections: 20,
                connection_timeout_secs: 10,
            },
            otp: OtpConfig {
                digits: 6,
                pending_ttl_minutes: 15,
            },
            ..Self::development()
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig {
                max_connections: 50,
                connection_timeout_secs: 5,
            },
            otp: OtpConfig {
                digits: 6,
                pending_ttl_minutes: 10,
            },
            ..Self::development()
        }
    }
}

fn roles(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn split_roles(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
