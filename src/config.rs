use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FitbitConfig {
    pub api_base_url: String,
    pub token_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub fitbit: FitbitConfig,
    /// Skip every Fitbit call and persist locally with null remote ids.
    pub dry_run: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "mealmind".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "mealmind-users".into()),
        };
        let fitbit = FitbitConfig {
            api_base_url: std::env::var("FITBIT_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.fitbit.com".into()),
            token_url: std::env::var("FITBIT_TOKEN_URL")
                .unwrap_or_else(|_| "https://api.fitbit.com/oauth2/token".into()),
            timeout_secs: std::env::var("FITBIT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(15),
        };
        let dry_run = std::env::var("FITBIT_DRY_RUN")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);
        Ok(Self {
            database_url,
            jwt,
            fitbit,
            dry_run,
        })
    }
}

fn parse_flag(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
