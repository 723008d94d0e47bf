use serde::Deserialize;

const DEFAULT_PORT: &str = "3001";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_VERTEX_BASE_URL: &str = "https://aiplatform.googleapis.com";
const DEFAULT_SHEETS_BASE_URL: &str = "https://sheets.googleapis.com";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub google_service_account_json: String,
    pub spreadsheet_id: String,
    pub vertex_api_key: String,
    pub gemini_model: String,
    pub vertex_base_url: String,
    pub sheets_base_url: String,
    pub system_instruction_path: Option<String>,
    pub rate_limit_max: u32,
    pub rate_limit_window_secs: u64,
    pub body_limit_bytes: usize,
    pub verify_sheet_header: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// Every required value is resolved here; a partially configured service
    /// never starts.
    pub fn from_vars<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            port: var("PORT")
                .unwrap_or_else(|| DEFAULT_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            allowed_origins: parse_origins(&var("ALLOWED_ORIGINS").unwrap_or_default()),
            google_service_account_json: required(&var, "GOOGLE_SERVICE_ACCOUNT_JSON")?,
            spreadsheet_id: required(&var, "GOOGLE_SHEETS_SPREADSHEET_ID")?,
            vertex_api_key: required(&var, "VERTEX_API_KEY")?,
            gemini_model: var("GEMINI_MODEL")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            vertex_base_url: base_url(&var, "VERTEX_BASE_URL", DEFAULT_VERTEX_BASE_URL)?,
            sheets_base_url: base_url(&var, "SHEETS_BASE_URL", DEFAULT_SHEETS_BASE_URL)?,
            system_instruction_path: var("SYSTEM_INSTRUCTION_PATH")
                .filter(|s| !s.trim().is_empty()),
            rate_limit_max: var("RATE_LIMIT_MAX")
                .unwrap_or_else(|| "100".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RATE_LIMIT_MAX must be a positive number"))
                .and_then(|max: u32| {
                    if max == 0 {
                        anyhow::bail!("RATE_LIMIT_MAX must be greater than zero");
                    }
                    Ok(max)
                })?,
            rate_limit_window_secs: var("RATE_LIMIT_WINDOW_SECS")
                .unwrap_or_else(|| "900".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("RATE_LIMIT_WINDOW_SECS must be a positive number"))
                .and_then(|secs: u64| {
                    if secs == 0 {
                        anyhow::bail!("RATE_LIMIT_WINDOW_SECS must be greater than zero");
                    }
                    Ok(secs)
                })?,
            body_limit_bytes: var("BODY_LIMIT_BYTES")
                .unwrap_or_else(|| "10240".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("BODY_LIMIT_BYTES must be a positive number"))?,
            verify_sheet_header: var("VERIFY_SHEET_HEADER")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Allowed origins: {:?}", config.allowed_origins);
        tracing::debug!("Gemini model: {}", config.gemini_model);
        tracing::debug!("Vertex Base URL: {}", config.vertex_base_url);
        tracing::debug!("Sheets Base URL: {}", config.sheets_base_url);
        tracing::debug!(
            "Rate limit: {} requests / {}s",
            config.rate_limit_max,
            config.rate_limit_window_secs
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

fn required<F>(var: &F, key: &str) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let value =
        var(key).ok_or_else(|| anyhow::anyhow!("{} environment variable required", key))?;
    if value.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", key);
    }
    Ok(value)
}

fn base_url<F>(var: &F, key: &str, default: &str) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let url = var(key)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| default.to_string());
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", key);
    }
    url::Url::parse(&url).map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", key, e))?;
    Ok(url.trim_end_matches('/').to_string())
}

/// Splits a comma-separated origin list, dropping blanks.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().trim_end_matches('/'))
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}
