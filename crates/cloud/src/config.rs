/// Connection settings for the S3-compatible bucket.
#[derive(Clone, Default)]
pub struct R2Config {
    pub endpoint_url: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub bucket: String,
    /// Prepended to every object key (default: `lipsync/`).
    pub prefix: String,
}

impl R2Config {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var           | Default    |
    /// |-------------------|------------|
    /// | `R2_ENDPOINT_URL` | unset      |
    /// | `R2_ACCESS_KEY`   | unset      |
    /// | `R2_SECRET_KEY`   | unset      |
    /// | `R2_BUCKET`       | `lipsync`  |
    /// | `R2_PREFIX`       | `lipsync/` |
    pub fn from_env() -> Self {
        let non_empty = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            endpoint_url: non_empty("R2_ENDPOINT_URL"),
            access_key: non_empty("R2_ACCESS_KEY"),
            secret_key: non_empty("R2_SECRET_KEY"),
            bucket: non_empty("R2_BUCKET").unwrap_or_else(|| "lipsync".into()),
            prefix: non_empty("R2_PREFIX").unwrap_or_else(|| "lipsync/".into()),
        }
    }

    /// Endpoint and both credentials are present.
    pub fn is_configured(&self) -> bool {
        self.endpoint_url.is_some() && self.access_key.is_some() && self.secret_key.is_some()
    }
}

impl std::fmt::Debug for R2Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("R2Config")
            .field("endpoint_url", &self.endpoint_url)
            .field("access_key", &self.access_key.as_ref().map(|_| "<set>"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<set>"))
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .finish()
    }
}
