use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use slides_generator::gemini::{DEFAULT_API_URL, DEFAULT_MODEL, DEFAULT_REQUEST_TIMEOUT};
use slides_generator::generator::DEFAULT_MAX_INPUT_TOKENS;
use slides_generator::marp::DEFAULT_COMMAND;
use slides_pipeline::processor::{DEFAULT_GENERATION_TIMEOUT, DEFAULT_MAX_CONCURRENT_JOBS};
use slides_pipeline::ProcessorConfig;

/// Where job and result records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres { database_url: String },
}

/// How admitted jobs are executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchMode {
    /// Generation runs inside this process.
    Local,
    /// Generation is handed to a worker process at `worker_url`.
    Remote { worker_url: String },
}

/// Where uploads are staged for hand-off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobBackend {
    Memory,
    Local { root: PathBuf },
    S3 {
        bucket: String,
        endpoint: Option<String>,
    },
}

/// Model and renderer settings.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub max_input_tokens: u64,
    pub max_output_tokens: u32,
    /// Bound on one model HTTP call, in seconds (default: `120`).
    pub request_timeout_secs: u64,
    pub marp_command: String,
    pub themes_dir: PathBuf,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
    /// Timeout for producing a response, in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on a request body (default: 10 MB).
    pub max_upload_bytes: usize,
    pub max_concurrent_jobs: usize,
    /// Bound on one job's generation step, in seconds (default: `300`).
    pub generation_timeout_secs: u64,
    /// Bound on one hand-off call to the worker, in seconds (default: `10`).
    pub handoff_timeout_secs: u64,
    pub job_ttl_secs: i64,
    pub result_ttl_secs: i64,
    pub heartbeat_secs: u64,
    pub subscriber_buffer: usize,
    pub store_poll_ms: u64,
    pub sweep_interval_secs: u64,
    /// Grace period for in-flight jobs at shutdown, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub store: StoreBackend,
    pub dispatch: DispatchMode,
    pub blobs: BlobBackend,
    pub generator: GeneratorConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                                    |
    /// |---------------------------|--------------------------------------------|
    /// | `HOST`                    | `0.0.0.0`                                  |
    /// | `PORT`                    | `8080`                                     |
    /// | `CORS_ORIGINS`            | `FRONTEND_URL` or `http://localhost:3000`  |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                                       |
    /// | `MAX_UPLOAD_BYTES`        | `10485760`                                 |
    /// | `MAX_CONCURRENT_JOBS`     | `4`                                        |
    /// | `GENERATION_TIMEOUT_SECS` | `300`                                      |
    /// | `HANDOFF_TIMEOUT_SECS`    | `10`                                       |
    /// | `JOB_TTL_SECS`            | `300`                                      |
    /// | `RESULT_TTL_SECS`         | `3600`                                     |
    /// | `HEARTBEAT_SECS`          | `30`                                       |
    /// | `SUBSCRIBER_BUFFER`       | `16`                                       |
    /// | `STORE_POLL_MS`           | `500`                                      |
    /// | `SWEEP_INTERVAL_SECS`     | `60`                                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`   | `30`                                       |
    /// | `STORE_BACKEND`           | `memory` (`postgres` needs `DATABASE_URL`) |
    /// | `DISPATCH_MODE`           | `local` (`remote` needs `WORKER_URL`)      |
    /// | `BLOB_BACKEND`            | `local` (`BLOB_DIR`, default `uploads`)    |
    ///
    /// Panics on malformed values so misconfiguration fails at start-up.
    pub fn from_env() -> Self {
        let host = env_or("HOST", "0.0.0.0");
        let port: u16 = parse_env("PORT", 8080);

        let default_origin = env_or("FRONTEND_URL", "http://localhost:3000");
        let cors_origins: Vec<String> = env_or("CORS_ORIGINS", &default_origin)
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let store = match env_or("STORE_BACKEND", "memory").as_str() {
            "memory" => StoreBackend::Memory,
            "postgres" => StoreBackend::Postgres {
                database_url: std::env::var("DATABASE_URL")
                    .expect("DATABASE_URL must be set when STORE_BACKEND=postgres"),
            },
            other => panic!("STORE_BACKEND must be 'memory' or 'postgres', got '{other}'"),
        };

        let dispatch = match env_or("DISPATCH_MODE", "local").as_str() {
            "local" => DispatchMode::Local,
            "remote" => DispatchMode::Remote {
                worker_url: std::env::var("WORKER_URL")
                    .expect("WORKER_URL must be set when DISPATCH_MODE=remote"),
            },
            other => panic!("DISPATCH_MODE must be 'local' or 'remote', got '{other}'"),
        };

        let blobs = match env_or("BLOB_BACKEND", "local").as_str() {
            "memory" => BlobBackend::Memory,
            "local" => BlobBackend::Local {
                root: env_or("BLOB_DIR", "uploads").into(),
            },
            "s3" => BlobBackend::S3 {
                bucket: std::env::var("S3_BUCKET")
                    .expect("S3_BUCKET must be set when BLOB_BACKEND=s3"),
                endpoint: std::env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty()),
            },
            other => panic!("BLOB_BACKEND must be 'memory', 'local' or 's3', got '{other}'"),
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", 30),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 10 * 1024 * 1024),
            max_concurrent_jobs: parse_env("MAX_CONCURRENT_JOBS", DEFAULT_MAX_CONCURRENT_JOBS),
            generation_timeout_secs: parse_env(
                "GENERATION_TIMEOUT_SECS",
                DEFAULT_GENERATION_TIMEOUT.as_secs(),
            ),
            handoff_timeout_secs: parse_env("HANDOFF_TIMEOUT_SECS", 10),
            job_ttl_secs: parse_env("JOB_TTL_SECS", 300),
            result_ttl_secs: parse_env("RESULT_TTL_SECS", 3600),
            heartbeat_secs: parse_env("HEARTBEAT_SECS", 30),
            subscriber_buffer: parse_env("SUBSCRIBER_BUFFER", 16),
            store_poll_ms: parse_env("STORE_POLL_MS", 500),
            sweep_interval_secs: parse_env("SWEEP_INTERVAL_SECS", 60),
            shutdown_timeout_secs: parse_env("SHUTDOWN_TIMEOUT_SECS", 30),
            store,
            dispatch,
            blobs,
            generator: GeneratorConfig::from_env(),
        }
    }

    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            max_concurrent_jobs: self.max_concurrent_jobs,
            generation_timeout: Duration::from_secs(self.generation_timeout_secs),
            job_ttl: chrono::Duration::seconds(self.job_ttl_secs),
            result_ttl: chrono::Duration::seconds(self.result_ttl_secs),
        }
    }

    pub fn handoff_timeout(&self) -> Duration {
        Duration::from_secs(self.handoff_timeout_secs)
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn store_poll_interval(&self) -> Duration {
        Duration::from_millis(self.store_poll_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl GeneratorConfig {
    /// | Env Var              | Default                    |
    /// |----------------------|----------------------------|
    /// | `GEMINI_API_URL`     | Generative Language v1beta |
    /// | `GEMINI_API_KEY`     | empty                      |
    /// | `GEMINI_MODEL`       | `gemini-1.5-flash`         |
    /// | `MAX_INPUT_TOKENS`   | `16384`                    |
    /// | `MAX_OUTPUT_TOKENS`  | `4096`                     |
    /// | `MODEL_TIMEOUT_SECS` | `120`                      |
    /// | `MARP_COMMAND`       | `npx @marp-team/marp-cli`  |
    /// | `MARP_THEMES_DIR`    | `themes`                   |
    pub fn from_env() -> Self {
        let api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();
        if api_key.is_empty() {
            tracing::warn!("GEMINI_API_KEY not set, generation requests will be rejected upstream");
        }
        Self {
            api_url: env_or("GEMINI_API_URL", DEFAULT_API_URL),
            api_key,
            model: env_or("GEMINI_MODEL", DEFAULT_MODEL),
            max_input_tokens: parse_env("MAX_INPUT_TOKENS", DEFAULT_MAX_INPUT_TOKENS),
            max_output_tokens: parse_env("MAX_OUTPUT_TOKENS", 4096),
            request_timeout_secs: parse_env("MODEL_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT.as_secs()),
            marp_command: env_or("MARP_COMMAND", DEFAULT_COMMAND),
            themes_dir: env_or("MARP_THEMES_DIR", "themes").into(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{name} must be a valid {}: {e}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}
