//! Application constants for DNI Fetcher
//!
//! Centralizes endpoint locations, timing defaults and datastore names,
//! organized by functional domain.

use std::time::Duration;

/// Environment variable names
pub mod env {
    /// PostgreSQL connection string
    pub const DATABASE_URL: &str = "DATABASE_URL";

    /// Optional connection pool size
    pub const DATABASE_MAX_CONNECTIONS: &str = "DATABASE_MAX_CONNECTIONS";
}

/// Lookup endpoint locations and form field names
pub mod endpoints {
    /// Host serving the full-name and verification-digit lookups
    pub const ELDNI_BASE_URL: &str = "https://eldni.com";

    /// Full-name lookup page (token GET and form POST)
    pub const FULL_NAME_PATH: &str = "/pe/buscar-datos-por-dni";

    /// Verification-digit lookup page (token GET and form POST)
    pub const VERIFICATION_DIGIT_PATH: &str = "/pe/obtener-digito-verificador-del-dni";

    /// Host serving the birth-date lookup
    pub const DNIPERU_BASE_URL: &str = "https://dniperu.com";

    /// Birth-date lookup page carrying the nonce
    pub const BIRTH_DATE_PAGE_PATH: &str = "/fecha-de-nacimiento-con-dni/";

    /// AJAX submission endpoint for the birth-date lookup
    pub const BIRTH_DATE_SUBMIT_PATH: &str = "/wp-admin/admin-ajax.php";

    /// CSRF token input on the form-based pages
    pub const FORM_TOKEN_SELECTOR: &str = "input[name='_token']";

    /// Nonce embedded in the birth-date page script
    pub const NONCE_PATTERN: &str =
        r#"fecha_vars\s*=\s*\{[^}]*nonce['"]?\s*:\s*['"]([^'"]+)['"]"#;

    /// Literal body meaning the session was refused
    pub const ACCESS_DENIED_BODY: &str = "-1";

    /// Literal body meaning no record exists
    pub const NOT_FOUND_BODY: &str = "0";

    /// Message fragment the AJAX endpoint uses when throttling
    pub const TOO_MANY_REQUESTS_MARKER: &str = "demasiadas solicitudes";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Browser user agents rotated across sessions
    pub const USER_AGENTS: &[&str] = &[
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36 Edg/119.0.0.0",
    ];

    /// Accept-Language sent with every request
    pub const ACCEPT_LANGUAGE: &str = "es-PE,es;q=0.9,en;q=0.8";

    /// Accept header for page loads
    pub const ACCEPT_HTML: &str =
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

    /// Accept header for AJAX submissions
    pub const ACCEPT_JSON: &str = "application/json, text/javascript, */*; q=0.01";

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum number of redirects to follow
    pub const MAX_REDIRECTS: usize = 5;
}

/// Global request budget
pub mod limits {
    use super::Duration;

    /// Requests admitted per rolling window
    pub const MAX_REQUESTS_PER_WINDOW: u32 = 5;

    /// Rolling window length
    pub const WINDOW: Duration = Duration::from_secs(60);

    /// Minimum delay between any two requests
    pub const MIN_INTERVAL: Duration = Duration::from_secs(12);

    /// Extra wait added when the window quota is exhausted
    pub const SAFETY_MARGIN: Duration = Duration::from_secs(1);
}

/// Session lifecycle defaults
pub mod session {
    use super::Duration;

    /// Completed lookups before a proactive rotation
    pub const ROTATE_EVERY: u32 = 3;

    /// Pause between dropping a session and opening the next
    pub const ROTATION_PAUSE: Duration = Duration::from_secs(3);

    /// Characters of a token shown in logs
    pub const TOKEN_LOG_PREFIX: usize = 8;
}

/// Retry and backoff defaults
pub mod retry {
    use super::Duration;

    /// Attempts per identifier, including the first
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Delay before the first retry of a transient failure
    pub const BASE_DELAY: Duration = Duration::from_secs(10);

    /// Growth factor between consecutive retry delays
    pub const MULTIPLIER: u32 = 2;

    /// Upper bound for generic retry delays
    pub const MAX_DELAY: Duration = Duration::from_secs(300);

    /// Fixed cooldown after a rate-limit response
    pub const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(30);

    /// Additional cooldown per attempt after a rate-limit response
    pub const RATE_LIMIT_STEP: Duration = Duration::from_secs(30);
}

/// Worker configuration constants
pub mod workers {
    use super::Duration;

    /// Default number of concurrent workers
    pub const DEFAULT_WORKER_COUNT: usize = 2;

    /// Maximum allowed workers
    pub const MAX_WORKER_COUNT: usize = 32;

    /// Base pause between lookups of one worker
    pub const PACING_INTERVAL: Duration = Duration::from_secs(5);

    /// Additional pause per worker id, staggering the pool
    pub const PACING_STAGGER: Duration = Duration::from_secs(2);

    /// Random jitter added to each pacing wait
    pub const PACING_JITTER: Duration = Duration::from_secs(1);
}

/// Coordinator defaults
pub mod coordinator {
    /// Capacity of the worker-to-collector channel
    pub const RESULT_CHANNEL_CAPACITY: usize = 256;

    /// Collector logs a running tally every this many results
    pub const TALLY_LOG_EVERY: u64 = 10;
}

/// Datastore names
pub mod db {
    /// Table holding the subjects
    pub const TABLE: &str = "personas";

    /// Identifier column
    pub const IDENTIFIER_COLUMN: &str = "dni";

    /// Default pool size
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
}

/// Configuration file locations
pub mod files {
    /// Config file looked up in the working directory
    pub const LOCAL_CONFIG_FILE: &str = "dni-fetcher.toml";

    /// Directory under the platform config dir
    pub const CONFIG_DIR_NAME: &str = "dni-fetcher";

    /// Config file name inside that directory
    pub const CONFIG_FILE_NAME: &str = "config.toml";
}

pub use http::{DEFAULT_TIMEOUT as HTTP_TIMEOUT, USER_AGENTS};
pub use limits::{MAX_REQUESTS_PER_WINDOW, WINDOW};
pub use workers::DEFAULT_WORKER_COUNT;
