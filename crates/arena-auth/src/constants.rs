//! Defaults shared by the library and the CLI

use std::time::Duration;

/// Access tokens expiring within this window are refreshed before use.
pub const EXPIRY_WINDOW: Duration = Duration::from_secs(300);

/// How long a stored access token stays readable (one day).
pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// How long a stored refresh token stays readable (seven days).
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Refresh endpoint path, relative to the API base URL.
pub const DEFAULT_REFRESH_PATH: &str = "/api/auth/token/refresh/";

/// Password login endpoint path, relative to the API base URL.
pub const DEFAULT_LOGIN_PATH: &str = "/api/auth/login/";
