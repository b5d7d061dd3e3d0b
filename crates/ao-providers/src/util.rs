use ao_domain::error::Error;

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Provider`].
pub(crate) fn from_reqwest(provider: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Provider {
            provider: provider.to_string(),
            message: e.to_string(),
        }
    }
}

/// Resolve the API key from the environment variable named in config.
/// The key's value never appears in logs or error messages verbatim.
pub fn resolve_api_key(env_var: &str) -> Result<String, Error> {
    std::env::var(env_var).map_err(|_| {
        Error::Config(format!(
            "environment variable '{env_var}' not set or not valid UTF-8"
        ))
    })
}
