use crate::config::types::{ClientConfig, DiagnosticsConfig, MailConfig};
use crate::ConfigError;
use url::Url;

/// Proxy schemes reqwest can route through
const PROXY_SCHEMES: &[&str] = &["http", "https", "socks5", "socks5h"];

/// Validates the entire configuration
pub fn validate(config: &ClientConfig) -> Result<(), ConfigError> {
    validate_retry_settings(config)?;
    validate_timeouts(config)?;
    validate_user_agent(&config.user_agent)?;
    if let Some(proxy) = &config.proxy {
        validate_proxy(proxy)?;
    }
    validate_diagnostics(&config.diagnostics)?;
    if let Some(mail) = &config.mail {
        validate_mail(mail)?;
    }
    Ok(())
}

/// Validates attempt budget
fn validate_retry_settings(config: &ClientConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    Ok(())
}

fn validate_timeouts(config: &ClientConfig) -> Result<(), ConfigError> {
    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "connect_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_user_agent(user_agent: &str) -> Result<(), ConfigError> {
    if user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    // Must be representable as a header value
    if user_agent.chars().any(|c| c.is_control()) {
        return Err(ConfigError::Validation(format!(
            "user_agent contains control characters: '{}'",
            user_agent.escape_debug()
        )));
    }

    Ok(())
}

/// Validates a proxy URL
fn validate_proxy(proxy: &str) -> Result<(), ConfigError> {
    let url = Url::parse(proxy)
        .map_err(|e| ConfigError::InvalidProxy(format!("'{}': {}", proxy, e)))?;

    if !PROXY_SCHEMES.contains(&url.scheme()) {
        return Err(ConfigError::InvalidProxy(format!(
            "'{}': unsupported scheme '{}'",
            proxy,
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidProxy(format!("'{}': missing host", proxy)));
    }

    Ok(())
}

fn validate_diagnostics(config: &DiagnosticsConfig) -> Result<(), ConfigError> {
    if config.enabled && config.dump_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "dump_dir cannot be empty when diagnostics are enabled".to_string(),
        ));
    }

    Ok(())
}

fn validate_mail(config: &MailConfig) -> Result<(), ConfigError> {
    if config.host.trim().is_empty() {
        return Err(ConfigError::Validation("mail host cannot be empty".to_string()));
    }

    if config.port == 0 {
        return Err(ConfigError::Validation("mail port must be >= 1".to_string()));
    }

    if config.username.is_some() != config.password.is_some() {
        return Err(ConfigError::Validation(
            "mail username and password must be set together".to_string(),
        ));
    }

    Ok(())
}
