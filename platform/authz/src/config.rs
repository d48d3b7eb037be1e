use thiserror::Error;

const DEFAULT_MAX_NAME_LEN: usize = 64;
const DEFAULT_MAX_TEXT_LEN: usize = 2048;

#[derive(Debug, Error)]
#[error("invalid value for {key}: {value}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

/// Input limits for the access engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthzConfig {
    /// Longest accepted resource, action or subject identifier.
    pub max_name_len: usize,
    /// Longest accepted comment or attachment reference.
    pub max_text_len: usize,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            max_name_len: DEFAULT_MAX_NAME_LEN,
            max_text_len: DEFAULT_MAX_TEXT_LEN,
        }
    }
}

impl AuthzConfig {
    /// Reads `AUTHZ_MAX_NAME_LEN` and `AUTHZ_MAX_TEXT_LEN`, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            max_name_len: read_limit("AUTHZ_MAX_NAME_LEN", DEFAULT_MAX_NAME_LEN)?,
            max_text_len: read_limit("AUTHZ_MAX_TEXT_LEN", DEFAULT_MAX_TEXT_LEN)?,
        })
    }
}

fn read_limit(key: &'static str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => parse_limit(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_limit(key: &'static str, raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError {
            key,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_must_be_positive_integers() {
        assert_eq!(parse_limit("AUTHZ_MAX_NAME_LEN", " 32 ").unwrap(), 32);
        assert!(parse_limit("AUTHZ_MAX_NAME_LEN", "0").is_err());
        assert!(parse_limit("AUTHZ_MAX_NAME_LEN", "lots").is_err());
    }
}
