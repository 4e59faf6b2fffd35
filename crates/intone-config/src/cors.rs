use std::time::Duration;

use serde::Deserialize;

/// Headers the raw-audio endpoint sets that browsers may read
const DEFAULT_EXPOSE_HEADERS: [&str; 3] = ["x-task-id", "x-emotion-mode", "x-emotion-fallback"];

/// CORS configuration
///
/// The defaults are fully permissive so the bundled browser clients can reach
/// the service from any origin.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins (wildcard "*" or explicit list)
    #[serde(default)]
    pub origins: AnyOrArray,
    /// Allowed HTTP methods (wildcard "*" or explicit list)
    #[serde(default)]
    pub methods: AnyOrArray,
    /// Allowed headers (wildcard "*" or explicit list)
    #[serde(default)]
    pub headers: AnyOrArray,
    /// Headers to expose to the browser
    #[serde(default = "default_expose_headers")]
    pub expose_headers: Vec<String>,
    /// Allow credentials, only valid with an explicit origin list
    #[serde(default)]
    pub credentials: bool,
    /// Max age for preflight cache in seconds
    #[serde(default)]
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: AnyOrArray::Any,
            methods: AnyOrArray::Any,
            headers: AnyOrArray::Any,
            expose_headers: default_expose_headers(),
            credentials: false,
            max_age: None,
        }
    }
}

/// Either a wildcard "*" or explicit list of values
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AnyOrArray {
    /// Match any value
    #[default]
    Any,
    /// Explicit list
    List(Vec<String>),
}

impl<'de> Deserialize<'de> for AnyOrArray {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de;

        struct AnyOrArrayVisitor;

        impl<'de> de::Visitor<'de> for AnyOrArrayVisitor {
            type Value = AnyOrArray;

            fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                formatter.write_str("\"*\" or array of strings")
            }

            fn visit_str<E>(self, v: &str) -> Result<AnyOrArray, E>
            where
                E: de::Error,
            {
                if v == "*" {
                    Ok(AnyOrArray::Any)
                } else {
                    Ok(AnyOrArray::List(vec![v.to_string()]))
                }
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<AnyOrArray, A::Error>
            where
                A: de::SeqAccess<'de>,
            {
                let mut values = Vec::new();
                while let Some(val) = seq.next_element::<String>()? {
                    if val == "*" {
                        return Ok(AnyOrArray::Any);
                    }
                    values.push(val);
                }
                Ok(AnyOrArray::List(values))
            }
        }

        deserializer.deserialize_any(AnyOrArrayVisitor)
    }
}

impl CorsConfig {
    /// Get max age as Duration
    pub fn max_age_duration(&self) -> Option<Duration> {
        self.max_age.map(Duration::from_secs)
    }
}

fn default_expose_headers() -> Vec<String> {
    DEFAULT_EXPOSE_HEADERS.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_is_permissive() {
        let config: CorsConfig = toml::from_str("").unwrap();
        assert_eq!(config.origins, AnyOrArray::Any);
        assert_eq!(config.methods, AnyOrArray::Any);
        assert!(config.expose_headers.iter().any(|h| h == "x-task-id"));
        assert!(!config.credentials);
    }

    #[test]
    fn wildcard_inside_list_collapses_to_any() {
        let config: CorsConfig = toml::from_str(r#"origins = ["https://a.example", "*"]"#).unwrap();
        assert_eq!(config.origins, AnyOrArray::Any);
    }

    #[test]
    fn explicit_origins() {
        let config: CorsConfig = toml::from_str(r#"origins = ["https://a.example"]"#).unwrap();
        assert_eq!(config.origins, AnyOrArray::List(vec!["https://a.example".to_string()]));
    }
}
