use std::collections::HashMap;

/// Snapshot of environment variables consulted by the config resolver.
///
/// Captured once at startup so resolution is a pure function of its inputs;
/// tests build one from explicit pairs instead of mutating the process env.
#[derive(Debug, Clone, Default)]
pub struct EnvVars {
    vars: HashMap<String, String>,
}

impl EnvVars {
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of `name`, treating empty strings as unset.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn empty_values_count_as_unset() {
        let env = EnvVars::from_pairs([("A", ""), ("B", "  "), ("C", "x")]);
        assert_eq!(env.get("A"), None);
        assert_eq!(env.get("B"), None);
        assert_eq!(env.get("C"), Some("x"));
        assert_eq!(env.get_or("A", "fallback"), "fallback");
    }

    #[test]
    #[serial]
    fn snapshot_does_not_follow_later_changes() {
        std::env::set_var("GABINETE_ENV_SNAPSHOT_CHECK", "before");
        let env = EnvVars::from_process();
        std::env::set_var("GABINETE_ENV_SNAPSHOT_CHECK", "after");

        assert_eq!(env.get("GABINETE_ENV_SNAPSHOT_CHECK"), Some("before"));
        std::env::remove_var("GABINETE_ENV_SNAPSHOT_CHECK");
    }
}
