//! Provider credentials and the strategy seam for choosing between them.

use std::fmt;

/// A single provider API key.
///
/// `Debug` prints a masked form so keys never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    api_key: String,
}

impl Credential {
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// First and last four characters, or `***` for short keys.
    #[must_use]
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        if chars.len() > 8 {
            let head: String = chars[..4].iter().collect();
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("{head}...{tail}")
        } else {
            "***".to_string()
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.masked()).finish()
    }
}

/// A fixed, non-empty set of credentials. Read-only once built.
#[derive(Debug, Clone)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
}

impl CredentialPool {
    pub fn new(credentials: Vec<Credential>) -> anyhow::Result<Self> {
        if credentials.is_empty() {
            anyhow::bail!("credential pool must contain at least one credential");
        }
        Ok(Self { credentials })
    }

    pub fn from_keys<I, S>(keys: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(keys.into_iter().map(Credential::new).collect())
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Credential] {
        &self.credentials
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// The first credential. Pools are never empty.
    #[must_use]
    pub fn first(&self) -> &Credential {
        &self.credentials[0]
    }
}

/// Strategy that picks the credential for one call attempt.
///
/// Called once per attempt, so a retried request may go out under a
/// different credential than the attempt that failed.
pub trait CredentialSelector: Send + Sync {
    fn select<'a>(&self, pool: &'a CredentialPool) -> &'a Credential;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pool_is_rejected() {
        assert!(CredentialPool::new(Vec::new()).is_err());
    }

    #[test]
    fn from_keys_keeps_order() {
        let pool = CredentialPool::from_keys(["a", "b"]).unwrap();
        assert_eq!(pool.len(), 2);
        assert!(!pool.is_empty());
        assert_eq!(pool.first().api_key(), "a");
        assert_eq!(pool.as_slice()[1].api_key(), "b");
    }

    #[test]
    fn debug_never_prints_the_key() {
        let credential = Credential::new("sk-abcdefghijklmnop");
        let printed = format!("{credential:?}");
        assert!(!printed.contains("abcdefghijklmnop"));
        assert!(printed.contains("sk-a...mnop"));
        assert_eq!(Credential::new("short").masked(), "***");
    }
}
