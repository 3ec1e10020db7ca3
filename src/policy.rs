//! Ingestion policy for URL uploads.
//!
//! A policy bounds what the URL ingestor may fetch: which schemes, which
//! domains, how many bytes, and for how long. The streaming size check in
//! the ingestor is the authoritative bound; the declared-length check it
//! also performs is an early-rejection optimization.

use std::collections::HashSet;
use std::time::Duration;

/// Policy applied to every URL ingestion request
#[derive(Debug, Clone)]
pub struct UrlUploadPolicy {
    /// Hard upper bound on downloaded content size in bytes
    pub max_bytes: u64,
    /// URL schemes accepted for ingestion (compared case-insensitively)
    pub allowed_schemes: HashSet<String>,
    /// When true, any host passes the domain check
    pub allow_all_domains: bool,
    /// Domain allow-list, consulted only when `allow_all_domains` is false.
    /// A host passes on exact match or as a strict subdomain of an entry.
    pub allowed_domains: HashSet<String>,
    /// Fetch timeout in milliseconds; 0 disables the timer
    pub fetch_timeout_ms: u64,
}

impl Default for UrlUploadPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            allowed_schemes: HashSet::from(["https".to_string()]),
            allow_all_domains: false,
            allowed_domains: HashSet::new(),
            fetch_timeout_ms: 30_000,
        }
    }
}

impl UrlUploadPolicy {
    /// The armed timeout, or `None` when the timer is disabled
    pub fn fetch_timeout(&self) -> Option<Duration> {
        (self.fetch_timeout_ms > 0).then(|| Duration::from_millis(self.fetch_timeout_ms))
    }

    /// Case-insensitive scheme membership check
    pub fn scheme_allowed(&self, scheme: &str) -> bool {
        self.allowed_schemes
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(scheme))
    }

    /// Case-insensitive host admission: exact match against an allowed
    /// domain, or the host is a strict subdomain of one (`a.b.com` passes
    /// for allowed `b.com`; `example.com.evil.net` does not pass for
    /// allowed `example.com`). An empty allow-list admits nothing.
    pub fn host_allowed(&self, host: &str) -> bool {
        if self.allow_all_domains {
            return true;
        }
        if host.is_empty() {
            return false;
        }
        let host = host.to_ascii_lowercase();
        self.allowed_domains.iter().any(|allowed| {
            let allowed = allowed.to_ascii_lowercase();
            host == allowed || host.ends_with(&format!(".{}", allowed))
        })
    }

    /// Check the policy invariants
    pub fn validate(&self) -> Result<(), String> {
        if self.allowed_schemes.is_empty() {
            return Err("policy must allow at least one scheme".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy_with_domains(domains: &[&str]) -> UrlUploadPolicy {
        UrlUploadPolicy {
            allowed_domains: domains.iter().map(|d| d.to_string()).collect(),
            ..UrlUploadPolicy::default()
        }
    }

    #[test]
    fn test_default_policy_validates() {
        assert!(UrlUploadPolicy::default().validate().is_ok());
    }

    #[test]
    fn test_empty_schemes_invalid() {
        let policy = UrlUploadPolicy {
            allowed_schemes: HashSet::new(),
            ..UrlUploadPolicy::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_scheme_check_case_insensitive() {
        let policy = UrlUploadPolicy::default();
        assert!(policy.scheme_allowed("https"));
        assert!(policy.scheme_allowed("HTTPS"));
        assert!(!policy.scheme_allowed("http"));
        assert!(!policy.scheme_allowed("ftp"));
    }

    #[test]
    fn test_exact_host_match() {
        let policy = policy_with_domains(&["example.com"]);
        assert!(policy.host_allowed("example.com"));
        assert!(policy.host_allowed("EXAMPLE.COM"));
        assert!(!policy.host_allowed("other.org"));
    }

    #[test]
    fn test_strict_subdomain_match() {
        let policy = policy_with_domains(&["b.com"]);
        assert!(policy.host_allowed("a.b.com"));
        assert!(policy.host_allowed("deep.a.b.com"));
        // a.b.com is never admitted by a sibling subdomain entry
        let sibling = policy_with_domains(&["x.b.com"]);
        assert!(!sibling.host_allowed("a.b.com"));
    }

    #[test]
    fn test_suffix_spoofing_rejected() {
        let policy = policy_with_domains(&["example.com"]);
        assert!(!policy.host_allowed("example.com.evil.net"));
        assert!(!policy.host_allowed("notexample.com"));
    }

    #[test]
    fn test_empty_allow_list_rejects_everything() {
        let policy = policy_with_domains(&[]);
        assert!(!policy.host_allowed("example.com"));
        assert!(!policy.host_allowed(""));
    }

    #[test]
    fn test_allow_all_domains_bypasses_list() {
        let policy = UrlUploadPolicy {
            allow_all_domains: true,
            ..policy_with_domains(&[])
        };
        assert!(policy.host_allowed("anything.example"));
    }

    #[test]
    fn test_timeout_zero_disables_timer() {
        let mut policy = UrlUploadPolicy::default();
        policy.fetch_timeout_ms = 0;
        assert!(policy.fetch_timeout().is_none());

        policy.fetch_timeout_ms = 1500;
        assert_eq!(policy.fetch_timeout(), Some(Duration::from_millis(1500)));
    }
}
