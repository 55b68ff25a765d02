//! Suspicion reasons and their fixed weights.

use std::fmt;

/// Why an IP's suspicion score was raised.
///
/// Weights are additive; an IP is blocked once its score reaches the
/// configured threshold and released once decay brings it under half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspicion {
    /// A token was presented from an IP other than the one it was
    /// issued to.
    TokenIpMismatch,
    /// No anti-scraping token on a path that expects one.
    MissingToken,
    /// An unknown or expired token.
    InvalidToken,
    /// More requests in the last minute than the per-minute budget.
    MinuteOverflow,
    /// More requests in the last hour than the per-hour budget.
    HourOverflow,
    /// The user-agent matches a known scraper pattern.
    SuspiciousUserAgent,
    /// Machine-regular request timing (low mean, low deviation).
    SequentialTiming,
    /// A direct attempt to download the dictionary.
    DictionaryAccess,
    /// A honeypot endpoint was hit.
    Honeypot,
}

impl Suspicion {
    /// The score added for this reason.
    pub fn weight(self) -> u32 {
        match self {
            Self::TokenIpMismatch => 50,
            Self::MissingToken => 5,
            Self::InvalidToken => 15,
            Self::MinuteOverflow => 20,
            Self::HourOverflow => 30,
            Self::SuspiciousUserAgent => 10,
            Self::SequentialTiming => 25,
            Self::DictionaryAccess => 50,
            Self::Honeypot => 100,
        }
    }
}

impl fmt::Display for Suspicion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TokenIpMismatch => "token_ip_mismatch",
            Self::MissingToken => "missing_token",
            Self::InvalidToken => "invalid_token",
            Self::MinuteOverflow => "minute_overflow",
            Self::HourOverflow => "hour_overflow",
            Self::SuspiciousUserAgent => "suspicious_user_agent",
            Self::SequentialTiming => "sequential_timing",
            Self::DictionaryAccess => "dictionary_access",
            Self::Honeypot => "honeypot",
        };
        f.write_str(name)
    }
}

/// User-agent substrings that mark automated clients.
pub(crate) const SCRAPER_AGENT_PATTERNS: [&str; 8] = [
    "bot", "crawl", "spider", "curl", "wget", "python", "scrapy", "httpclient",
];

/// `true` when the user-agent looks automated (or is absent).
pub(crate) fn suspicious_user_agent(user_agent: &str) -> bool {
    if user_agent.trim().is_empty() {
        return true;
    }
    let lower = user_agent.to_lowercase();
    SCRAPER_AGENT_PATTERNS.iter().any(|p| lower.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_match_policy() {
        assert_eq!(Suspicion::TokenIpMismatch.weight(), 50);
        assert_eq!(Suspicion::MissingToken.weight(), 5);
        assert_eq!(Suspicion::InvalidToken.weight(), 15);
        assert_eq!(Suspicion::MinuteOverflow.weight(), 20);
        assert_eq!(Suspicion::HourOverflow.weight(), 30);
        assert_eq!(Suspicion::SuspiciousUserAgent.weight(), 10);
        assert_eq!(Suspicion::SequentialTiming.weight(), 25);
        assert_eq!(Suspicion::DictionaryAccess.weight(), 50);
        assert_eq!(Suspicion::Honeypot.weight(), 100);
    }

    #[test]
    fn test_suspicious_user_agent_patterns() {
        assert!(suspicious_user_agent(""));
        assert!(suspicious_user_agent("python-requests/2.31"));
        assert!(suspicious_user_agent("Googlebot/2.1"));
        assert!(suspicious_user_agent("curl/8.0"));
        assert!(!suspicious_user_agent(
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36"
        ));
    }
}
