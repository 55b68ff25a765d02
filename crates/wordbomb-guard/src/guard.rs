//! The anti-scraping guard: per-IP request tracking, rate limiting,
//! suspicion scoring, token issuance, and honeypot detection.
//!
//! The guard is deliberately in-memory and process-local -- it protects a
//! single-authority server. Policy is fail-closed (a blocked IP is always
//! rejected) while plumbing is fail-open (the transport layer admits
//! traffic if the guard itself is unavailable).
//!
//! All mutating entry points have an `_at(now)` twin so tests can drive
//! the clock explicitly; the public methods use `Instant::now()`.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::time::{Duration, Instant};

use rand::RngCore;

use crate::suspicion::{suspicious_user_agent, Suspicion};

/// How long request samples are retained per IP.
const REQUEST_RETENTION: Duration = Duration::from_secs(3600);

/// IPs with no activity for this long are forgotten entirely.
const IDLE_FORGET: Duration = Duration::from_secs(24 * 3600);

/// Sample count over which the sequential-timing detector operates.
const SEQUENTIAL_WINDOW: usize = 20;

/// Minimum samples before the sequential detector may fire.
const SEQUENTIAL_MIN_SAMPLES: usize = 10;

/// Tunable limits. Defaults mirror the production policy.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Requests allowed per IP in any 60 s window.
    pub minute_limit: usize,
    /// Requests allowed per IP in any 3600 s window.
    pub hour_limit: usize,
    /// Requests allowed per (IP, path) pair in the endpoint window.
    pub endpoint_limit: usize,
    /// Width of the per-endpoint window.
    pub endpoint_window: Duration,
    /// Score at which an IP is blocked.
    pub block_threshold: u32,
    /// Lifetime of issued anti-scraping tokens.
    pub token_ttl: Duration,
    /// Paths whose mere hit marks the caller as a bot.
    pub honeypot_paths: Vec<String>,
    /// Paths that look like a raw dictionary download.
    pub dictionary_paths: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            minute_limit: 30,
            hour_limit: 300,
            endpoint_limit: 120,
            endpoint_window: Duration::from_secs(60),
            block_threshold: 100,
            token_ttl: Duration::from_secs(300),
            honeypot_paths: vec!["/api/words.json".into(), "/api/dictionary/full".into()],
            dictionary_paths: vec!["/dictionary.txt".into()],
        }
    }
}

/// Outcome of a guard check for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    RateLimited,
    Forbidden,
}

/// How the caller presented (or failed to present) an anti-scraping token.
#[derive(Debug, Clone, Copy)]
pub enum TokenCheck<'a> {
    /// The path does not require a token.
    NotRequired,
    /// A token was required but absent.
    Missing,
    /// A token was supplied.
    Provided(&'a str),
}

#[derive(Debug)]
struct RequestSample {
    at: Instant,
    path: String,
    user_agent: String,
}

#[derive(Debug)]
struct ClientRecord {
    requests: Vec<RequestSample>,
    tokens: HashSet<String>,
    suspicion: u32,
    last_seen: Instant,
}

impl ClientRecord {
    fn new(now: Instant) -> Self {
        Self {
            requests: Vec::new(),
            tokens: HashSet::new(),
            suspicion: 0,
            last_seen: now,
        }
    }

    fn prune(&mut self, now: Instant) {
        self.requests
            .retain(|r| now.duration_since(r.at) <= REQUEST_RETENTION);
    }

    fn count_within(&self, now: Instant, window: Duration) -> usize {
        self.requests
            .iter()
            .filter(|r| now.duration_since(r.at) <= window)
            .count()
    }

    /// Requests to one path within the window (the coarse per-endpoint
    /// limiter runs off the same request log).
    fn count_for_path(&self, path: &str, now: Instant, window: Duration) -> usize {
        self.requests
            .iter()
            .filter(|r| r.path == path && now.duration_since(r.at) <= window)
            .count()
    }
}

#[derive(Debug)]
struct IssuedToken {
    ip: IpAddr,
    issued_at: Instant,
    uses: u32,
}

/// Serializable summary for the admin surface.
#[derive(Debug, Clone, serde::Serialize)]
pub struct GuardStats {
    pub tracked_ips: usize,
    pub blocked_ips: usize,
    pub banned_ips: usize,
    pub active_tokens: usize,
}

/// The per-process abuse guard. See the module docs for the model.
pub struct Guard {
    config: GuardConfig,
    clients: HashMap<IpAddr, ClientRecord>,
    /// Automatically blocked by score; released by decay.
    blocked: HashSet<IpAddr>,
    /// Explicit admin bans; only an unban releases these.
    banned: HashSet<IpAddr>,
    tokens: HashMap<String, IssuedToken>,
}

impl Guard {
    pub fn new(config: GuardConfig) -> Self {
        Self {
            config,
            clients: HashMap::new(),
            blocked: HashSet::new(),
            banned: HashSet::new(),
            tokens: HashMap::new(),
        }
    }

    /// Screens one request. Records it, applies every scoring rule, and
    /// returns the verdict the transport layer must enforce.
    pub fn check_request(
        &mut self,
        ip: IpAddr,
        path: &str,
        user_agent: &str,
        token: TokenCheck<'_>,
    ) -> Verdict {
        self.check_request_at(ip, path, user_agent, token, Instant::now())
    }

    pub fn check_request_at(
        &mut self,
        ip: IpAddr,
        path: &str,
        user_agent: &str,
        token: TokenCheck<'_>,
        now: Instant,
    ) -> Verdict {
        let record = self.clients.entry(ip).or_insert_with(|| ClientRecord::new(now));
        record.prune(now);
        record.last_seen = now;
        record.requests.push(RequestSample {
            at: now,
            path: path.to_string(),
            user_agent: user_agent.to_string(),
        });

        // Honeypots score even for already-blocked callers.
        let mut reasons: Vec<Suspicion> = Vec::new();
        if self.config.honeypot_paths.iter().any(|p| p == path) {
            reasons.push(Suspicion::Honeypot);
        }
        if self.config.dictionary_paths.iter().any(|p| p == path) {
            reasons.push(Suspicion::DictionaryAccess);
        }

        if self.banned.contains(&ip) || self.blocked.contains(&ip) {
            self.apply_reasons(ip, &reasons);
            return Verdict::Forbidden;
        }

        match token {
            TokenCheck::NotRequired => {}
            TokenCheck::Missing => reasons.push(Suspicion::MissingToken),
            TokenCheck::Provided(value) => {
                if let Some(reason) = self.validate_token(ip, value, now) {
                    reasons.push(reason);
                }
            }
        }

        let record = self.clients.get(&ip).expect("record inserted above");
        if record
            .requests
            .last()
            .is_some_and(|r| suspicious_user_agent(&r.user_agent))
        {
            reasons.push(Suspicion::SuspiciousUserAgent);
        }

        let minute = record.count_within(now, Duration::from_secs(60));
        let hour = record.requests.len();
        let mut limited = false;
        if minute > self.config.minute_limit {
            reasons.push(Suspicion::MinuteOverflow);
            limited = true;
        }
        if hour > self.config.hour_limit {
            reasons.push(Suspicion::HourOverflow);
            limited = true;
        }
        if sequential_pattern(&record.requests) {
            reasons.push(Suspicion::SequentialTiming);
        }

        // Coarse per-endpoint limiter, over the same request log.
        if record.count_for_path(path, now, self.config.endpoint_window)
            > self.config.endpoint_limit
        {
            limited = true;
        }

        let blocked = self.apply_reasons(ip, &reasons);
        if blocked {
            Verdict::Forbidden
        } else if limited {
            Verdict::RateLimited
        } else {
            Verdict::Allow
        }
    }

    /// Adds the reasons' weights to the IP's score; blocks on threshold.
    /// Returns `true` if the IP is (now) blocked.
    fn apply_reasons(&mut self, ip: IpAddr, reasons: &[Suspicion]) -> bool {
        if reasons.is_empty() {
            return self.blocked.contains(&ip);
        }
        let Some(record) = self.clients.get_mut(&ip) else {
            return false;
        };
        for reason in reasons {
            record.suspicion = record.suspicion.saturating_add(reason.weight());
            tracing::debug!(%ip, reason = %reason, score = record.suspicion, "suspicion raised");
        }
        if record.suspicion >= self.config.block_threshold && self.blocked.insert(ip) {
            tracing::warn!(%ip, score = record.suspicion, "ip blocked by suspicion score");
        }
        self.blocked.contains(&ip)
    }

    /// Checks a presented token. Returns the suspicion reason, if any.
    fn validate_token(&mut self, ip: IpAddr, value: &str, now: Instant) -> Option<Suspicion> {
        match self.tokens.get_mut(value) {
            None => Some(Suspicion::InvalidToken),
            Some(token) if now.duration_since(token.issued_at) > self.config.token_ttl => {
                self.tokens.remove(value);
                Some(Suspicion::InvalidToken)
            }
            Some(token) if token.ip != ip => {
                // Cross-IP use burns the token for its rightful owner too.
                self.tokens.remove(value);
                Some(Suspicion::TokenIpMismatch)
            }
            Some(token) => {
                token.uses += 1;
                None
            }
        }
    }

    /// Issues a fresh 256-bit token bound to the requesting IP.
    pub fn generate_token(&mut self, ip: IpAddr) -> String {
        self.generate_token_at(ip, Instant::now())
    }

    pub fn generate_token_at(&mut self, ip: IpAddr, now: Instant) -> String {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        let token: String = bytes.iter().map(|b| format!("{b:02x}")).collect();

        self.tokens.insert(
            token.clone(),
            IssuedToken {
                ip,
                issued_at: now,
                uses: 0,
            },
        );
        self.clients
            .entry(ip)
            .or_insert_with(|| ClientRecord::new(now))
            .tokens
            .insert(token.clone());
        token
    }

    /// Background maintenance, run on a fixed cadence (~60 s):
    /// decays scores, releases recovered IPs, forgets idle IPs, and
    /// prunes expired tokens.
    pub fn sweep(&mut self) {
        self.sweep_at(Instant::now());
    }

    pub fn sweep_at(&mut self, now: Instant) {
        let release_below = self.config.block_threshold / 2;
        for (ip, record) in &mut self.clients {
            if record.suspicion > 0 {
                record.suspicion -= 1;
                if record.suspicion < release_below && self.blocked.remove(ip) {
                    tracing::info!(%ip, score = record.suspicion, "ip released from block set");
                }
            }
        }

        self.clients
            .retain(|_, record| now.duration_since(record.last_seen) <= IDLE_FORGET);
        let ttl = self.config.token_ttl;
        self.tokens
            .retain(|_, token| now.duration_since(token.issued_at) <= ttl);
    }

    // -- Admin surface -----------------------------------------------------

    pub fn stats(&self) -> GuardStats {
        GuardStats {
            tracked_ips: self.clients.len(),
            blocked_ips: self.blocked.len(),
            banned_ips: self.banned.len(),
            active_tokens: self.tokens.len(),
        }
    }

    /// IPs currently blocked by score (explicit bans not included).
    pub fn blocked_ips(&self) -> Vec<IpAddr> {
        self.blocked.iter().copied().collect()
    }

    /// Clears an automatic block and zeroes the score.
    pub fn unblock(&mut self, ip: IpAddr) -> bool {
        if let Some(record) = self.clients.get_mut(&ip) {
            record.suspicion = 0;
        }
        self.blocked.remove(&ip)
    }

    /// Explicit admin ban. Persisted by the caller; survives sweeps.
    pub fn ban(&mut self, ip: IpAddr) {
        if self.banned.insert(ip) {
            tracing::warn!(%ip, "ip banned");
        }
    }

    pub fn unban(&mut self, ip: IpAddr) -> bool {
        self.banned.remove(&ip)
    }

    pub fn is_banned(&self, ip: IpAddr) -> bool {
        self.banned.contains(&ip)
    }

    /// `true` while the IP is in the automatic block set.
    pub fn is_blocked(&self, ip: IpAddr) -> bool {
        self.blocked.contains(&ip)
    }

    /// Current suspicion score for an IP (0 if untracked).
    pub fn score(&self, ip: IpAddr) -> u32 {
        self.clients.get(&ip).map_or(0, |r| r.suspicion)
    }
}

/// Machine-timing detector over the most recent request samples.
///
/// Fires when, over the last [`SEQUENTIAL_WINDOW`] requests, the mean
/// inter-request interval is under 2000 ms with a standard deviation
/// under 500 ms, given at least [`SEQUENTIAL_MIN_SAMPLES`] intervals.
fn sequential_pattern(requests: &[RequestSample]) -> bool {
    let start = requests.len().saturating_sub(SEQUENTIAL_WINDOW);
    let recent = &requests[start..];
    if recent.len() < SEQUENTIAL_MIN_SAMPLES + 1 {
        return false;
    }

    let intervals: Vec<f64> = recent
        .windows(2)
        .map(|w| w[1].at.duration_since(w[0].at).as_secs_f64() * 1000.0)
        .collect();
    if intervals.len() < SEQUENTIAL_MIN_SAMPLES {
        return false;
    }

    let mean = intervals.iter().sum::<f64>() / intervals.len() as f64;
    let variance = intervals
        .iter()
        .map(|ms| (ms - mean).powi(2))
        .sum::<f64>()
        / intervals.len() as f64;
    let stddev = variance.sqrt();

    mean < 2000.0 && stddev < 500.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([10, 0, 0, last])
    }

    const UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36";

    fn guard() -> Guard {
        Guard::new(GuardConfig::default())
    }

    #[test]
    fn test_normal_request_is_allowed() {
        let mut g = guard();
        let verdict = g.check_request(ip(1), "/syllable-stats", UA, TokenCheck::NotRequired);
        assert_eq!(verdict, Verdict::Allow);
        assert_eq!(g.score(ip(1)), 0);
    }

    #[test]
    fn test_minute_overflow_rate_limits_and_scores() {
        let mut g = guard();
        let now = Instant::now();
        // Alternating short/long gaps keep the deviation high enough to
        // stay under the sequential detector while fitting 31 requests
        // into one 60 s window.
        let mut verdict = Verdict::Allow;
        let mut at = now;
        for i in 0..=30 {
            verdict = g.check_request_at(ip(2), "/validate", UA, TokenCheck::NotRequired, at);
            at += Duration::from_millis(if i % 2 == 0 { 200 } else { 3700 });
        }
        // The 31st request in the window exceeds the budget of 30.
        assert_eq!(verdict, Verdict::RateLimited);
        assert_eq!(g.score(ip(2)), Suspicion::MinuteOverflow.weight());
    }

    #[test]
    fn test_honeypot_hit_blocks_immediately() {
        let mut g = guard();
        let verdict = g.check_request(ip(3), "/api/words.json", UA, TokenCheck::NotRequired);
        // +100 reaches the threshold on the first hit.
        assert_eq!(verdict, Verdict::Forbidden);
        assert_eq!(g.blocked_ips(), vec![ip(3)]);

        // Every subsequent request stays forbidden.
        let verdict = g.check_request(ip(3), "/validate", UA, TokenCheck::NotRequired);
        assert_eq!(verdict, Verdict::Forbidden);
    }

    #[test]
    fn test_dictionary_download_scores_fifty() {
        let mut g = guard();
        let verdict = g.check_request(ip(4), "/dictionary.txt", UA, TokenCheck::NotRequired);
        assert_eq!(verdict, Verdict::Allow);
        assert_eq!(g.score(ip(4)), Suspicion::DictionaryAccess.weight());
        // A second attempt crosses the threshold.
        let verdict = g.check_request(ip(4), "/dictionary.txt", UA, TokenCheck::NotRequired);
        assert_eq!(verdict, Verdict::Forbidden);
    }

    #[test]
    fn test_missing_token_scores_five() {
        let mut g = guard();
        g.check_request(ip(5), "/search", UA, TokenCheck::Missing);
        assert_eq!(g.score(ip(5)), Suspicion::MissingToken.weight());
    }

    #[test]
    fn test_token_round_trip_from_issuing_ip() {
        let mut g = guard();
        let token = g.generate_token(ip(6));
        assert_eq!(token.len(), 64);
        let verdict = g.check_request(ip(6), "/search", UA, TokenCheck::Provided(&token));
        assert_eq!(verdict, Verdict::Allow);
        assert_eq!(g.score(ip(6)), 0);
    }

    #[test]
    fn test_token_from_wrong_ip_scores_and_invalidates() {
        let mut g = guard();
        let token = g.generate_token(ip(7));
        g.check_request(ip(8), "/search", UA, TokenCheck::Provided(&token));
        assert_eq!(g.score(ip(8)), Suspicion::TokenIpMismatch.weight());

        // The token is burned; even the rightful owner now fails.
        g.check_request(ip(7), "/search", UA, TokenCheck::Provided(&token));
        assert_eq!(g.score(ip(7)), Suspicion::InvalidToken.weight());
    }

    #[test]
    fn test_expired_token_is_invalid() {
        let mut g = guard();
        let start = Instant::now();
        let token = g.generate_token_at(ip(9), start);
        let later = start + Duration::from_secs(301);
        g.check_request_at(ip(9), "/search", UA, TokenCheck::Provided(&token), later);
        assert_eq!(g.score(ip(9)), Suspicion::InvalidToken.weight());
    }

    #[test]
    fn test_sequential_timing_detected() {
        let mut g = guard();
        let now = Instant::now();
        // 15 requests exactly 1 s apart: mean 1000 ms, stddev 0.
        for i in 0..15 {
            let at = now + Duration::from_secs(i);
            g.check_request_at(ip(10), "/validate", UA, TokenCheck::NotRequired, at);
        }
        assert!(g.score(ip(10)) >= Suspicion::SequentialTiming.weight());
    }

    #[test]
    fn test_human_timing_not_flagged() {
        let mut g = guard();
        let now = Instant::now();
        // Irregular gaps, several over 2 s: high mean and deviation.
        let gaps = [0u64, 3500, 900, 5200, 1100, 4800, 700, 6100, 1500, 3900, 800, 5600];
        let mut at = now;
        for gap in gaps {
            at += Duration::from_millis(gap);
            g.check_request_at(ip(11), "/validate", UA, TokenCheck::NotRequired, at);
        }
        assert_eq!(g.score(ip(11)), 0);
    }

    #[test]
    fn test_sweep_decays_scores_and_releases_blocks() {
        let mut g = guard();
        g.check_request(ip(12), "/api/words.json", UA, TokenCheck::NotRequired);
        assert!(!g.blocked_ips().is_empty());

        // Decay to threshold/2 - 1 = 49 releases the block.
        for _ in 0..51 {
            g.sweep();
        }
        assert!(g.blocked_ips().is_empty());
        assert_eq!(g.score(ip(12)), 49);
    }

    #[test]
    fn test_sweep_forgets_idle_ips() {
        let mut g = guard();
        let start = Instant::now();
        g.check_request_at(ip(13), "/validate", UA, TokenCheck::NotRequired, start);
        assert_eq!(g.stats().tracked_ips, 1);

        g.sweep_at(start + Duration::from_secs(25 * 3600));
        assert_eq!(g.stats().tracked_ips, 0);
    }

    #[test]
    fn test_ban_survives_sweep_until_unban() {
        let mut g = guard();
        g.ban(ip(14));
        for _ in 0..200 {
            g.sweep();
        }
        assert_eq!(
            g.check_request(ip(14), "/validate", UA, TokenCheck::NotRequired),
            Verdict::Forbidden
        );
        assert!(g.unban(ip(14)));
        assert_eq!(
            g.check_request(ip(14), "/validate", UA, TokenCheck::NotRequired),
            Verdict::Allow
        );
    }

    #[test]
    fn test_unblock_clears_score() {
        let mut g = guard();
        g.check_request(ip(15), "/api/words.json", UA, TokenCheck::NotRequired);
        assert!(g.unblock(ip(15)));
        assert_eq!(g.score(ip(15)), 0);
        assert_eq!(
            g.check_request(ip(15), "/validate", UA, TokenCheck::NotRequired),
            Verdict::Allow
        );
    }

    #[test]
    fn test_endpoint_limiter_is_per_path() {
        let mut g = Guard::new(GuardConfig {
            // Keep the global windows out of the way.
            minute_limit: 10_000,
            hour_limit: 100_000,
            endpoint_limit: 5,
            ..GuardConfig::default()
        });
        let now = Instant::now();
        let mut verdict = Verdict::Allow;
        for i in 0..6 {
            let at = now + Duration::from_millis(i * 2100);
            verdict = g.check_request_at(ip(16), "/search", UA, TokenCheck::NotRequired, at);
        }
        assert_eq!(verdict, Verdict::RateLimited);

        // A different path has its own budget.
        let at = now + Duration::from_millis(20_000);
        let verdict = g.check_request_at(ip(16), "/validate", UA, TokenCheck::NotRequired, at);
        assert_eq!(verdict, Verdict::Allow);
    }
}
