//! # Credential Rotation
//!
//! Spreads outbound calls across a pool of API keys. All selection state
//! (cursor, usage counters, cooldowns) lives behind one mutex; each call to
//! [`CredentialRotator::next_credential`] is a single short critical section,
//! so concurrent selections never lose updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    fmt,
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};
use tracing::{debug, warn};

/// # Credential
///
/// An API secret plus its derived, non-reversible identity. The secret is
/// only reachable through [`Credential::secret`]; `Debug` and `Display` show
/// the key id.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    id: Arc<str>,
    secret: Arc<str>,
}

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        let secret: String = secret.into();
        let id = fingerprint(&secret);
        Self {
            id: Arc::from(id),
            secret: Arc::from(secret),
        }
    }

    /// Key id, safe for logs, stats and cache keys.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The raw secret. Only upstream clients should call this.
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential").field("id", &self.id).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// First 12 hex chars of SHA-256(input). Shared by key ids and derived
/// session ids.
pub(crate) fn short_digest(input: &str) -> String {
    let mut hex = format!("{:x}", Sha256::digest(input.as_bytes()));
    hex.truncate(12);
    hex
}

/// `key-` followed by [`short_digest`] of the secret.
fn fingerprint(secret: &str) -> String {
    format!("key-{}", short_digest(secret))
}

/// # Rotation Strategy
///
/// How the next key is chosen among the available ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RotationStrategy {
    /// Cycle through the pool in order
    #[default]
    RoundRobin,
    /// Prefer never-used keys, then the one idle the longest
    LeastRecentlyUsed,
    /// Uniform random choice
    Random,
}

impl RotationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RotationStrategy::RoundRobin => "round-robin",
            RotationStrategy::LeastRecentlyUsed => "least-recently-used",
            RotationStrategy::Random => "random",
        }
    }
}

impl FromStr for RotationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "round-robin" | "round_robin" | "roundrobin" => Ok(RotationStrategy::RoundRobin),
            "least-recently-used" | "lru" => Ok(RotationStrategy::LeastRecentlyUsed),
            "random" => Ok(RotationStrategy::Random),
            other => Err(format!(
                "Invalid rotation strategy '{}'. Valid options are: round-robin, least-recently-used, random",
                other
            )),
        }
    }
}

#[derive(Debug)]
struct PoolEntry {
    credential: Credential,
    usage_count: u64,
    /// Value of `total_selections` when this key was last handed out.
    last_selection: Option<u64>,
    last_used_at: Option<DateTime<Utc>>,
    cooldown_until: Option<Instant>,
}

impl PoolEntry {
    fn is_available(&self, now: Instant) -> bool {
        self.cooldown_until.map_or(true, |until| now >= until)
    }
}

#[derive(Debug)]
struct RotationState {
    entries: Vec<PoolEntry>,
    cursor: usize,
    total_selections: u64,
}

/// # Credential Rotator
///
/// Process-wide pool of API keys. Construct once and share through an `Arc`.
#[derive(Debug)]
pub struct CredentialRotator {
    strategy: RotationStrategy,
    cooldown: Duration,
    state: Mutex<RotationState>,
}

impl CredentialRotator {
    /// Build a rotator. Blank secrets are dropped and duplicate secrets
    /// collapsed, keeping the first occurrence.
    pub fn new<I, S>(secrets: I, strategy: RotationStrategy, cooldown: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entries: Vec<PoolEntry> = Vec::new();
        for secret in secrets {
            let secret: String = secret.into();
            let secret = secret.trim();
            if secret.is_empty() {
                continue;
            }
            let credential = Credential::new(secret);
            if entries.iter().any(|e| e.credential.id() == credential.id()) {
                continue;
            }
            entries.push(PoolEntry {
                credential,
                usage_count: 0,
                last_selection: None,
                last_used_at: None,
                cooldown_until: None,
            });
        }

        debug!(pool_size = entries.len(), strategy = strategy.as_str(), "Credential rotator initialised");

        Self {
            strategy,
            cooldown,
            state: Mutex::new(RotationState {
                entries,
                cursor: 0,
                total_selections: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RotationState> {
        // Every critical section leaves the state consistent, so a poisoned
        // lock is still safe to use.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn strategy(&self) -> RotationStrategy {
        self.strategy
    }

    pub fn pool_size(&self) -> usize {
        self.lock().entries.len()
    }

    /// Select the next credential. Returns `None` when the pool is empty or
    /// every key is parked after a quota error.
    pub fn next_credential(&self) -> Option<Credential> {
        let mut state = self.lock();
        let now = Instant::now();
        let len = state.entries.len();
        if len == 0 {
            return None;
        }

        let index = match self.strategy {
            RotationStrategy::RoundRobin => {
                let start = state.cursor;
                let found = (0..len)
                    .map(|offset| (start + offset) % len)
                    .find(|&i| state.entries[i].is_available(now));
                if let Some(i) = found {
                    state.cursor = (i + 1) % len;
                }
                found
            }
            RotationStrategy::LeastRecentlyUsed => state
                .entries
                .iter()
                .enumerate()
                .filter(|(_, e)| e.is_available(now))
                // `None < Some(_)`, so never-used keys win in pool order.
                .min_by_key(|(_, e)| e.last_selection)
                .map(|(i, _)| i),
            RotationStrategy::Random => {
                let available: Vec<usize> = (0..len)
                    .filter(|&i| state.entries[i].is_available(now))
                    .collect();
                if available.is_empty() {
                    None
                } else {
                    Some(available[fastrand::usize(..available.len())])
                }
            }
        };

        let Some(index) = index else {
            warn!(pool_size = len, "All pooled API keys are cooling down");
            return None;
        };

        state.total_selections += 1;
        let sequence = state.total_selections;
        let entry = &mut state.entries[index];
        entry.usage_count += 1;
        entry.last_selection = Some(sequence);
        entry.last_used_at = Some(Utc::now());
        entry.cooldown_until = None;
        debug!(key_id = entry.credential.id(), usage_count = entry.usage_count, "Selected API key");
        Some(entry.credential.clone())
    }

    /// Park a credential for the configured cooldown after the provider
    /// reported its quota exhausted. Unknown credentials (e.g. the static
    /// fallback key) are ignored.
    pub fn report_quota_exhausted(&self, credential: &Credential) {
        let until = Instant::now() + self.cooldown;
        let mut state = self.lock();
        if let Some(entry) = state
            .entries
            .iter_mut()
            .find(|e| e.credential.id() == credential.id())
        {
            entry.cooldown_until = Some(until);
            warn!(
                key_id = credential.id(),
                cooldown_secs = self.cooldown.as_secs(),
                "API key quota exhausted; parking key"
            );
        }
    }

    /// Snapshot of the pool for diagnostics. Takes the lock only long enough
    /// to copy the counters.
    pub fn stats(&self) -> RotationStats {
        let state = self.lock();
        let now = Instant::now();
        let keys: Vec<KeyUsage> = state
            .entries
            .iter()
            .map(|e| KeyUsage {
                key_id: e.credential.id().to_string(),
                usage_count: e.usage_count,
                last_used: e.last_used_at.map(|t| t.to_rfc3339()),
                cooling_down: !e.is_available(now),
            })
            .collect();

        RotationStats {
            enabled: !keys.is_empty(),
            total_keys: keys.len(),
            available_keys: keys.iter().filter(|k| !k.cooling_down).count(),
            strategy: self.strategy,
            total_selections: state.total_selections,
            keys,
        }
    }
}

/// Per-key usage counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyUsage {
    pub key_id: String,
    pub usage_count: u64,
    pub last_used: Option<String>,
    pub cooling_down: bool,
}

/// # Rotation Statistics
///
/// Point-in-time view of the credential pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationStats {
    pub enabled: bool,
    pub total_keys: usize,
    pub available_keys: usize,
    pub strategy: RotationStrategy,
    pub total_selections: u64,
    pub keys: Vec<KeyUsage>,
}
