//! JSON persistence backend: staff accounts, bans, and the user log.
//!
//! Each collection is one JSON object file under the data directory,
//! keyed by username or IP. Collections are small (human counts), so
//! they are held fully in memory and rewritten after every mutation --
//! reads never touch disk after startup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

/// Errors from the persistence backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Raw load/save over named collections.
#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Loads a collection; a missing file yields the default value.
    pub async fn load<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T, StoreError> {
        match tokio::fs::read(self.path(name)).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes a collection, creating the data directory on first use.
    pub async fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let bytes = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(self.path(name), bytes).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Typed collections
// ---------------------------------------------------------------------------

/// A staff account, keyed by username in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffAccount {
    /// Salted SHA-256 of the password, hex-encoded.
    pub password_hash: String,
    /// Opaque token the client presents as `x-staff-token`.
    pub token: String,
    /// `admin` or `moderator`.
    pub role: String,
}

/// An explicit IP ban, keyed by IP string in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanEntry {
    pub reason: String,
    /// Unix seconds.
    pub banned_at: u64,
}

/// Last-seen record per IP, keyed by IP string in the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserLogEntry {
    /// Unix seconds of the most recent contact.
    pub last_seen: u64,
    /// Player names seen from this IP, most recent last.
    pub names: Vec<String>,
}

/// All persistent collections, cached in memory.
pub struct Stores {
    backend: JsonStore,
    pepper: String,
    pub staff: Mutex<HashMap<String, StaffAccount>>,
    pub bans: Mutex<HashMap<String, BanEntry>>,
    pub userlog: Mutex<HashMap<String, UserLogEntry>>,
}

impl Stores {
    /// Loads every collection and seeds the admin staff account when an
    /// admin password is configured and no `admin` account exists yet.
    pub async fn open(
        dir: impl AsRef<Path>,
        pepper: &str,
        admin_password: &str,
    ) -> Result<Self, StoreError> {
        let backend = JsonStore::new(dir.as_ref());
        let mut staff: HashMap<String, StaffAccount> = backend.load("staff").await?;
        let bans: HashMap<String, BanEntry> = backend.load("bans").await?;
        let userlog: HashMap<String, UserLogEntry> = backend.load("userlog").await?;

        if !admin_password.is_empty() && !staff.contains_key("admin") {
            let account = StaffAccount {
                password_hash: hash_password(pepper, admin_password),
                token: generate_staff_token(),
                role: "admin".to_string(),
            };
            staff.insert("admin".to_string(), account);
            backend.save("staff", &staff).await?;
            tracing::info!("seeded admin staff account");
        }

        Ok(Self {
            backend,
            pepper: pepper.to_string(),
            staff: Mutex::new(staff),
            bans: Mutex::new(bans),
            userlog: Mutex::new(userlog),
        })
    }

    /// Resolves a staff token to its role, if any.
    pub async fn staff_role_for_token(&self, token: &str) -> Option<String> {
        if token.is_empty() {
            return None;
        }
        let staff = self.staff.lock().await;
        staff
            .values()
            .find(|account| account.token == token)
            .map(|account| account.role.clone())
    }

    /// Creates or replaces a staff account and persists the collection.
    pub async fn upsert_staff(
        &self,
        username: &str,
        password: &str,
        role: &str,
    ) -> Result<StaffAccount, StoreError> {
        let account = StaffAccount {
            password_hash: hash_password(&self.pepper, password),
            token: generate_staff_token(),
            role: role.to_string(),
        };
        let mut staff = self.staff.lock().await;
        staff.insert(username.to_string(), account.clone());
        self.backend.save("staff", &*staff).await?;
        Ok(account)
    }

    pub async fn remove_staff(&self, username: &str) -> Result<bool, StoreError> {
        let mut staff = self.staff.lock().await;
        let removed = staff.remove(username).is_some();
        if removed {
            self.backend.save("staff", &*staff).await?;
        }
        Ok(removed)
    }

    /// Usernames and roles, without secrets.
    pub async fn staff_listing(&self) -> Vec<(String, String)> {
        let staff = self.staff.lock().await;
        let mut list: Vec<(String, String)> = staff
            .iter()
            .map(|(name, account)| (name.clone(), account.role.clone()))
            .collect();
        list.sort();
        list
    }

    pub async fn add_ban(&self, ip: &str, reason: &str) -> Result<(), StoreError> {
        let mut bans = self.bans.lock().await;
        bans.insert(
            ip.to_string(),
            BanEntry {
                reason: reason.to_string(),
                banned_at: unix_now(),
            },
        );
        self.backend.save("bans", &*bans).await
    }

    pub async fn remove_ban(&self, ip: &str) -> Result<bool, StoreError> {
        let mut bans = self.bans.lock().await;
        let removed = bans.remove(ip).is_some();
        if removed {
            self.backend.save("bans", &*bans).await?;
        }
        Ok(removed)
    }

    pub async fn ban_listing(&self) -> HashMap<String, BanEntry> {
        self.bans.lock().await.clone()
    }

    /// Stamps an IP's last contact and remembers the name it used.
    /// Persisted lazily by the maintenance flush, not per call.
    pub async fn record_user(&self, ip: &str, name: Option<&str>) {
        let mut log = self.userlog.lock().await;
        let entry = log.entry(ip.to_string()).or_default();
        entry.last_seen = unix_now();
        if let Some(name) = name {
            if !name.is_empty() && !entry.names.iter().any(|n| n == name) {
                entry.names.push(name.to_string());
            }
        }
    }

    pub async fn userlog_listing(&self) -> HashMap<String, UserLogEntry> {
        self.userlog.lock().await.clone()
    }

    /// Flushes the user log to disk; called on the maintenance cadence.
    pub async fn flush_userlog(&self) -> Result<(), StoreError> {
        let log = self.userlog.lock().await;
        self.backend.save("userlog", &*log).await
    }

    /// Verifies a staff login and returns the account token.
    pub async fn verify_staff_login(&self, username: &str, password: &str) -> Option<(String, String)> {
        let staff = self.staff.lock().await;
        let account = staff.get(username)?;
        if account.password_hash == hash_password(&self.pepper, password) {
            Some((account.token.clone(), account.role.clone()))
        } else {
            None
        }
    }
}

/// Salted SHA-256, hex-encoded.
fn hash_password(pepper: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pepper.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// 128-bit random hex token for staff sessions.
fn generate_staff_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("wordbomb-store-{}-{tag}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_load_missing_collection_is_default() {
        let store = JsonStore::new(temp_dir("missing"));
        let staff: HashMap<String, StaffAccount> = store.load("does-not-exist").await.unwrap();
        assert!(staff.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let store = JsonStore::new(temp_dir("roundtrip"));
        let mut bans = HashMap::new();
        bans.insert(
            "10.0.0.1".to_string(),
            BanEntry {
                reason: "scraping".into(),
                banned_at: 123,
            },
        );
        store.save("bans", &bans).await.unwrap();

        let loaded: HashMap<String, BanEntry> = store.load("bans").await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["10.0.0.1"].reason, "scraping");
    }

    #[tokio::test]
    async fn test_admin_account_seeded_once() {
        let dir = temp_dir("seed");
        let stores = Stores::open(&dir, "pepper", "s3cret").await.unwrap();
        let listing = stores.staff_listing().await;
        assert_eq!(listing, vec![("admin".to_string(), "admin".to_string())]);

        let (token, role) = stores.verify_staff_login("admin", "s3cret").await.unwrap();
        assert_eq!(role, "admin");
        assert_eq!(stores.staff_role_for_token(&token).await.unwrap(), "admin");

        // Reopening does not reseed or rotate the token.
        let stores2 = Stores::open(&dir, "pepper", "s3cret").await.unwrap();
        assert_eq!(
            stores2.staff_role_for_token(&token).await.unwrap(),
            "admin"
        );
    }

    #[tokio::test]
    async fn test_wrong_password_fails_login() {
        let stores = Stores::open(temp_dir("login"), "pepper", "s3cret").await.unwrap();
        assert!(stores.verify_staff_login("admin", "wrong").await.is_none());
        assert!(stores.verify_staff_login("ghost", "s3cret").await.is_none());
    }

    #[tokio::test]
    async fn test_ban_round_trip_persists() {
        let dir = temp_dir("bans");
        let stores = Stores::open(&dir, "", "").await.unwrap();
        stores.add_ban("10.0.0.9", "abuse").await.unwrap();

        let reloaded = Stores::open(&dir, "", "").await.unwrap();
        assert!(reloaded.ban_listing().await.contains_key("10.0.0.9"));

        assert!(reloaded.remove_ban("10.0.0.9").await.unwrap());
        assert!(!reloaded.ban_listing().await.contains_key("10.0.0.9"));
    }

    #[tokio::test]
    async fn test_record_user_tracks_names() {
        let stores = Stores::open(temp_dir("userlog"), "", "").await.unwrap();
        stores.record_user("10.0.0.2", Some("Alice")).await;
        stores.record_user("10.0.0.2", Some("Alice")).await;
        stores.record_user("10.0.0.2", Some("Bob")).await;

        let log = stores.userlog_listing().await;
        assert_eq!(log["10.0.0.2"].names, vec!["Alice", "Bob"]);
    }
}
