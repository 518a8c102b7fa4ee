use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::fmt;
use std::hash::BuildHasher;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use zeroize::Zeroizing;

use super::{Otp, OtpDelivery, OtpError};

const SHARD_COUNT: usize = 16;

#[derive(Clone, Debug)]
pub struct OtpSettings {
    pub code_length: usize,
    pub lifetime: Duration,
    pub max_attempts: u32,
    /// How long an expired record may linger before an issuance on the same shard drops it.
    /// Zero disables pruning.
    pub stale_retention: Duration,
}

impl Default for OtpSettings {
    fn default() -> Self {
        Self {
            code_length: 6,
            lifetime: Duration::from_secs(5 * 60),
            max_attempts: 5,
            stale_retention: Duration::from_secs(60 * 60),
        }
    }
}

struct OtpRecord {
    code: Zeroizing<String>,
    expires_at: Instant,
    attempts: u32,
}

impl fmt::Debug for OtpRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtpRecord")
            .field("code", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("attempts", &self.attempts)
            .finish()
    }
}

#[derive(Debug)]
struct OtpShard {
    records: HashMap<String, OtpRecord>,
    last_prune: Instant,
}

impl OtpShard {
    fn new(now: Instant) -> Self {
        Self {
            records: HashMap::new(),
            last_prune: now,
        }
    }

    fn prune_stale(&mut self, now: Instant, retention: Duration) {
        if retention.is_zero() || now.saturating_duration_since(self.last_prune) < retention {
            return;
        }

        self.records
            .retain(|_, record| now.saturating_duration_since(record.expires_at) < retention);
        self.last_prune = now;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedOtp {
    pub email: String,
    pub lifetime: Duration,
}

/// Issues and adjudicates one-time passcodes, one pending code per email address.
///
/// Records live in memory only. They are split across independently locked shards keyed by
/// the normalized email, so every check-then-modify sequence for one address runs under a
/// single lock acquisition. Delivery happens after the lock is released.
pub struct OtpManager {
    settings: OtpSettings,
    delivery: OtpDelivery,
    shards: [Mutex<OtpShard>; SHARD_COUNT],
    hasher: RandomState,
}

impl OtpManager {
    pub fn new(settings: OtpSettings, delivery: OtpDelivery) -> Self {
        let now = Instant::now();

        Self {
            settings,
            delivery,
            shards: std::array::from_fn(|_| Mutex::new(OtpShard::new(now))),
            hasher: RandomState::new(),
        }
    }

    pub fn settings(&self) -> &OtpSettings {
        &self.settings
    }

    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    pub async fn issue(&self, email: &str) -> Result<IssuedOtp, OtpError> {
        self.issue_at(email, Instant::now()).await
    }

    /// Replaces any pending code for `email` with a fresh one and hands it to the delivery
    /// channel. The record is kept even if delivery fails.
    pub async fn issue_at(&self, email: &str, now: Instant) -> Result<IssuedOtp, OtpError> {
        let email = Self::normalize_email(email);
        let code = Zeroizing::new(Otp::generate(self.settings.code_length));

        {
            let mut shard = self.lock_shard(&email);
            shard.prune_stale(now, self.settings.stale_retention);
            shard.records.insert(
                email.clone(),
                OtpRecord {
                    code: code.clone(),
                    expires_at: now + self.settings.lifetime,
                    attempts: 0,
                },
            );
        }

        if let Err(e) = self.delivery.deliver(&email, &code).await {
            log::error!("Failed to deliver OTP to {email}: {e}");
            return Err(OtpError::DeliveryFailed(e));
        }

        Ok(IssuedOtp {
            email,
            lifetime: self.settings.lifetime,
        })
    }

    pub fn verify(&self, email: &str, code: &str) -> Result<(), OtpError> {
        self.verify_at(email, code, Instant::now())
    }

    /// Checks are applied in a fixed order: expiry, then the attempt ceiling, then the code
    /// itself. Every outcome except `Mismatch` consumes the record.
    pub fn verify_at(&self, email: &str, code: &str, now: Instant) -> Result<(), OtpError> {
        let email = Self::normalize_email(email);
        let mut shard = self.lock_shard(&email);

        let outcome = match shard.records.get_mut(&email) {
            None => return Err(OtpError::NotFound),
            // Inclusive at the boundary so a zero lifetime is expired on arrival
            Some(record) if now >= record.expires_at => Err(OtpError::Expired),
            Some(record) if record.attempts >= self.settings.max_attempts => {
                log::warn!("OTP for {email} invalidated after too many failed attempts");
                Err(OtpError::TooManyAttempts)
            }
            Some(record) if !Otp::are_equal(code, &record.code) => {
                record.attempts += 1;
                return Err(OtpError::Mismatch);
            }
            Some(_) => Ok(()),
        };

        shard.records.remove(&email);
        outcome
    }

    pub fn has_pending(&self, email: &str) -> bool {
        let email = Self::normalize_email(email);
        self.lock_shard(&email).records.contains_key(&email)
    }

    fn lock_shard(&self, normalized_email: &str) -> MutexGuard<'_, OtpShard> {
        let index = (self.hasher.hash_one(normalized_email) % SHARD_COUNT as u64) as usize;

        // A panic mid-operation can't leave a record half-written, so a poisoned shard is
        // still usable
        self.shards[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use crate::email::EmailError;
    use crate::otp::{DeliverOtp, DeliveryError};

    #[derive(Clone, Default)]
    struct CapturingDelivery {
        codes: Arc<Mutex<HashMap<String, String>>>,
        fail: Arc<AtomicBool>,
    }

    impl CapturingDelivery {
        fn code_for(&self, address: &str) -> String {
            self.codes.lock().unwrap().get(address).cloned().unwrap()
        }
    }

    #[async_trait]
    impl DeliverOtp for CapturingDelivery {
        async fn deliver(&self, address: &str, code: &str) -> Result<(), DeliveryError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(DeliveryError::Email(EmailError::RelayConnectionFailed(
                    String::from("relay down"),
                )));
            }

            self.codes
                .lock()
                .unwrap()
                .insert(String::from(address), String::from(code));
            Ok(())
        }
    }

    fn manager_with(settings: OtpSettings) -> (OtpManager, CapturingDelivery) {
        let delivery = CapturingDelivery::default();
        let manager = OtpManager::new(settings, Box::new(delivery.clone()));
        (manager, delivery)
    }

    fn tokio_test_runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
    }

    fn wrong_code_for(code: &str) -> String {
        if code == "000000" {
            String::from("111111")
        } else {
            String::from("000000")
        }
    }

    #[tokio::test]
    async fn test_issue_then_verify_once() {
        let (manager, delivery) = manager_with(OtpSettings::default());

        let issued = manager.issue("a@x.com").await.unwrap();
        assert_eq!(issued.email, "a@x.com");
        assert_eq!(issued.lifetime, Duration::from_secs(300));

        let code = delivery.code_for("a@x.com");
        assert_eq!(code.len(), 6);
        assert!(code.bytes().all(|b| b.is_ascii_digit()));

        assert!(matches!(
            manager.verify("a@x.com", &wrong_code_for(&code)),
            Err(OtpError::Mismatch)
        ));
        assert!(manager.has_pending("a@x.com"));

        manager.verify("a@x.com", &code).unwrap();
        assert!(!manager.has_pending("a@x.com"));

        assert!(matches!(
            manager.verify("a@x.com", &code),
            Err(OtpError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_verify_without_issue() {
        let (manager, _) = manager_with(OtpSettings::default());

        assert!(matches!(
            manager.verify("nobody@x.com", "123456"),
            Err(OtpError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_reissue_invalidates_previous_code() {
        let (manager, delivery) = manager_with(OtpSettings::default());

        manager.issue("a@x.com").await.unwrap();
        let first_code = delivery.code_for("a@x.com");

        let mut second_code = first_code.clone();
        while second_code == first_code {
            manager.issue("a@x.com").await.unwrap();
            second_code = delivery.code_for("a@x.com");
        }

        assert!(matches!(
            manager.verify("a@x.com", &first_code),
            Err(OtpError::Mismatch)
        ));
        manager.verify("a@x.com", &second_code).unwrap();
    }

    #[tokio::test]
    async fn test_reissue_resets_attempts() {
        let (manager, delivery) = manager_with(OtpSettings::default());

        manager.issue("a@x.com").await.unwrap();
        let code = delivery.code_for("a@x.com");
        for _ in 0..5 {
            let _ = manager.verify("a@x.com", &wrong_code_for(&code));
        }

        manager.issue("a@x.com").await.unwrap();
        let code = delivery.code_for("a@x.com");
        manager.verify("a@x.com", &code).unwrap();
    }

    #[tokio::test]
    async fn test_attempt_ceiling() {
        let (manager, delivery) = manager_with(OtpSettings::default());

        manager.issue("a@x.com").await.unwrap();
        let code = delivery.code_for("a@x.com");
        let wrong_code = wrong_code_for(&code);

        for _ in 0..5 {
            assert!(matches!(
                manager.verify("a@x.com", &wrong_code),
                Err(OtpError::Mismatch)
            ));
        }

        assert!(matches!(
            manager.verify("a@x.com", &code),
            Err(OtpError::TooManyAttempts)
        ));
        assert!(matches!(
            manager.verify("a@x.com", &code),
            Err(OtpError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_configurable_attempt_ceiling() {
        let (manager, delivery) = manager_with(OtpSettings {
            max_attempts: 1,
            ..OtpSettings::default()
        });

        manager.issue("a@x.com").await.unwrap();
        let code = delivery.code_for("a@x.com");

        assert!(matches!(
            manager.verify("a@x.com", &wrong_code_for(&code)),
            Err(OtpError::Mismatch)
        ));
        assert!(matches!(
            manager.verify("a@x.com", &code),
            Err(OtpError::TooManyAttempts)
        ));
    }

    #[tokio::test]
    async fn test_expired_code_rejected_even_if_correct() {
        let (manager, delivery) = manager_with(OtpSettings::default());
        let issued_at = Instant::now();

        manager.issue_at("a@x.com", issued_at).await.unwrap();
        let code = delivery.code_for("a@x.com");

        let lifetime = manager.settings().lifetime;

        assert!(matches!(
            manager.verify_at("a@x.com", &code, issued_at + lifetime),
            Err(OtpError::Expired)
        ));
        assert!(matches!(
            manager.verify_at("a@x.com", &code, issued_at),
            Err(OtpError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_code_accepted_just_before_expiry() {
        let (manager, delivery) = manager_with(OtpSettings::default());
        let issued_at = Instant::now();

        manager.issue_at("a@x.com", issued_at).await.unwrap();
        let code = delivery.code_for("a@x.com");

        let almost_expired = issued_at + manager.settings().lifetime - Duration::from_millis(1);
        manager.verify_at("a@x.com", &code, almost_expired).unwrap();
    }

    #[tokio::test]
    async fn test_expiry_takes_precedence_over_attempt_ceiling() {
        let (manager, delivery) = manager_with(OtpSettings::default());
        let issued_at = Instant::now();

        manager.issue_at("a@x.com", issued_at).await.unwrap();
        let code = delivery.code_for("a@x.com");

        for _ in 0..5 {
            let _ = manager.verify_at("a@x.com", &wrong_code_for(&code), issued_at);
        }

        let after_expiry = issued_at + manager.settings().lifetime + Duration::from_secs(1);
        assert!(matches!(
            manager.verify_at("a@x.com", &code, after_expiry),
            Err(OtpError::Expired)
        ));
        assert!(!manager.has_pending("a@x.com"));
    }

    #[tokio::test]
    async fn test_zero_lifetime_expires_immediately() {
        let (manager, delivery) = manager_with(OtpSettings {
            lifetime: Duration::ZERO,
            ..OtpSettings::default()
        });

        manager.issue("a@x.com").await.unwrap();
        let code = delivery.code_for("a@x.com");

        assert!(matches!(
            manager.verify("a@x.com", &code),
            Err(OtpError::Expired)
        ));
    }

    #[tokio::test]
    async fn test_configurable_code_length() {
        let (manager, delivery) = manager_with(OtpSettings {
            code_length: 4,
            ..OtpSettings::default()
        });

        manager.issue("a@x.com").await.unwrap();
        let code = delivery.code_for("a@x.com");

        assert_eq!(code.len(), 4);
        assert!(code.bytes().all(|b| b.is_ascii_digit()));
        manager.verify("a@x.com", &code).unwrap();
    }

    #[tokio::test]
    async fn test_wrong_length_code_counts_as_attempt() {
        let (manager, delivery) = manager_with(OtpSettings {
            max_attempts: 2,
            ..OtpSettings::default()
        });

        manager.issue("a@x.com").await.unwrap();
        let code = delivery.code_for("a@x.com");

        assert!(matches!(
            manager.verify("a@x.com", &code[..5]),
            Err(OtpError::Mismatch)
        ));
        assert!(matches!(
            manager.verify("a@x.com", ""),
            Err(OtpError::Mismatch)
        ));
        assert!(matches!(
            manager.verify("a@x.com", &code),
            Err(OtpError::TooManyAttempts)
        ));
    }

    #[tokio::test]
    async fn test_email_is_normalized() {
        let (manager, delivery) = manager_with(OtpSettings::default());

        let issued = manager.issue("  Someone@Example.COM ").await.unwrap();
        assert_eq!(issued.email, "someone@example.com");

        let code = delivery.code_for("someone@example.com");
        assert!(manager.has_pending("SOMEONE@example.com"));
        manager.verify("someone@EXAMPLE.com", &code).unwrap();
    }

    #[tokio::test]
    async fn test_addresses_are_independent() {
        let (manager, delivery) = manager_with(OtpSettings::default());

        manager.issue("a@x.com").await.unwrap();
        manager.issue("b@x.com").await.unwrap();

        let code_a = delivery.code_for("a@x.com");
        let code_b = delivery.code_for("b@x.com");

        for _ in 0..5 {
            let _ = manager.verify("a@x.com", &wrong_code_for(&code_a));
        }

        manager.verify("b@x.com", &code_b).unwrap();
        assert!(matches!(
            manager.verify("a@x.com", &code_a),
            Err(OtpError::TooManyAttempts)
        ));
    }

    #[tokio::test]
    async fn test_delivery_failure_keeps_record() {
        let (manager, delivery) = manager_with(OtpSettings::default());
        delivery.fail.store(true, Ordering::SeqCst);

        assert!(matches!(
            manager.issue("a@x.com").await,
            Err(OtpError::DeliveryFailed(_))
        ));
        assert!(manager.has_pending("a@x.com"));

        delivery.fail.store(false, Ordering::SeqCst);
        manager.issue("a@x.com").await.unwrap();
        let code = delivery.code_for("a@x.com");
        manager.verify("a@x.com", &code).unwrap();
    }

    #[test]
    fn test_concurrent_verification_succeeds_once() {
        let (manager, delivery) = manager_with(OtpSettings::default());

        tokio_test_runtime().block_on(manager.issue("a@x.com")).unwrap();
        let code = delivery.code_for("a@x.com");

        let successes = std::thread::scope(|s| {
            let handles = (0..8)
                .map(|_| s.spawn(|| manager.verify("a@x.com", &code).is_ok()))
                .collect::<Vec<_>>();

            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count()
        });

        assert_eq!(successes, 1);
    }

    #[test]
    fn test_concurrent_mismatches_are_all_counted() {
        let (manager, delivery) = manager_with(OtpSettings {
            max_attempts: 8,
            ..OtpSettings::default()
        });

        tokio_test_runtime().block_on(manager.issue("a@x.com")).unwrap();
        let code = delivery.code_for("a@x.com");
        let wrong_code = wrong_code_for(&code);

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let _ = manager.verify("a@x.com", &wrong_code);
                });
            }
        });

        assert!(matches!(
            manager.verify("a@x.com", &code),
            Err(OtpError::TooManyAttempts)
        ));
    }

    #[test]
    fn test_record_debug_hides_code() {
        let record = OtpRecord {
            code: Zeroizing::new(String::from("845120")),
            expires_at: Instant::now(),
            attempts: 0,
        };

        assert!(!format!("{record:?}").contains("845120"));
    }

    #[test]
    fn test_prune_drops_only_long_expired_records() {
        let start = Instant::now();
        let retention = Duration::from_secs(60 * 60);
        let mut shard = OtpShard::new(start);

        let record = |expires_at| OtpRecord {
            code: Zeroizing::new(String::from("123456")),
            expires_at,
            attempts: 0,
        };

        shard.records.insert(String::from("stale@x.com"), record(start));
        shard.records.insert(
            String::from("recent@x.com"),
            record(start + Duration::from_secs(30 * 60)),
        );
        shard.records.insert(
            String::from("live@x.com"),
            record(start + retention + Duration::from_secs(60)),
        );

        // Too soon since the last prune; nothing happens
        shard.prune_stale(start + Duration::from_secs(60), retention);
        assert_eq!(shard.records.len(), 3);

        let later = start + retention + Duration::from_secs(1);
        shard.prune_stale(later, retention);

        assert!(!shard.records.contains_key("stale@x.com"));
        assert!(shard.records.contains_key("recent@x.com"));
        assert!(shard.records.contains_key("live@x.com"));
        assert_eq!(shard.last_prune, later);
    }

    #[tokio::test]
    async fn test_issue_prunes_long_expired_records() {
        let (manager, delivery) = manager_with(OtpSettings::default());
        let lifetime = manager.settings().lifetime;
        let retention = manager.settings().stale_retention;

        let start = Instant::now();
        manager.issue_at("stale@x.com", start).await.unwrap();
        let stale_code = delivery.code_for("stale@x.com");

        let recent_issued_at = start + retention;
        manager
            .issue_at("recent@x.com", recent_issued_at)
            .await
            .unwrap();
        let recent_code = delivery.code_for("recent@x.com");

        // Past the retention window for the stale record, but not for the recent one
        let later = recent_issued_at + retention + Duration::from_secs(60);
        assert!(later.saturating_duration_since(start + lifetime) > retention);
        assert!(later.saturating_duration_since(recent_issued_at + lifetime) < retention);

        // Enough issuances to touch every shard
        for i in 0..400 {
            manager
                .issue_at(&format!("trigger{i}@x.com"), later)
                .await
                .unwrap();
        }

        assert!(matches!(
            manager.verify_at("stale@x.com", &stale_code, later),
            Err(OtpError::NotFound)
        ));
        assert!(matches!(
            manager.verify_at("recent@x.com", &recent_code, later),
            Err(OtpError::Expired)
        ));
    }

    #[test]
    fn test_zero_retention_disables_pruning() {
        let start = Instant::now();
        let mut shard = OtpShard::new(start);

        shard.records.insert(
            String::from("stale@x.com"),
            OtpRecord {
                code: Zeroizing::new(String::from("123456")),
                expires_at: start,
                attempts: 0,
            },
        );

        shard.prune_stale(start + Duration::from_secs(24 * 60 * 60), Duration::ZERO);
        assert_eq!(shard.records.len(), 1);
    }
}
