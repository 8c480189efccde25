// SPDX-FileCopyrightText: 2026 Outbound Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-day recipient-domain concentration limits.

use std::sync::Arc;

use chrono::NaiveDate;

use outbound_core::OutboundError;
use outbound_core::types::domain_of;
use outbound_storage::Database;
use outbound_storage::queries::domains;
use outbound_timing::{Clock, LocalClock};
use tracing::{debug, info};

/// Free-mail providers. These are not single organizations, so they get a
/// much higher daily cap.
const WEBMAIL_PROVIDERS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "outlook.com",
    "hotmail.com",
    "live.com",
    "msn.com",
    "yahoo.com",
    "ymail.com",
    "rocketmail.com",
    "aol.com",
    "aim.com",
    "icloud.com",
    "me.com",
    "mac.com",
    "protonmail.com",
    "proton.me",
    "zoho.com",
    "zohomail.com",
    "fastmail.com",
    "mail.com",
    "email.com",
    "gmx.com",
    "gmx.net",
    "yandex.com",
    "yandex.ru",
    "tutanota.com",
    "tuta.io",
];

/// Whether `domain` is a free-mail provider.
pub fn is_webmail(domain: &str) -> bool {
    WEBMAIL_PROVIDERS.contains(&domain)
}

/// One reserved send towards a recipient domain's daily count. Empty for
/// addresses without a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainSlot {
    day: NaiveDate,
    domain: String,
}

impl DomainSlot {
    pub fn domain(&self) -> &str {
        &self.domain
    }
}

/// Counts sends per recipient domain per local day and enforces the cap.
#[derive(Clone)]
pub struct DomainTracker {
    db: Database,
    clock: Arc<dyn Clock>,
    local: LocalClock,
    max_per_domain: u32,
    webmail_multiplier: u32,
}

impl DomainTracker {
    pub fn new(
        db: Database,
        clock: Arc<dyn Clock>,
        local: LocalClock,
        max_per_domain: u32,
        webmail_multiplier: u32,
    ) -> Self {
        Self {
            db,
            clock,
            local,
            max_per_domain,
            webmail_multiplier,
        }
    }

    /// Daily cap for `domain`.
    pub fn limit_for(&self, domain: &str) -> u32 {
        if is_webmail(domain) {
            self.max_per_domain.saturating_mul(self.webmail_multiplier)
        } else {
            self.max_per_domain
        }
    }

    fn today(&self) -> NaiveDate {
        self.local.local_date(self.clock.now())
    }

    /// Whether another message may go to `address`'s domain today.
    /// Addresses without a domain are never throttled.
    pub async fn can_send_to(&self, address: &str) -> Result<bool, OutboundError> {
        let domain = domain_of(address);
        if domain.is_empty() {
            return Ok(true);
        }
        let current = domains::count(&self.db, self.today(), &domain).await?;
        let limit = self.limit_for(&domain);
        let allowed = current < limit;
        if !allowed {
            info!(%domain, current, limit, "recipient domain throttled");
        }
        Ok(allowed)
    }

    /// Take one of today's slots for `address`'s domain. The check and the
    /// count happen in one statement, so concurrent senders cannot overshoot
    /// the cap. `None` means the domain is full.
    pub async fn reserve(&self, address: &str) -> Result<Option<DomainSlot>, OutboundError> {
        let domain = domain_of(address);
        let day = self.today();
        if domain.is_empty() {
            return Ok(Some(DomainSlot { day, domain }));
        }
        let limit = self.limit_for(&domain);
        match domains::reserve(&self.db, day, &domain, limit).await? {
            Some(count) => {
                debug!(%domain, count, limit, "domain slot reserved");
                Ok(Some(DomainSlot { day, domain }))
            }
            None => {
                info!(%domain, limit, "recipient domain throttled");
                Ok(None)
            }
        }
    }

    /// Hand back a slot whose send never happened.
    pub async fn unreserve(&self, slot: DomainSlot) -> Result<(), OutboundError> {
        if slot.domain.is_empty() {
            return Ok(());
        }
        domains::unreserve(&self.db, slot.day, &slot.domain).await?;
        debug!(domain = %slot.domain, "domain slot returned");
        Ok(())
    }

    /// Domains that have reached today's cap.
    pub async fn saturated_domains(&self) -> Result<Vec<String>, OutboundError> {
        let counts = domains::counts_for_day(&self.db, self.today()).await?;
        let saturated: Vec<String> = counts
            .into_iter()
            .filter(|(domain, count)| *count >= self.limit_for(domain))
            .map(|(domain, _)| domain)
            .collect();
        if !saturated.is_empty() {
            debug!(count = saturated.len(), "saturated recipient domains");
        }
        Ok(saturated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    struct Fixed(DateTime<Utc>);

    impl Clock for Fixed {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    async fn tracker(max: u32) -> (DomainTracker, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let clock = Arc::new(Fixed(Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap()));
        (DomainTracker::new(db, clock, LocalClock::default(), max, 10), dir)
    }

    #[tokio::test]
    async fn company_domain_saturates_at_max() {
        let (tracker, _dir) = tracker(2).await;
        assert!(tracker.can_send_to("a@acme.com").await.unwrap());
        assert!(tracker.reserve("a@acme.com").await.unwrap().is_some());
        assert!(tracker.reserve("b@ACME.com").await.unwrap().is_some());
        assert!(!tracker.can_send_to("c@acme.com").await.unwrap());
        assert!(tracker.reserve("c@acme.com").await.unwrap().is_none());
        assert_eq!(tracker.saturated_domains().await.unwrap(), vec!["acme.com"]);
    }

    #[tokio::test]
    async fn returned_slot_frees_the_domain() {
        let (tracker, _dir) = tracker(1).await;
        let slot = tracker.reserve("a@acme.com").await.unwrap().unwrap();
        assert_eq!(slot.domain(), "acme.com");
        assert_eq!(tracker.saturated_domains().await.unwrap(), vec!["acme.com"]);

        tracker.unreserve(slot).await.unwrap();
        assert!(tracker.saturated_domains().await.unwrap().is_empty());
        assert!(tracker.can_send_to("b@acme.com").await.unwrap());
    }

    #[tokio::test]
    async fn webmail_gets_multiplied_cap() {
        let (tracker, _dir) = tracker(2).await;
        assert_eq!(tracker.limit_for("gmail.com"), 20);
        for i in 0..5 {
            assert!(tracker.reserve(&format!("u{i}@gmail.com")).await.unwrap().is_some());
        }
        assert!(tracker.can_send_to("x@gmail.com").await.unwrap());
        assert!(tracker.saturated_domains().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn address_without_domain_is_never_throttled() {
        let (tracker, _dir) = tracker(1).await;
        for _ in 0..3 {
            let slot = tracker.reserve("nobody").await.unwrap().unwrap();
            assert_eq!(slot.domain(), "");
        }
        assert!(tracker.can_send_to("nobody").await.unwrap());
        assert!(tracker.saturated_domains().await.unwrap().is_empty());
    }
}
