//! Request frequency caps.
//!
//! Each throttle class owns a keyed GCRA limiter. Anonymous callers are
//! keyed by client address and authenticated callers by user id, so the
//! same caller draws from a separate bucket in every class it passes
//! through.

use std::{
    fmt::Display,
    num::NonZeroU32,
    str::FromStr,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use governor::{
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::keyed::DefaultKeyedStateStore,
    Quota, RateLimiter,
};

use crate::auth::Identity;
use crate::error::{AppError, AppResult};

type KeyedLimiter<C> =
    RateLimiter<String, DefaultKeyedStateStore<String>, C, NoOpMiddleware<<C as Clock>::Instant>>;

/// Checks between sweeps of keys whose buckets have fully refilled
const SWEEP_EVERY: u64 = 1024;

/// `<n>/<period>` request allowance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rate {
    pub num_requests: NonZeroU32,
    pub period: Duration,
}

impl FromStr for Rate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (num, period) = s
            .split_once('/')
            .ok_or_else(|| "expected <n>/<period>".to_string())?;

        let num_requests = num
            .trim()
            .parse::<NonZeroU32>()
            .map_err(|_| format!("invalid request count {:?}", num))?;

        // only the leading letter matters: s, sec, second, m, min, minute...
        let period = match period.trim().chars().next() {
            Some('s') => Duration::from_secs(1),
            Some('m') => Duration::from_secs(60),
            Some('h') => Duration::from_secs(60 * 60),
            Some('d') => Duration::from_secs(24 * 60 * 60),
            _ => return Err(format!("invalid period {:?}", period)),
        };

        Ok(Rate {
            num_requests,
            period,
        })
    }
}

impl Rate {
    /// Burst of `num_requests`, replenished evenly over `period`
    pub fn quota(&self) -> Quota {
        let replenish = self.period / self.num_requests.get();
        Quota::with_period(replenish)
            .map(|quota| quota.allow_burst(self.num_requests))
            .unwrap_or_else(|| Quota::per_second(self.num_requests))
    }
}

/// Named buckets for endpoint groups that need their own limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThrottleScope {
    ReviewCreate,
    ReviewList,
    ReviewDetail,
}

impl ThrottleScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThrottleScope::ReviewCreate => "review-create",
            ThrottleScope::ReviewList => "review-list",
            ThrottleScope::ReviewDetail => "review-detail",
        }
    }
}

impl Display for ThrottleScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleClass {
    /// Only anonymous traffic, keyed by client address
    Anon,
    /// Keyed by user id, or client address for anonymous traffic
    User,
    Scoped(ThrottleScope),
}

/// Parsed rates per class; `None` disables the class
#[derive(Debug, Clone, Copy, Default)]
pub struct ThrottleRates {
    pub anon: Option<Rate>,
    pub user: Option<Rate>,
    pub review_create: Option<Rate>,
    pub review_list: Option<Rate>,
    pub review_detail: Option<Rate>,
}

pub struct Throttles<C: Clock = DefaultClock> {
    clock: C,
    anon: Option<KeyedLimiter<C>>,
    user: Option<KeyedLimiter<C>>,
    review_create: Option<KeyedLimiter<C>>,
    review_list: Option<KeyedLimiter<C>>,
    review_detail: Option<KeyedLimiter<C>>,
    checks: AtomicU64,
}

impl Throttles<DefaultClock> {
    pub fn new(rates: ThrottleRates) -> Self {
        Self::with_clock(rates, DefaultClock::default())
    }
}

impl<C: Clock> Throttles<C> {
    pub fn with_clock(rates: ThrottleRates, clock: C) -> Self {
        let build = |rate: Option<Rate>| {
            rate.map(|rate| RateLimiter::dashmap_with_clock(rate.quota(), &clock))
        };

        Self {
            anon: build(rates.anon),
            user: build(rates.user),
            review_create: build(rates.review_create),
            review_list: build(rates.review_list),
            review_detail: build(rates.review_detail),
            checks: AtomicU64::new(0),
            clock,
        }
    }

    fn limiter(&self, class: ThrottleClass) -> Option<&KeyedLimiter<C>> {
        match class {
            ThrottleClass::Anon => self.anon.as_ref(),
            ThrottleClass::User => self.user.as_ref(),
            ThrottleClass::Scoped(ThrottleScope::ReviewCreate) => self.review_create.as_ref(),
            ThrottleClass::Scoped(ThrottleScope::ReviewList) => self.review_list.as_ref(),
            ThrottleClass::Scoped(ThrottleScope::ReviewDetail) => self.review_detail.as_ref(),
        }
    }

    fn limiters(&self) -> impl Iterator<Item = &KeyedLimiter<C>> {
        [
            &self.anon,
            &self.user,
            &self.review_create,
            &self.review_list,
            &self.review_detail,
        ]
        .into_iter()
        .flatten()
    }

    /// Drops keys whose state is indistinguishable from a fresh bucket
    pub fn sweep(&self) {
        for limiter in self.limiters() {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }

    /// Number of keys currently tracked across all classes
    pub fn tracked_keys(&self) -> usize {
        self.limiters().map(|limiter| limiter.len()).sum()
    }

    /// Bucket key for a caller, or `None` when the class does not apply
    fn key(class: ThrottleClass, identity: &Identity, client: &str) -> Option<String> {
        match (class, identity.user()) {
            (ThrottleClass::Anon, Some(_)) => None,
            (ThrottleClass::Anon, None) => Some(format!("anon:{}", client)),
            (_, Some(user)) => Some(format!("user:{}", user.id)),
            (_, None) => Some(format!("ip:{}", client)),
        }
    }

    /// Checks every class, failing with the longest wait among those exceeded
    pub fn check(
        &self,
        classes: &[ThrottleClass],
        identity: &Identity,
        client: &str,
    ) -> AppResult<()> {
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep();
        }

        let mut longest_wait: Option<Duration> = None;

        for &class in classes {
            let (Some(limiter), Some(key)) = (self.limiter(class), Self::key(class, identity, client))
            else {
                continue;
            };

            if let Err(not_until) = limiter.check_key(&key) {
                let wait = not_until.wait_time_from(self.clock.now());
                tracing::warn!(throttle = ?class, key = %key, wait_ms = wait.as_millis() as u64, "Request throttled");
                longest_wait = Some(longest_wait.map_or(wait, |current| current.max(wait)));
            }
        }

        match longest_wait {
            Some(wait) => Err(AppError::Throttled { wait }),
            None => Ok(()),
        }
    }
}
