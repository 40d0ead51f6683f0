//! Redis-backed counter store.
//!
//! Shares window counters across every Gatekeeper instance pointed at the
//! same Redis. The charge-and-check is a single Lua script, so Redis runs it
//! without interleaving any other command on the key.
//!
//! ## Key lifecycle
//!
//! - An absent key is created with `SET key 0 EX window` inside the script
//! - `INCRBY` preserves the TTL, so the window never gets re-armed by a charge
//! - A key found without a TTL (written by something else) is re-armed
//!   rather than left to live forever
//!
//! Every call is bounded by `call_timeout`; a timeout or connection failure
//! surfaces as [`GatekeeperError::StoreUnavailable`].

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use tracing::debug;

use super::backend::{ChargeOutcome, CounterStore};
use super::key::WindowKey;
use super::policy::MAX_WINDOW_SECONDS;
use crate::error::{GatekeeperError, Result};

/// Lua script: fixed-window charge-and-check.
///
/// KEYS[1] counter key; ARGV[1] cost; ARGV[2] limit; ARGV[3] window seconds.
/// Returns `{allowed (1/0), count, ttl}`.
static CHARGE_SCRIPT: &str = r#"
local key = KEYS[1]
local cost = tonumber(ARGV[1])
local limit = tonumber(ARGV[2])
local window = tonumber(ARGV[3])

local current = redis.call('GET', key)
if not current then
    redis.call('SET', key, 0, 'EX', window)
    current = 0
else
    current = tonumber(current)
end

local ttl = redis.call('TTL', key)
if ttl < 0 then
    redis.call('EXPIRE', key, window)
    ttl = window
end

if current + cost > limit then
    return {0, current, ttl}
end

local updated = redis.call('INCRBY', key, cost)
return {1, updated, ttl}
"#;

/// Default bound on a single store round trip.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(250);

/// Counter store backed by Redis.
#[derive(Clone)]
pub struct RedisCounterStore {
    connection: ConnectionManager,
    script: Script,
    call_timeout: Duration,
}

impl fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCounterStore")
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl RedisCounterStore {
    /// Connect with the default call timeout.
    ///
    /// # Errors
    /// Returns `StoreUnavailable` if the URL is invalid or Redis is unreachable.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_timeout(url, DEFAULT_CALL_TIMEOUT).await
    }

    /// Connect with a custom call timeout.
    pub async fn connect_with_timeout(url: &str, call_timeout: Duration) -> Result<Self> {
        let client = Client::open(url)?;
        let connection = bounded(call_timeout, ConnectionManager::new(client)).await?;

        Ok(Self {
            connection,
            script: Script::new(CHARGE_SCRIPT),
            call_timeout,
        })
    }

    async fn with_timeout<T>(
        &self,
        op: impl Future<Output = redis::RedisResult<T>>,
    ) -> Result<T> {
        bounded(self.call_timeout, op).await
    }
}

async fn bounded<T>(
    limit: Duration,
    op: impl Future<Output = redis::RedisResult<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, op).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(GatekeeperError::StoreUnavailable(format!(
            "redis call exceeded {}ms",
            limit.as_millis()
        ))),
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn charge_if_under_limit(
        &self,
        key: &WindowKey,
        cost: u64,
        limit: u64,
        window_seconds: u64,
    ) -> Result<ChargeOutcome> {
        let window_seconds = window_seconds.min(MAX_WINDOW_SECONDS);
        let mut conn = self.connection.clone();
        let mut invocation = self.script.key(key.as_str());
        invocation.arg(cost).arg(limit).arg(window_seconds);

        let values: Vec<i64> = self
            .with_timeout(invocation.invoke_async(&mut conn))
            .await?;

        let &[allowed, count, ttl] = values.as_slice() else {
            return Err(GatekeeperError::StoreUnavailable(format!(
                "unexpected charge script reply of length {}",
                values.len()
            )));
        };

        debug!(key = %key, allowed, count, ttl, "Redis charge result");

        Ok(ChargeOutcome {
            allowed: allowed == 1,
            new_count: count.max(0) as u64,
            ttl_seconds: ttl.clamp(0, window_seconds as i64) as u64,
        })
    }

    async fn get(&self, key: &WindowKey) -> Result<Option<u64>> {
        let mut conn = self.connection.clone();
        self.with_timeout(conn.get::<_, Option<u64>>(key.as_str()))
            .await
    }

    async fn ttl(&self, key: &WindowKey) -> Result<Option<u64>> {
        let mut conn = self.connection.clone();
        let ttl: i64 = self.with_timeout(conn.ttl(key.as_str())).await?;
        // -2: absent, -1: present without expiry
        Ok(match ttl {
            -2 => None,
            t => Some(t.max(0) as u64),
        })
    }

    async fn exists(&self, key: &WindowKey) -> Result<bool> {
        let mut conn = self.connection.clone();
        self.with_timeout(conn.exists(key.as_str())).await
    }
}
