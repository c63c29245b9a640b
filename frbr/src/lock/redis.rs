//! Redis-backed lock service.
//!
//! Locks are plain keys written with `SET NX PX`, holding a random token.
//! Release runs a compare-and-delete script so a lease that expired and was
//! re-acquired elsewhere is never deleted by the original holder.

use fred::interfaces::LuaInterface;
use fred::prelude::{
    ClientLike, EventInterface, KeysInterface, Pool, ReconnectPolicy, Server, ServerConfig,
};
use fred::types::{Builder, Expiration, SetOptions};
use futures::future::join_all;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

use crate::error::{ErrorKind, FrbrError, FrbrResult};
use crate::frbr_error;
use crate::lock::{LockLease, LockService};

const RELEASE_SCRIPT: &str = r#"
if redis.call('get', KEYS[1]) == ARGV[1] then
    return redis.call('del', KEYS[1])
else
    return 0
end
"#;

/// Connection settings for the Redis lock backend.
#[derive(Debug, Clone)]
pub struct RedisLockConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Production lock service backed by a Redis connection pool.
#[derive(Clone)]
pub struct RedisLockService {
    client: Pool,
}

impl RedisLockService {
    pub async fn connect(config: RedisLockConfig) -> FrbrResult<Self> {
        let client = Builder::default_centralized()
            .with_config(|redis_config| {
                redis_config.username = config.username;
                redis_config.password = config.password;
                redis_config.server = ServerConfig::Centralized {
                    server: Server::new(config.host, config.port),
                };
            })
            .with_performance_config(|config| {
                config.default_command_timeout = Duration::from_secs(5);
            })
            .set_policy(ReconnectPolicy::new_exponential(0, 1, 2000, 5))
            .build_pool(5)
            .map_err(lock_failed)?;

        for pool_client in client.clients() {
            let mut error_rx = pool_client.error_rx();

            tokio::spawn(async move {
                loop {
                    match error_rx.recv().await {
                        Ok((error, server)) => {
                            tracing::error!(?server, ?error, "redis lock client error");
                        }
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    }
                }
            });
        }

        let client_handles = client.connect_pool();
        client.wait_for_connect().await.map_err(lock_failed)?;

        tokio::spawn(async move {
            let _results = join_all(client_handles).await;
        });

        Ok(Self { client })
    }
}

fn lock_failed(err: fred::error::Error) -> FrbrError {
    frbr_error!(
        ErrorKind::LockServiceFailed,
        "Redis lock operation failed",
        source: err
    )
}

impl LockService for RedisLockService {
    async fn try_acquire(&self, key: &str, ttl: Duration) -> FrbrResult<Option<LockLease>> {
        let token = Uuid::new_v4();

        let reply: Option<String> = self
            .client
            .set(
                key,
                token.to_string(),
                Some(Expiration::PX(ttl.as_millis() as i64)),
                Some(SetOptions::NX),
                false,
            )
            .await
            .map_err(lock_failed)?;

        Ok(reply.map(|_| LockLease {
            key: key.to_string(),
            token,
        }))
    }

    async fn any_locked(&self, keys: &[String]) -> FrbrResult<bool> {
        if keys.is_empty() {
            return Ok(false);
        }

        let held: i64 = self
            .client
            .exists(keys.to_vec())
            .await
            .map_err(lock_failed)?;

        Ok(held > 0)
    }

    async fn release(&self, lease: &LockLease) -> FrbrResult<()> {
        let _deleted: i64 = self
            .client
            .eval(
                RELEASE_SCRIPT,
                vec![lease.key.clone()],
                vec![lease.token.to_string()],
            )
            .await
            .map_err(lock_failed)?;

        Ok(())
    }
}
