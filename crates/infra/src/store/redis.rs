//! Redis-backed remote store (optional).
//!
//! Layout:
//! - one hash per entity class (`printfloor:<class>`), field = storage key,
//!   value = JSON row
//! - one pub/sub channel per class (`printfloor:changes:<class>`) carrying
//!   JSON [`ChangeNotification`]s
//!
//! The atomic primitive is a Lua script, so read, clamp and write happen in
//! one server-side step. Pub/sub is not durable; stations that miss a message
//! catch up on their next poll or re-subscribe.

use std::collections::HashMap;
use std::sync::mpsc;
use std::thread;

use redis::Commands;
use tracing::{debug, warn};

use printfloor_core::EntityClass;
use printfloor_events::{ChangeKind, ChangeNotification, Subscription};

use super::r#trait::{ClassRows, RemoteStore, Row, StoreError};

const KEY_PREFIX: &str = "printfloor";

const ADJUST_SCRIPT: &str = r#"
local raw = redis.call('HGET', KEYS[1], ARGV[1])
local current = 0
if raw then
  local row = cjson.decode(raw)
  current = tonumber(row['quantity']) or 0
end
local next = current + tonumber(ARGV[2])
if next < 0 then next = 0 end
redis.call('HSET', KEYS[1], ARGV[1], cjson.encode({quantity = next}))
if raw then return {next, 1} end
return {next, 0}
"#;

impl From<redis::RedisError> for StoreError {
    fn from(value: redis::RedisError) -> Self {
        StoreError::Backend(value.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct RedisRemoteStore {
    client: redis::Client,
    adjust: redis::Script,
}

impl RedisRemoteStore {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| StoreError::Unavailable(format!("invalid redis url: {e}")))?;
        Ok(Self {
            client,
            adjust: redis::Script::new(ADJUST_SCRIPT),
        })
    }

    fn hash_key(class: EntityClass) -> String {
        format!("{KEY_PREFIX}:{class}")
    }

    fn channel(class: EntityClass) -> String {
        format!("{KEY_PREFIX}:changes:{class}")
    }

    fn connection(&self) -> Result<redis::Connection, StoreError> {
        Ok(self.client.get_connection()?)
    }

    fn notify(&self, conn: &mut redis::Connection, class: EntityClass, key: &str, kind: ChangeKind) {
        let payload = match serde_json::to_string(&ChangeNotification::new(class, key, kind)) {
            Ok(p) => p,
            Err(err) => {
                warn!(class = %class, key, error = %err, "failed to encode change notification");
                return;
            }
        };

        // The write already landed; a lost notification is covered by polling.
        let published: redis::RedisResult<i64> = conn.publish(Self::channel(class), payload);
        if let Err(err) = published {
            debug!(class = %class, key, error = %err, "change notification not published");
        }
    }
}

impl RemoteStore for RedisRemoteStore {
    fn upsert(&self, class: EntityClass, key: &str, row: Row) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        let created: i64 = conn.hset(Self::hash_key(class), key, serde_json::to_string(&row)?)?;

        let kind = if created > 0 {
            ChangeKind::Inserted
        } else {
            ChangeKind::Updated
        };
        self.notify(&mut conn, class, key, kind);
        Ok(())
    }

    fn get(&self, class: EntityClass, key: &str) -> Result<Option<Row>, StoreError> {
        let mut conn = self.connection()?;
        let raw: Option<String> = conn.hget(Self::hash_key(class), key)?;
        raw.map(|r| serde_json::from_str(&r).map_err(StoreError::from))
            .transpose()
    }

    fn snapshot(&self, class: EntityClass) -> Result<ClassRows, StoreError> {
        let mut conn = self.connection()?;
        let raw: HashMap<String, String> = conn.hgetall(Self::hash_key(class))?;

        let mut rows = ClassRows::new();
        for (key, value) in raw {
            rows.insert(key, serde_json::from_str(&value)?);
        }
        Ok(rows)
    }

    fn supports_atomic_adjust(&self) -> bool {
        true
    }

    fn atomic_adjust(&self, class: EntityClass, key: &str, delta: i64) -> Result<u64, StoreError> {
        let mut conn = self.connection()?;
        let (next, existed): (i64, i64) = self
            .adjust
            .key(Self::hash_key(class))
            .arg(key)
            .arg(delta)
            .invoke(&mut conn)?;

        let kind = if existed == 1 {
            ChangeKind::Updated
        } else {
            ChangeKind::Inserted
        };
        self.notify(&mut conn, class, key, kind);
        Ok(next.max(0) as u64)
    }

    fn subscribe(&self, class: EntityClass) -> Result<Subscription<ChangeNotification>, StoreError> {
        let (tx, rx) = mpsc::channel();

        // Connect up front so a misconfigured store fails the subscribe call.
        let mut conn = self.connection()?;
        let channel = Self::channel(class);

        // Exits on connection loss or, after the subscription is dropped, on
        // the next message it fails to forward.
        thread::Builder::new()
            .name(format!("redis-sub-{class}"))
            .spawn(move || {
                let mut pubsub = conn.as_pubsub();
                if let Err(err) = pubsub.subscribe(&channel) {
                    warn!(channel = %channel, error = %err, "redis subscribe failed");
                    return;
                }

                loop {
                    let msg = match pubsub.get_message() {
                        Ok(m) => m,
                        Err(err) => {
                            warn!(channel = %channel, error = %err, "redis subscription lost");
                            return;
                        }
                    };

                    let payload: String = match msg.get_payload() {
                        Ok(p) => p,
                        Err(_) => continue,
                    };

                    let notification: ChangeNotification = match serde_json::from_str(&payload) {
                        Ok(n) => n,
                        Err(_) => continue,
                    };

                    if tx.send(notification).is_err() {
                        return;
                    }
                }
            })
            .map_err(|e| StoreError::Backend(format!("failed to spawn subscriber thread: {e}")))?;

        Ok(Subscription::new(rx))
    }

    fn append_only(&self, class: EntityClass, key: &str, row: Row) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        let created: bool = conn.hset_nx(Self::hash_key(class), key, serde_json::to_string(&row)?)?;
        if !created {
            return Err(StoreError::Duplicate {
                class,
                key: key.to_string(),
            });
        }

        self.notify(&mut conn, class, key, ChangeKind::Inserted);
        Ok(())
    }

    fn remove(&self, class: EntityClass, keys: &[String]) -> Result<usize, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection()?;
        let removed: usize = conn.hdel(Self::hash_key(class), keys)?;

        // HDEL does not say which fields existed; notify for each requested key.
        for key in keys {
            self.notify(&mut conn, class, key, ChangeKind::Deleted);
        }
        Ok(removed)
    }
}
