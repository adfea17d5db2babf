use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ADDRESS: &str = "localhost:19530";
pub const ADDRESS_ENV: &str = "VECLOAD_HOST";

/// Connection settings for one store handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Store address; empty means "resolve from environment".
    pub address: String,
    /// Deadline applied to every call made through the handle.
    #[serde(with = "millis")]
    pub request_timeout: Option<Duration>,
    /// Deadline for index builds and collection loads.
    #[serde(with = "millis")]
    pub task_timeout: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            request_timeout: Some(Duration::from_secs(30)),
            task_timeout: Some(Duration::from_secs(600)),
        }
    }
}

impl ConnectionConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self { address: address.into(), ..Self::default() }
    }

    /// Explicit address, then `VECLOAD_HOST`, then `localhost:19530`.
    pub fn resolved_address(&self) -> String {
        if !self.address.is_empty() {
            return self.address.clone();
        }
        match std::env::var(ADDRESS_ENV) {
            Ok(addr) if !addr.is_empty() => addr,
            _ => DEFAULT_ADDRESS.to_string(),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
