//! Domain entities owned by the registries: media proxies, connections,
//! multipoint groups, bridges, plus the SDK config model and the port mask.
//!
//! Entities cross registry boundaries by id only. Copies handed to readers
//! are deep on every mutable field (`Clone` on these types clones statuses,
//! configs and id lists), so a reader can never mutate registry state.

mod bridge;
mod conn;
mod group;
pub mod port_mask;
mod proxy;
pub mod sdk;

pub use bridge::{Bridge, BridgeConfig, BridgeRdmaConfig, BridgeSt2110Config, BridgeTargetConfig, BridgeType};
pub use conn::{ConnKind, Connection, ConnectionConfig, ConnectionStatus};
pub use group::{MultipointGroup, MultipointGroupConfig};
pub use port_mask::PortMask;
pub use proxy::{
    CommandRequest, CommandResult, CommandRouter, MediaProxy, MediaProxyConfig, MediaProxyStatus,
    ProxyChannel, RdmaProxyConfig, St2110ProxyConfig,
};

/// Serializes timestamps the way the web UI expects them: RFC 3339 with
/// exactly three fractional digits.
pub mod time_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }

    pub mod opt {
        use super::*;

        pub fn serialize<S: Serializer>(
            dt: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => super::serialize(dt, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            let raw = Option::<String>::deserialize(d)?;
            raw.map(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
        }
    }
}
