//! # Normalized SDK connection descriptor.
//!
//! [`SdkConnectionConfig`] is the agent-side form of the configuration an
//! application SDK attaches to a connection: buffer layout, exactly one
//! transport selector, exactly one payload selector, RDMA options. The
//! "exactly one of" invariants from the wire format are enforced by
//! construction ([`SdkConn`], [`SdkPayload`] are enums).
//!
//! A bijection with the wire form lives in [`from_wire`] / [`to_wire`]
//! (see [`crate::api::wire`]); [`check_payload_compatibility`] is the
//! pairwise predicate that gates multipoint-group membership.
//!
//! [`from_wire`]: SdkConnectionConfig::from_wire
//! [`to_wire`]: SdkConnectionConfig::to_wire
//! [`check_payload_compatibility`]: SdkConnectionConfig::check_payload_compatibility

use serde::{Deserialize, Serialize};

use crate::api::wire;
use crate::error::AgentError;

/// Transport family of a connection, derived from its selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnType {
    Group,
    St2110,
    Rdma,
}

impl std::fmt::Display for ConnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnType::Group => write!(f, "group"),
            ConnType::St2110 => write!(f, "st2110"),
            ConnType::Rdma => write!(f, "rdma"),
        }
    }
}

/// ST 2110 transport profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum St2110Transport {
    #[serde(rename = "st2110-20")]
    St2110_20,
    #[serde(rename = "st2110-22")]
    St2110_22,
    #[serde(rename = "st2110-30")]
    St2110_30,
}

impl std::fmt::Display for St2110Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            St2110Transport::St2110_20 => write!(f, "st2110-20"),
            St2110Transport::St2110_22 => write!(f, "st2110-22"),
            St2110Transport::St2110_30 => write!(f, "st2110-30"),
        }
    }
}

/// Video pixel layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VideoPixelFormat {
    #[serde(rename = "yuv422p10le")]
    Yuv422p10le,
    #[serde(rename = "yuv422p10rfc4175")]
    Yuv422p10Rfc4175,
    #[serde(rename = "yuv444p10le")]
    Yuv444p10le,
    #[serde(rename = "v210")]
    V210,
    #[serde(rename = "rgb8")]
    Rgb8,
}

/// Audio sample rate, canonical form is the plain decimal rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioSampleRate {
    #[serde(rename = "44100")]
    R44100,
    #[serde(rename = "48000")]
    R48000,
    #[serde(rename = "96000")]
    R96000,
}

/// Audio sample format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    #[serde(rename = "pcm-s8")]
    PcmS8,
    #[serde(rename = "pcm-s16be")]
    PcmS16Be,
    #[serde(rename = "pcm-s24be")]
    PcmS24Be,
}

/// Audio packetization interval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioPacketTime {
    #[serde(rename = "1ms")]
    P1Ms,
    #[serde(rename = "125us")]
    P125Us,
    #[serde(rename = "250us")]
    P250Us,
    #[serde(rename = "333us")]
    P333Us,
    #[serde(rename = "4ms")]
    P4Ms,
    #[serde(rename = "80us")]
    P80Us,
    #[serde(rename = "1.09ms")]
    P1_09Ms,
}

/// One region of the SDK's shared buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkBufferPartition {
    pub offset: u32,
    pub size: u32,
}

/// Payload / metadata / sysdata split of the shared buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkBufferPartitions {
    pub payload: SdkBufferPartition,
    pub metadata: SdkBufferPartition,
    pub sysdata: SdkBufferPartition,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkMultipointGroupConfig {
    pub urn: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkSt2110Config {
    pub remote_ip_addr: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mcast_sip_addr: String,
    pub transport: St2110Transport,
    pub pacing: String,
    pub payload_type: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkRdmaConfig {
    pub connection_mode: String,
    pub max_latency_ns: u32,
}

/// Transport selector. Exactly one variant per connection, by construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SdkConn {
    MultipointGroup(SdkMultipointGroupConfig),
    St2110(SdkSt2110Config),
    Rdma(SdkRdmaConfig),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkRdmaOptions {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider: String,
    #[serde(default)]
    pub num_endpoints: u8,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkConnectionOptions {
    #[serde(default)]
    pub rdma: SdkRdmaOptions,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkVideoConfig {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub pixel_format: VideoPixelFormat,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkAudioConfig {
    pub channels: u32,
    pub sample_rate: AudioSampleRate,
    pub format: AudioFormat,
    pub packet_time: AudioPacketTime,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkBlobConfig {}

/// Payload selector. Exactly one variant per connection, by construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SdkPayload {
    Video(SdkVideoConfig),
    Audio(SdkAudioConfig),
    Blob(SdkBlobConfig),
}

/// Normalized SDK connection configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SdkConnectionConfig {
    pub buf_queue_capacity: u32,
    pub max_payload_size: u32,
    pub max_metadata_size: u32,
    pub calculated_payload_size: u32,
    #[serde(rename = "bufPartitions")]
    pub buf_parts: SdkBufferPartitions,
    pub conn: SdkConn,
    #[serde(default)]
    pub options: SdkConnectionOptions,
    pub payload: SdkPayload,
}

impl SdkConnectionConfig {
    /// Transport family of this connection.
    pub fn conn_type(&self) -> ConnType {
        match self.conn {
            SdkConn::MultipointGroup(_) => ConnType::Group,
            SdkConn::St2110(_) => ConnType::St2110,
            SdkConn::Rdma(_) => ConnType::Rdma,
        }
    }

    /// Stable group URN for this connection: the explicit URN when a group
    /// selector is present, `ip:port` for ST 2110. RDMA connections do not
    /// belong to a group.
    pub fn multipoint_group_urn(&self) -> Result<String, AgentError> {
        match &self.conn {
            SdkConn::MultipointGroup(g) => Ok(g.urn.clone()),
            SdkConn::St2110(s) => Ok(format!("{}:{}", s.remote_ip_addr, s.port)),
            SdkConn::Rdma(_) => Err(AgentError::InvalidConfig(
                "can't get multipoint group urn: no cfg".into(),
            )),
        }
    }

    /// Pairwise compatibility of two configs sharing a group. The error
    /// message names the first mismatching dimension; it travels back to
    /// the registering SDK verbatim.
    pub fn check_payload_compatibility(&self, other: &SdkConnectionConfig) -> Result<(), AgentError> {
        let fail = |msg: String| Err(AgentError::Incompatible(msg));

        if self.calculated_payload_size != other.calculated_payload_size {
            return fail(format!(
                "incompatible calculated payload size: {} != {}",
                self.calculated_payload_size, other.calculated_payload_size
            ));
        }

        match (&self.conn, &other.conn) {
            (SdkConn::MultipointGroup(a), SdkConn::MultipointGroup(b)) => {
                if a.urn != b.urn {
                    return fail(format!(
                        "wrong multipoint group urn: '{}' vs. '{}'",
                        a.urn, b.urn
                    ));
                }
            }
            (SdkConn::MultipointGroup(_), _) => return fail("no multipoint group cfg".into()),
            (SdkConn::St2110(a), SdkConn::St2110(b)) => {
                if a.remote_ip_addr != b.remote_ip_addr || a.port != b.port {
                    return fail(format!(
                        "wrong st2110 remote host: {}:{} vs. {}:{}",
                        a.remote_ip_addr, a.port, b.remote_ip_addr, b.port
                    ));
                }
                if a.transport != b.transport {
                    return fail(format!(
                        "incompatible st2110 transport: {} vs. {}",
                        a.transport, b.transport
                    ));
                }
                if a.payload_type != b.payload_type {
                    return fail(format!(
                        "incompatible st2110 payload type: {} vs. {}",
                        a.payload_type, b.payload_type
                    ));
                }
            }
            (SdkConn::St2110(_), _) => return fail("no st2110 cfg".into()),
            // RDMA point-to-point connections carry no group-scoped selector
            // data; any mismatch is tolerated here.
            (SdkConn::Rdma(_), _) => {}
        }

        if self.options.rdma.provider != other.options.rdma.provider {
            return fail(format!(
                "incompatible rdma provider: {} vs. {}",
                self.options.rdma.provider, other.options.rdma.provider
            ));
        }
        if self.options.rdma.num_endpoints != other.options.rdma.num_endpoints {
            return fail(format!(
                "incompatible rdma number of endpoints: {} vs. {}",
                self.options.rdma.num_endpoints, other.options.rdma.num_endpoints
            ));
        }

        match (&self.payload, &other.payload) {
            (SdkPayload::Video(a), SdkPayload::Video(b)) => {
                if a.width != b.width
                    || a.height != b.height
                    || a.fps != b.fps
                    || a.pixel_format != b.pixel_format
                {
                    return fail(format!(
                        "incompatible video: w:{} h:{} fps:{} fmt:{:?} vs. w:{} h:{} fps:{} fmt:{:?}",
                        a.width, a.height, a.fps, a.pixel_format,
                        b.width, b.height, b.fps, b.pixel_format
                    ));
                }
            }
            (SdkPayload::Video(_), _) => return fail("no video cfg".into()),
            (SdkPayload::Audio(a), SdkPayload::Audio(b)) => {
                if a != b {
                    return fail(format!(
                        "incompatible audio: ch:{} sampling:{:?} fmt:{:?} ptime:{:?} vs. ch:{} sampling:{:?} fmt:{:?} ptime:{:?}",
                        a.channels, a.sample_rate, a.format, a.packet_time,
                        b.channels, b.sample_rate, b.format, b.packet_time
                    ));
                }
            }
            (SdkPayload::Audio(_), _) => return fail("no audio cfg".into()),
            (SdkPayload::Blob(_), SdkPayload::Blob(_)) => {
                if self.max_payload_size != other.max_payload_size {
                    return fail(format!(
                        "incompatible blob: sz:{} vs. sz:{}",
                        self.max_payload_size, other.max_payload_size
                    ));
                }
            }
            (SdkPayload::Blob(_), _) => return fail("no blob cfg".into()),
        }

        Ok(())
    }

    /// Builds the normalized form from a wire config. Fails when a required
    /// sub-message is absent or a widened scalar is out of range.
    pub fn from_wire(cfg: &wire::ConnectionConfig) -> Result<Self, AgentError> {
        fn partition(
            p: &Option<wire::BufferPartition>,
            name: &str,
        ) -> Result<SdkBufferPartition, AgentError> {
            let p = p
                .as_ref()
                .ok_or_else(|| AgentError::InvalidConfig(format!("sdk buf parts cfg is nil ({name})")))?;
            Ok(SdkBufferPartition {
                offset: p.offset,
                size: p.size,
            })
        }

        let parts = cfg
            .buf_parts
            .as_ref()
            .ok_or_else(|| AgentError::InvalidConfig("sdk buf parts cfg is nil".into()))?;
        let buf_parts = SdkBufferPartitions {
            payload: partition(&parts.payload, "payload")?,
            metadata: partition(&parts.metadata, "metadata")?,
            sysdata: partition(&parts.sysdata, "sysdata")?,
        };

        let conn = match cfg
            .conn
            .as_ref()
            .ok_or_else(|| AgentError::InvalidConfig("unknown sdk conn cfg type".into()))?
        {
            wire::ConnSelector::MultipointGroup(g) => {
                SdkConn::MultipointGroup(SdkMultipointGroupConfig { urn: g.urn.clone() })
            }
            wire::ConnSelector::St2110(s) => SdkConn::St2110(SdkSt2110Config {
                remote_ip_addr: s.ip_addr.clone(),
                port: u16::try_from(s.port)
                    .map_err(|_| AgentError::InvalidConfig("st2110 port out of range".into()))?,
                mcast_sip_addr: s.mcast_sip_addr.clone(),
                transport: s.transport,
                pacing: s.pacing.clone(),
                payload_type: u8::try_from(s.payload_type)
                    .map_err(|_| AgentError::InvalidConfig("st2110 payload type out of range".into()))?,
            }),
            wire::ConnSelector::Rdma(r) => SdkConn::Rdma(SdkRdmaConfig {
                connection_mode: r.connection_mode.clone(),
                max_latency_ns: r.max_latency_ns,
            }),
        };

        let mut options = SdkConnectionOptions::default();
        if let Some(rdma) = cfg.options.as_ref().and_then(|o| o.rdma.as_ref()) {
            options.rdma = SdkRdmaOptions {
                provider: rdma.provider.clone(),
                num_endpoints: u8::try_from(rdma.num_endpoints)
                    .map_err(|_| AgentError::InvalidConfig("rdma num endpoints out of range".into()))?,
            };
        }

        let payload = match cfg
            .payload
            .as_ref()
            .ok_or_else(|| AgentError::InvalidConfig("unknown sdk conn cfg payload type".into()))?
        {
            wire::PayloadSelector::Video(v) => SdkPayload::Video(SdkVideoConfig {
                width: v.width,
                height: v.height,
                fps: v.fps,
                pixel_format: v.pixel_format,
            }),
            wire::PayloadSelector::Audio(a) => SdkPayload::Audio(SdkAudioConfig {
                channels: a.channels,
                sample_rate: a.sample_rate,
                format: a.format,
                packet_time: a.packet_time,
            }),
            wire::PayloadSelector::Blob(_) => SdkPayload::Blob(SdkBlobConfig {}),
        };

        Ok(Self {
            buf_queue_capacity: cfg.buf_queue_capacity,
            max_payload_size: cfg.max_payload_size,
            max_metadata_size: cfg.max_metadata_size,
            calculated_payload_size: cfg.calculated_payload_size,
            buf_parts,
            conn,
            options,
            payload,
        })
    }

    /// Projects the normalized form back onto the wire config.
    pub fn to_wire(&self) -> wire::ConnectionConfig {
        let part = |p: &SdkBufferPartition| {
            Some(wire::BufferPartition {
                offset: p.offset,
                size: p.size,
            })
        };

        let conn = match &self.conn {
            SdkConn::MultipointGroup(g) => {
                wire::ConnSelector::MultipointGroup(wire::ConfigMultipointGroup { urn: g.urn.clone() })
            }
            SdkConn::St2110(s) => wire::ConnSelector::St2110(wire::ConfigSt2110 {
                ip_addr: s.remote_ip_addr.clone(),
                port: u32::from(s.port),
                mcast_sip_addr: s.mcast_sip_addr.clone(),
                transport: s.transport,
                pacing: s.pacing.clone(),
                payload_type: u32::from(s.payload_type),
            }),
            SdkConn::Rdma(r) => wire::ConnSelector::Rdma(wire::ConfigRdma {
                connection_mode: r.connection_mode.clone(),
                max_latency_ns: r.max_latency_ns,
            }),
        };

        let payload = match &self.payload {
            SdkPayload::Video(v) => wire::PayloadSelector::Video(wire::ConfigVideo {
                width: v.width,
                height: v.height,
                fps: v.fps,
                pixel_format: v.pixel_format,
            }),
            SdkPayload::Audio(a) => wire::PayloadSelector::Audio(wire::ConfigAudio {
                channels: a.channels,
                sample_rate: a.sample_rate,
                format: a.format,
                packet_time: a.packet_time,
            }),
            SdkPayload::Blob(_) => wire::PayloadSelector::Blob(wire::ConfigBlob {}),
        };

        wire::ConnectionConfig {
            buf_queue_capacity: self.buf_queue_capacity,
            max_payload_size: self.max_payload_size,
            max_metadata_size: self.max_metadata_size,
            calculated_payload_size: self.calculated_payload_size,
            buf_parts: Some(wire::BufferPartitions {
                payload: part(&self.buf_parts.payload),
                metadata: part(&self.buf_parts.metadata),
                sysdata: part(&self.buf_parts.sysdata),
            }),
            conn: Some(conn),
            options: Some(wire::ConnectionOptions {
                rdma: Some(wire::ConnectionOptionsRdma {
                    provider: self.options.rdma.provider.clone(),
                    num_endpoints: u32::from(self.options.rdma.num_endpoints),
                }),
            }),
            payload: Some(payload),
        }
    }
}
