//! # Wire message model for the proxy-facing service.
//!
//! Stand-in for the generated protobuf code: request/reply payloads for the
//! proxy service, the command envelope delivered down the server-initiated
//! stream, and the SDK connection config in its on-wire shape (optional
//! sub-messages, widened scalars). The transport binding that carries these
//! messages lives outside this crate; everything here is plain serde data.
//!
//! The enum vocabulary (transports, pixel formats, audio parameters) is
//! shared with the normalized model in [`crate::model::sdk`].

use serde::{Deserialize, Serialize};

pub use crate::model::sdk::{
    AudioFormat, AudioPacketTime, AudioSampleRate, St2110Transport, VideoPixelFormat,
};

// ---- SDK connection config, wire shape ----

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferPartition {
    pub offset: u32,
    pub size: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferPartitions {
    pub payload: Option<BufferPartition>,
    pub metadata: Option<BufferPartition>,
    pub sysdata: Option<BufferPartition>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigMultipointGroup {
    pub urn: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSt2110 {
    pub ip_addr: String,
    pub port: u32,
    #[serde(default)]
    pub mcast_sip_addr: String,
    pub transport: St2110Transport,
    pub pacing: String,
    pub payload_type: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigRdma {
    pub connection_mode: String,
    pub max_latency_ns: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionOptionsRdma {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub num_endpoints: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    pub rdma: Option<ConnectionOptionsRdma>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigVideo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub pixel_format: VideoPixelFormat,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigAudio {
    pub channels: u32,
    pub sample_rate: AudioSampleRate,
    pub format: AudioFormat,
    pub packet_time: AudioPacketTime,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigBlob {}

/// `oneof conn` of the wire config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnSelector {
    MultipointGroup(ConfigMultipointGroup),
    St2110(ConfigSt2110),
    Rdma(ConfigRdma),
}

/// `oneof payload` of the wire config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PayloadSelector {
    Video(ConfigVideo),
    Audio(ConfigAudio),
    Blob(ConfigBlob),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub buf_queue_capacity: u32,
    pub max_payload_size: u32,
    pub max_metadata_size: u32,
    pub calculated_payload_size: u32,
    pub buf_parts: Option<BufferPartitions>,
    pub conn: Option<ConnSelector>,
    pub options: Option<ConnectionOptions>,
    pub payload: Option<PayloadSelector>,
}

// ---- Proxy service requests / replies ----

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct St2110Config {
    pub dev_port_bdf: String,
    pub dataplane_ip_addr: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RdmaConfig {
    pub dataplane_ip_addr: String,
    pub dataplane_local_ports: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterMediaProxyRequest {
    pub sdk_api_port: u32,
    pub st2110_config: Option<St2110Config>,
    pub rdma_config: Option<RdmaConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterMediaProxyReply {
    pub proxy_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnregisterMediaProxyRequest {
    pub proxy_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterConnectionRequest {
    pub proxy_id: String,
    pub kind: String,
    #[serde(default)]
    pub conn_id: String,
    pub config: Option<ConnectionConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterConnectionReply {
    pub conn_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnregisterConnectionRequest {
    pub proxy_id: String,
    pub conn_id: String,
}

// ---- Command stream envelope ----

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugRequest {
    pub in_text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugReply {
    pub out_text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipointGroupView {
    pub group_id: String,
    pub conn_ids: Vec<String>,
    pub bridge_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeSt2110 {
    pub remote_ip: String,
    pub port: u32,
    pub transport: St2110Transport,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeRdma {
    pub remote_ip: String,
    pub port: u32,
}

/// `oneof config` of the bridge message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BridgeTarget {
    St2110(BridgeSt2110),
    Rdma(BridgeRdma),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeView {
    pub bridge_id: String,
    pub r#type: String,
    pub kind: String,
    pub conn_config: Option<ConnectionConfig>,
    pub config: Option<BridgeTarget>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyConfigRequest {
    pub groups: Vec<MultipointGroupView>,
    pub bridges: Vec<BridgeView>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyConfigReply {}

/// `oneof command` of the request envelope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Command {
    Debug(DebugRequest),
    ApplyConfig(ApplyConfigRequest),
}

/// A single server-initiated command, correlated by `req_id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRequest {
    pub req_id: String,
    pub command: Option<Command>,
}

/// `oneof reply` of the reply envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Reply {
    Debug(DebugReply),
    ApplyConfig(ApplyConfigReply),
}

/// Reply sent by the proxy over the unary `send_command_reply` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandReply {
    pub req_id: String,
    pub proxy_id: String,
    pub reply: Option<Reply>,
}

// ---- Telemetry ----

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetricValue {
    StrValue(String),
    UintValue(u64),
    DoubleValue(f64),
    BoolValue(bool),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricField {
    pub name: String,
    pub value: MetricValue,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    pub timestamp_ms: i64,
    pub provider_id: String,
    pub fields: Vec<MetricField>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMetricsRequest {
    pub proxy_id: String,
    pub metrics: Vec<Metric>,
}
