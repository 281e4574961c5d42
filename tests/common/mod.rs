//! Shared harness for the integration scenarios: a running agent core,
//! wire-level request builders and a simulated proxy endpoint that acks
//! every command it receives.
#![allow(dead_code)]

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use mesh_agent::api::wire;
use mesh_agent::model::sdk::{
    AudioFormat, AudioPacketTime, AudioSampleRate, SdkAudioConfig, SdkBufferPartitions, SdkConn,
    SdkConnectionConfig, SdkConnectionOptions, SdkMultipointGroupConfig, SdkPayload,
    SdkVideoConfig, VideoPixelFormat,
};
use mesh_agent::{Agent, AgentConfig, AgentContext, AgentError, CommandSink, ProxyService};

pub struct TestAgent {
    pub cx: Arc<AgentContext>,
    pub svc: ProxyService,
    pub root: CancellationToken,
}

impl Drop for TestAgent {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

pub fn start_agent() -> TestAgent {
    let cfg = AgentConfig {
        event_timeout: Duration::from_secs(5),
        command_timeout: Duration::from_millis(500),
        ..AgentConfig::default()
    };
    let root = CancellationToken::new();
    let cx = Agent::start(cfg, root.clone()).expect("agent core starts");
    TestAgent {
        svc: ProxyService::new(cx.clone()),
        cx,
        root,
    }
}

/// Polls a condition until it holds, or panics after ~2 s.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached: {what}");
}

pub fn register_proxy_request(st_ip: &str, rdma_ip: &str, ports: &str) -> wire::RegisterMediaProxyRequest {
    wire::RegisterMediaProxyRequest {
        sdk_api_port: 2345,
        st2110_config: Some(wire::St2110Config {
            dev_port_bdf: "0000:32:01.0".into(),
            dataplane_ip_addr: st_ip.into(),
        }),
        rdma_config: Some(wire::RdmaConfig {
            dataplane_ip_addr: rdma_ip.into(),
            dataplane_local_ports: ports.into(),
        }),
    }
}

pub fn video_group_config(urn: &str) -> wire::ConnectionConfig {
    SdkConnectionConfig {
        buf_queue_capacity: 8,
        max_payload_size: 5_184_000,
        max_metadata_size: 0,
        calculated_payload_size: 5_184_000,
        buf_parts: SdkBufferPartitions::default(),
        conn: SdkConn::MultipointGroup(SdkMultipointGroupConfig { urn: urn.into() }),
        options: SdkConnectionOptions::default(),
        payload: SdkPayload::Video(SdkVideoConfig {
            width: 1920,
            height: 1080,
            fps: 60.0,
            pixel_format: VideoPixelFormat::Yuv422p10le,
        }),
    }
    .to_wire()
}

pub fn audio_group_config(urn: &str) -> wire::ConnectionConfig {
    SdkConnectionConfig {
        buf_queue_capacity: 8,
        max_payload_size: 5_184_000,
        max_metadata_size: 0,
        calculated_payload_size: 5_184_000,
        buf_parts: SdkBufferPartitions::default(),
        conn: SdkConn::MultipointGroup(SdkMultipointGroupConfig { urn: urn.into() }),
        options: SdkConnectionOptions::default(),
        payload: SdkPayload::Audio(SdkAudioConfig {
            channels: 2,
            sample_rate: AudioSampleRate::R48000,
            format: AudioFormat::PcmS24Be,
            packet_time: AudioPacketTime::P1Ms,
        }),
    }
    .to_wire()
}

pub async fn register_connection(
    agent: &TestAgent,
    proxy_id: &str,
    kind: &str,
    config: wire::ConnectionConfig,
) -> Result<String, AgentError> {
    agent
        .svc
        .register_connection(wire::RegisterConnectionRequest {
            proxy_id: proxy_id.into(),
            kind: kind.into(),
            conn_id: String::new(),
            config: Some(config),
        })
        .await
        .map(|reply| reply.conn_id)
}

/// Command sink that records every request and acks it like a healthy
/// data plane would (debug commands echo their input text).
pub struct AutoReplySink {
    svc: ProxyService,
    proxy_id: String,
    pub seen: Arc<Mutex<Vec<wire::CommandRequest>>>,
}

#[async_trait]
impl CommandSink for AutoReplySink {
    async fn send(&mut self, request: &wire::CommandRequest) -> Result<(), AgentError> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(request.clone());
        }

        let svc = self.svc.clone();
        let proxy_id = self.proxy_id.clone();
        let request = request.clone();
        // Reply from a separate task, as the remote proxy would.
        tokio::spawn(async move {
            let reply = match &request.command {
                Some(wire::Command::Debug(debug)) => wire::Reply::Debug(wire::DebugReply {
                    out_text: debug.in_text.clone(),
                }),
                _ => wire::Reply::ApplyConfig(wire::ApplyConfigReply {}),
            };
            let _ = svc
                .send_command_reply(wire::CommandReply {
                    req_id: request.req_id.clone(),
                    proxy_id,
                    reply: Some(reply),
                })
                .await;
        });
        Ok(())
    }
}

/// Attaches a simulated command stream for the proxy. Returns the stream
/// cancellation token and the log of received commands.
pub fn attach_stream(
    agent: &TestAgent,
    proxy_id: &str,
) -> (CancellationToken, Arc<Mutex<Vec<wire::CommandRequest>>>) {
    let stream_cancel = CancellationToken::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut sink = AutoReplySink {
        svc: agent.svc.clone(),
        proxy_id: proxy_id.to_string(),
        seen: Arc::clone(&seen),
    };
    let svc = agent.svc.clone();
    let proxy_id = proxy_id.to_string();
    let cancel = stream_cancel.clone();
    tokio::spawn(async move {
        let _ = svc.start_command_queue(&proxy_id, cancel, &mut sink).await;
    });
    (stream_cancel, seen)
}
