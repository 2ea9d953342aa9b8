//! Drives a simulated ZigBee gateway and LED ring over the in-process
//! transport and prints every command the client pushes.
//!
//! Run with `cargo run -p malos-client --example gateway_demo`.

use std::sync::Arc;
use std::time::Duration;

use malos_client::Client;
use malos_core::config::{Config, DriverEntry, TransportKind};
use malos_core::error::Result;
use malos_core::types::Endpoint;
use malos_devices::codec::{JsonCodec, MessageCodec};
use malos_devices::drivers::EverloopDriver;
use malos_devices::messages::{
    Cluster, ConnectedNode, LedValue, NetworkMgmtCmd, NetworkMgmtCmdType, NetworkStatus,
    NetworkStatusType, NodeEndpoint, ZigBeeMsg, ON_OFF_CLUSTER_ID,
};
use malos_devices::transports::MemoryTransport;
use malos_zigbee::GatewayState;

const HOST: &str = "127.0.0.1";
const GATEWAY_PORT: u16 = 40001;
const EVERLOOP_PORT: u16 = 20021;

fn gateway_reply(transport: &MemoryTransport, message: &ZigBeeMsg) -> Result<()> {
    let payload = JsonCodec.encode_zigbee(message)?;
    transport.publish(&Endpoint::tcp(HOST, GATEWAY_PORT + 3), payload);
    Ok(())
}

fn network_mgmt(kind: NetworkMgmtCmdType, fill: impl FnOnce(&mut NetworkMgmtCmd)) -> ZigBeeMsg {
    let mut cmd = NetworkMgmtCmd::new(kind);
    fill(&mut cmd);
    ZigBeeMsg::network_mgmt(cmd)
}

fn light(node_id: u32, endpoint_index: u32) -> ConnectedNode {
    ConnectedNode {
        node_id,
        endpoints: vec![NodeEndpoint {
            endpoint_index,
            clusters: vec![Cluster {
                cluster_id: ON_OFF_CLUSTER_ID,
            }],
        }],
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    malos_core::logging::init_with_filter("info")?;

    let mut config = Config::default();
    config.device.host = HOST.to_string();
    config.device.transport = TransportKind::Memory;
    config.drivers = vec![
        DriverEntry {
            name: "everloop".to_string(),
            port: EVERLOOP_PORT,
            host: None,
        },
        DriverEntry {
            name: "zigbee".to_string(),
            port: GATEWAY_PORT,
            host: None,
        },
    ];

    let transport = MemoryTransport::new();
    let client = Client::start(config, Arc::new(transport.clone()), JsonCodec::shared()).await;
    let timeout = Duration::from_secs(1);

    if let Some(everloop) = client.driver::<EverloopDriver>("everloop") {
        everloop
            .set_colors(&[LedValue::new(0, 150, 150, 0), LedValue::new(150, 0, 0, 0)])
            .await?;
    }

    if let Some(gateway) = client.gateway() {
        gateway.check_gateway_active().await?;
        gateway_reply(
            &transport,
            &network_mgmt(NetworkMgmtCmdType::IsProxyActive, |cmd| {
                cmd.is_proxy_active = true
            }),
        )?;
        gateway
            .wait_for_state(GatewayState::AwaitingNetworkStatus, timeout)
            .await?;

        gateway.request_network_status().await?;
        gateway_reply(
            &transport,
            &network_mgmt(NetworkMgmtCmdType::NetworkStatus, |cmd| {
                cmd.network_status = Some(NetworkStatus {
                    kind: NetworkStatusType::JoinedNetwork,
                });
                cmd.connected_nodes = vec![light(7, 1)];
            }),
        )?;
        gateway
            .wait_for_state(GatewayState::AwaitingDeviceDiscovery, timeout)
            .await?;

        gateway.permit_join().await?;
        gateway_reply(
            &transport,
            &network_mgmt(NetworkMgmtCmdType::DiscoveryInfo, |cmd| {
                cmd.connected_nodes = vec![light(7, 1), light(9, 3)];
            }),
        )?;
        gateway
            .wait_for_state(GatewayState::DevicesDiscovered, timeout)
            .await?;

        for device in gateway.directory().devices() {
            device.turn_on().await?;
            device.set_brightness(200).await?;
            device.set_color_temperature(250).await?;
        }
    }

    client.shutdown();
    client.join().await;

    for (endpoint, payload) in transport.history() {
        if payload.is_empty() {
            continue;
        }
        let config = JsonCodec.decode_config(&payload)?;
        let summary = match (&config.zigbee_message, &config.image) {
            (Some(message), _) => format!("{:?}", message),
            (None, Some(image)) => format!("image of {} LEDs", image.led.len()),
            (None, None) => format!("{:?}", config),
        };
        println!("{} <- {}", endpoint, summary);
    }

    Ok(())
}
