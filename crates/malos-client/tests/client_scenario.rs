//! End-to-end behavior of the client over the in-process transport.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio_test::assert_ok;

use malos_client::Client;
use malos_core::config::{Config, DriverEntry, TransportKind};
use malos_core::error::Error;
use malos_core::types::{ChannelRole, Endpoint};
use malos_devices::codec::{JsonCodec, MessageCodec};
use malos_devices::drivers::HumidityDriver;
use malos_devices::messages::{
    Cluster, ConnectedNode, Humidity, NetworkMgmtCmd, NetworkMgmtCmdType, NetworkStatus,
    NetworkStatusType, NodeEndpoint, OnOffCmdType, ZclCmd, ZigBeeMsg,
};
use malos_devices::transports::MemoryTransport;
use malos_zigbee::GatewayState;

const HOST: &str = "127.0.0.1";

fn endpoint(port: u16) -> Endpoint {
    Endpoint::tcp(HOST, port)
}

fn config(drivers: &[(&str, u16)]) -> Config {
    let mut config = Config::default();
    config.device.host = HOST.to_string();
    config.device.transport = TransportKind::Memory;
    config.drivers = drivers
        .iter()
        .map(|(name, port)| DriverEntry {
            name: name.to_string(),
            port: *port,
            host: None,
        })
        .collect();
    config
}

async fn start(transport: &MemoryTransport, drivers: &[(&str, u16)]) -> Client {
    Client::start(
        config(drivers),
        Arc::new(transport.clone()),
        JsonCodec::shared(),
    )
    .await
}

/// Let spawned lanes catch up without moving far on a paused clock
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

fn gateway_commands(transport: &MemoryTransport) -> Vec<NetworkMgmtCmdType> {
    transport
        .sent(&endpoint(40001))
        .iter()
        .skip(1)
        .filter_map(|payload| {
            JsonCodec
                .decode_config(payload)
                .unwrap()
                .zigbee_message
                .and_then(|message| message.network_mgmt_cmd)
                .map(|cmd| cmd.kind)
        })
        .collect()
}

fn publish(transport: &MemoryTransport, port: u16, message: &ZigBeeMsg) {
    let payload = JsonCodec.encode_zigbee(message).unwrap();
    assert_eq!(transport.publish(&endpoint(port), payload), 1);
}

fn proxy_active(active: bool) -> ZigBeeMsg {
    let mut cmd = NetworkMgmtCmd::new(NetworkMgmtCmdType::IsProxyActive);
    cmd.is_proxy_active = active;
    ZigBeeMsg::network_mgmt(cmd)
}

fn network_status(kind: NetworkStatusType) -> ZigBeeMsg {
    let mut cmd = NetworkMgmtCmd::new(NetworkMgmtCmdType::NetworkStatus);
    cmd.network_status = Some(NetworkStatus { kind });
    ZigBeeMsg::network_mgmt(cmd)
}

fn discovery(pairs: &[(u32, u32)]) -> ZigBeeMsg {
    let mut cmd = NetworkMgmtCmd::new(NetworkMgmtCmdType::DiscoveryInfo);
    cmd.connected_nodes = pairs
        .iter()
        .map(|&(node_id, endpoint_index)| ConnectedNode {
            node_id,
            endpoints: vec![NodeEndpoint {
                endpoint_index,
                clusters: vec![Cluster { cluster_id: 6 }],
            }],
        })
        .collect();
    ZigBeeMsg::network_mgmt(cmd)
}

#[test_log::test(tokio::test(start_paused = true))]
async fn gateway_scenario_over_data_channel() {
    let transport = MemoryTransport::new();
    let client = start(&transport, &[("zigbee", 40001)]).await;
    let gateway = client.gateway().unwrap();
    let timeout = Duration::from_secs(5);

    assert_eq!(
        client.drivers()[0].lanes().roles(),
        vec![ChannelRole::KeepAlive, ChannelRole::Error, ChannelRole::Data]
    );
    let initial = JsonCodec.decode_config(&transport.sent(&endpoint(40001))[0]).unwrap();
    assert_eq!(initial.delay_between_updates, Some(1.0));
    assert_eq!(initial.timeout_after_last_ping, Some(1.0));

    publish(&transport, 40004, &proxy_active(false));
    assert_ok!(gateway.wait_for_state(GatewayState::ResettingGateway, timeout).await);
    assert_eq!(gateway_commands(&transport), vec![NetworkMgmtCmdType::ResetProxy]);

    tokio::time::sleep(Duration::from_millis(2900)).await;
    assert_eq!(gateway_commands(&transport).len(), 1);

    assert_ok!(gateway.wait_for_state(GatewayState::AwaitingGatewayActive, timeout).await);
    assert_eq!(
        gateway_commands(&transport),
        vec![NetworkMgmtCmdType::ResetProxy, NetworkMgmtCmdType::IsProxyActive]
    );

    publish(&transport, 40004, &proxy_active(true));
    assert_ok!(gateway.wait_for_state(GatewayState::AwaitingNetworkStatus, timeout).await);
    assert_eq!(gateway_commands(&transport).len(), 2);

    publish(&transport, 40004, &network_status(NetworkStatusType::NoNetwork));
    settle().await;
    assert_eq!(gateway_commands(&transport)[2], NetworkMgmtCmdType::CreateNwk);
    assert_eq!(gateway.state(), GatewayState::AwaitingNetworkStatus);

    publish(&transport, 40004, &discovery(&[(7, 1), (9, 3)]));
    assert_ok!(gateway.wait_for_state(GatewayState::DevicesDiscovered, timeout).await);
    assert_eq!(gateway.directory().len(), 2);
    assert_eq!(gateway_commands(&transport).len(), 3);

    let device = gateway.directory().first().unwrap();
    assert_ok!(device.toggle().await);
    let sent = transport.sent(&endpoint(40001));
    let zcl = JsonCodec
        .decode_config(sent.last().unwrap())
        .unwrap()
        .zigbee_message
        .unwrap()
        .zcl_cmd
        .unwrap();
    assert_eq!(zcl, ZclCmd::on_off(7, 1, OnOffCmdType::Toggle));

    client.shutdown();
    client.join().await;
}

#[tokio::test(start_paused = true)]
async fn malformed_notification_keeps_lane_running() {
    let transport = MemoryTransport::new();
    let client = start(&transport, &[("zigbee", 40001)]).await;
    let gateway = client.gateway().unwrap();

    assert_eq!(transport.publish(&endpoint(40004), Bytes::from_static(b"\x00\x01")), 1);
    settle().await;
    assert_eq!(gateway.state(), GatewayState::Idle);
    assert!(client.drivers()[0].lanes().is_running(ChannelRole::Data));

    publish(&transport, 40004, &discovery(&[(7, 1)]));
    assert_ok!(
        gateway
            .wait_for_state(GatewayState::DevicesDiscovered, Duration::from_secs(1))
            .await
    );

    client.shutdown();
    client.join().await;
}

#[tokio::test(start_paused = true)]
async fn configuration_precedes_all_other_traffic() {
    let transport = MemoryTransport::new();
    let client = start(
        &transport,
        &[("humidity", 20017), ("uv", 20029), ("zigbee", 40001)],
    )
    .await;
    settle().await;

    let history = transport.history();
    let configs = [endpoint(20017), endpoint(20029), endpoint(40001)];
    let keep_alives = [endpoint(20018), endpoint(20030), endpoint(40002)];

    let first: Vec<_> = history.iter().take(3).map(|(to, _)| to.clone()).collect();
    assert_eq!(first, configs.to_vec());
    assert!(history[3..].iter().all(|(to, _)| keep_alives.contains(to)));
    for config in &configs {
        assert_eq!(transport.sent(config).len(), 1);
    }

    let humidity = JsonCodec.decode_config(&transport.sent(&configs[0])[0]).unwrap();
    assert_eq!(humidity.delay_between_updates, Some(2.0));
    assert_eq!(humidity.timeout_after_last_ping, Some(6.0));

    client.shutdown();
    client.join().await;
}

#[tokio::test(start_paused = true)]
async fn keep_alive_every_interval() {
    let transport = MemoryTransport::new();
    let client = start(&transport, &[("humidity", 20017), ("everloop", 20021)]).await;

    tokio::time::sleep(Duration::from_secs(16)).await;

    let pings = transport.sent(&endpoint(20018));
    assert_eq!(pings.len(), 4);
    assert!(pings.iter().all(|ping| ping.is_empty()));
    assert!(transport.sent(&endpoint(20022)).is_empty());

    client.shutdown();
    client.join().await;
}

#[tokio::test]
async fn sensor_readings_reach_the_driver() {
    let transport = MemoryTransport::new();
    let client = start(&transport, &[("humidity", 20017)]).await;
    let humidity = client.driver::<HumidityDriver>("humidity").unwrap();
    let mut readings = humidity.subscribe();

    let reading = Humidity {
        humidity: 41.5,
        temperature: 22.0,
        ..Default::default()
    };
    let payload = serde_json::to_vec(&reading).unwrap();
    assert_eq!(transport.publish(&endpoint(20020), payload), 1);

    assert_ok!(readings.wait_for(|latest| latest.is_some()).await);
    assert_eq!(humidity.latest(), Some(reading));

    client.shutdown();
    client.join().await;
}

#[tokio::test]
async fn unknown_driver_is_skipped() {
    let transport = MemoryTransport::new();
    let client = start(&transport, &[("imu", 20013), ("zigbee", 40001)]).await;

    assert_eq!(client.failed_drivers().len(), 1);
    assert!(matches!(
        &client.failed_drivers()[0].error,
        Error::UnknownDriverType(name) if name == "imu"
    ));
    assert!(client.gateway().is_some());
    assert!(transport.sent(&endpoint(20013)).is_empty());
    assert_eq!(transport.subscriber_count(&endpoint(20015)), 0);

    client.shutdown();
    client.join().await;
}

#[tokio::test]
async fn channel_failures_stay_with_their_driver() {
    let transport = MemoryTransport::new();
    transport.fail_endpoint(&endpoint(20017));
    transport.fail_endpoint(&endpoint(20032));

    let client = start(
        &transport,
        &[("humidity", 20017), ("uv", 20029), ("zigbee", 40001)],
    )
    .await;

    assert_eq!(client.failed_drivers().len(), 1);
    assert_eq!(client.failed_drivers()[0].descriptor.name, "humidity");
    assert!(matches!(
        client.failed_drivers()[0].error,
        Error::ChannelOpen { .. }
    ));
    assert_eq!(transport.subscriber_count(&endpoint(20020)), 0);

    let uv = &client.drivers()[0];
    assert_eq!(uv.descriptor().name, "uv");
    assert_eq!(uv.lanes().roles(), vec![ChannelRole::KeepAlive, ChannelRole::Error]);
    assert_eq!(client.drivers()[1].lanes().roles().len(), 3);

    client.shutdown();
    client.join().await;
}

#[tokio::test(start_paused = true)]
async fn closed_channel_stops_only_its_lane() {
    let transport = MemoryTransport::new();
    let client = start(&transport, &[("zigbee", 40001)]).await;

    transport.close(&endpoint(40003));
    settle().await;

    let lanes = client.drivers()[0].lanes();
    assert!(!lanes.is_running(ChannelRole::Error));
    assert!(lanes.is_running(ChannelRole::Data));
    assert!(lanes.is_running(ChannelRole::KeepAlive));

    client.shutdown();
    client.join().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_every_lane() {
    let transport = MemoryTransport::new();
    let client = start(&transport, &[("humidity", 20017), ("zigbee", 40001)]).await;
    let gateway = client.gateway().unwrap();

    publish(&transport, 40004, &proxy_active(false));
    assert_ok!(
        gateway
            .wait_for_state(GatewayState::ResettingGateway, Duration::from_secs(1))
            .await
    );

    client.shutdown();
    client.join().await;

    let pings = transport.sent(&endpoint(20018)).len();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(transport.sent(&endpoint(20018)).len(), pings);
    assert_eq!(gateway_commands(&transport), vec![NetworkMgmtCmdType::ResetProxy]);
    assert_eq!(gateway.state(), GatewayState::ResettingGateway);
}
