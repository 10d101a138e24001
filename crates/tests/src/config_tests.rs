//! Configuration → sinks → running daemons

use contracts::{ErrorKind, Message, ProducerEntry};
use config_loader::{ConfigFormat, ConfigLoader};
use producer_daemon::{create_sink, unpack_aggregate, AnySink, DaemonRegistry, ProducerDaemon};
use tokio::net::UdpSocket;

fn registry_from(entries: &[ProducerEntry], sinks: Vec<AnySink>) -> DaemonRegistry<AnySink> {
    let registry = DaemonRegistry::new();
    for (entry, sink) in entries.iter().zip(sinks) {
        registry
            .provide(&entry.name, |name| {
                ProducerDaemon::builder(name, entry.daemon.clone(), sink).build()
            })
            .unwrap();
    }
    registry
}

#[tokio::test]
async fn test_file_producer_from_toml() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("nested/out.jsonl");

    let toml = format!(
        r#"
[[producers]]
name = "audit"

[producers.daemon]
batch_size = 2
aggregation_size = 2
runner_count = 2

[producers.daemon.message_attributes]
service = "billing"

[producers.sink]
name = "audit_file"
sink_type = "file"

[producers.sink.params]
path = "{}"
"#,
        output.display()
    );

    let config = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
    let entry = &config.producers[0];
    let sink = create_sink(&entry.sink).await.unwrap();
    let registry = registry_from(&config.producers, vec![sink]);
    registry.spawn_all();

    let daemon = registry.get("audit").unwrap();
    daemon
        .write((0..5).map(|i| Message::new(format!("e{i}"))).collect())
        .await
        .unwrap();
    registry.shutdown().await.unwrap();

    let lines = std::fs::read_to_string(&output).unwrap();
    let carriers: Vec<Message> = lines
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(carriers.len(), 3);
    assert!(carriers
        .iter()
        .all(|c| c.attribute("service") == Some(&"billing".into())));

    let mut bodies: Vec<String> = carriers
        .iter()
        .flat_map(|c| unpack_aggregate(c).unwrap())
        .map(|m| String::from_utf8(m.body.to_vec()).unwrap())
        .collect();
    bodies.sort();
    assert_eq!(bodies, vec!["e0", "e1", "e2", "e3", "e4"]);
}

#[tokio::test]
async fn test_network_producer_from_json() {
    let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let json = serde_json::json!({
        "producers": [{
            "name": "metrics",
            "daemon": { "batch_size": 3, "runner_count": 1 },
            "sink": {
                "name": "udp",
                "sink_type": "network",
                "params": { "addr": receiver.local_addr().unwrap().to_string() }
            }
        }]
    })
    .to_string();

    let config = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
    let sink = create_sink(&config.producers[0].sink).await.unwrap();
    let registry = registry_from(&config.producers, vec![sink]);
    registry.spawn_all();

    let daemon = registry.get("metrics").unwrap();
    let batch: Vec<Message> = (0..3)
        .map(|i| Message::new(format!("m{i}")).with_attribute("seq", i))
        .collect();
    daemon.write(batch.clone()).await.unwrap();

    let mut buf = vec![0u8; 65536];
    let n = receiver.recv(&mut buf).await.unwrap();
    let received: Vec<Message> = serde_json::from_slice(&buf[..n]).unwrap();
    assert_eq!(received, batch);

    registry.shutdown().await.unwrap();
    assert_eq!(daemon.stats().batches_written(), 1);
}

#[test]
fn test_invalid_settings_rejected_at_load() {
    let toml = r#"
[[producers]]
name = "bad"

[producers.daemon]
batch_size = 0

[producers.sink]
name = "console"
sink_type = "log"
"#;

    let err = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(err.to_string().contains("producers[bad].daemon.batch_size"));
}

#[tokio::test]
async fn test_file_sink_without_path_fails_to_build() {
    let toml = r#"
[[producers]]
name = "nowhere"

[producers.sink]
name = "file"
sink_type = "file"
"#;

    // rejected by validation before a sink is ever created
    let err = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(err.to_string().contains("path"));
}
