use parking_lot::Mutex;
use std::sync::Arc;

use home_net_events::analysis::pipeline::Pipeline;
use home_net_events::models::config::Config;
use home_net_events::models::device::PresenceEventType;
use home_net_events::notify::NotificationSink;
use home_net_events::utils::error::SinkError;

const PHONE: [u8; 6] = [0xaa, 0xbb, 0xcc, 0x00, 0x00, 0x01];
const WATCH: [u8; 6] = [0xaa, 0xbb, 0xcc, 0x00, 0x00, 0x02];
const ROUTER: [u8; 6] = [0xaa, 0xbb, 0xcc, 0x00, 0x00, 0xfe];

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<(String, serde_json::Value)>>,
}

impl NotificationSink for RecordingSink {
    fn notify(&self, topic: &str, message: &str) -> Result<(), SinkError> {
        let body = serde_json::from_str(message)?;
        self.messages.lock().push((topic.to_string(), body));
        Ok(())
    }
}

fn config() -> Config {
    Config::from_json(
        r#"{
            "devices": [
                {"mac": "AA:BB:CC:00:00:01", "name": "phone", "track": true},
                {"mac": "aa:bb:cc:00:00:02", "name": "watch", "track": true},
                {"mac": "aa:bb:cc:00:00:fe", "name": "router"}
            ],
            "stats": {"notify": true, "interval": 60, "max_entries": 4}
        }"#,
    )
    .unwrap()
}

fn ethernet(src: [u8; 6], dst: [u8; 6], ethertype: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(14 + payload.len());
    frame.extend_from_slice(&dst);
    frame.extend_from_slice(&src);
    frame.extend_from_slice(&ethertype.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

fn icmp_echo(src_ip: [u8; 4], dst_ip: [u8; 4]) -> Vec<u8> {
    let mut ip = vec![0x45, 0x00, 0x00, 0x1c, 0, 0, 0, 0, 64, 1, 0, 0];
    ip.extend_from_slice(&src_ip);
    ip.extend_from_slice(&dst_ip);
    ip.extend_from_slice(&[8, 0, 0xf7, 0xff]);
    ip
}

#[test]
fn phone_comes_and_goes() {
    let sink = Arc::new(RecordingSink::default());
    let notifier: Arc<dyn NotificationSink> = sink.clone();
    let mut pipeline = Pipeline::from_config(&config(), false, Some(notifier), 0.0);

    let ping = ethernet(PHONE, ROUTER, 0x0800, &icmp_echo([192, 168, 1, 20], [192, 168, 1, 1]));
    let mut events = Vec::new();
    for t in [0.0, 3.0, 6.0] {
        events.extend(pipeline.process_frame(&ping, t));
    }
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].device, "phone");
    assert_eq!(events[0].event_type, PresenceEventType::Appeared);

    // Watch traffic long after the phone went quiet expires the phone
    let arp = ethernet(WATCH, ROUTER, 0x0806, &[0, 1, 8, 0, 6, 4, 0, 1]);
    let events = pipeline.process_frame(&arp, 310.0);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].device, "phone");
    assert_eq!(events[0].event_type, PresenceEventType::Disappeared);
    assert_eq!(events[0].data.disappeared_since, Some(310.0));

    let messages = sink.messages.lock();
    let topics: Vec<&str> = messages.iter().map(|(topic, _)| topic.as_str()).collect();
    assert_eq!(topics, vec!["phone", "phone", "stats"]);

    // Snapshot went out with the 310 s frame, after presence had run
    let (_, snapshot) = &messages[2];
    assert_eq!(snapshot["packets_count"], 4);
    assert_eq!(snapshot["packet_types"]["ipv4"], 3);
    assert_eq!(snapshot["packet_types"]["arp"], 1);
    assert_eq!(snapshot["events"]["phone"]["type"], "disappeared");

    let flow = &snapshot["stats"]["aa:bb:cc:00:00:01-aa:bb:cc:00:00:fe"];
    assert_eq!(flow["src_device"], "phone");
    assert_eq!(flow["dst_device"], "router");
    assert_eq!(flow["src_ip"], "192.168.1.20");
    assert_eq!(flow["dst_ip"], "192.168.1.1");
    assert_eq!(flow["packets_count"], 3);
}

#[test]
fn flow_table_stays_bounded() {
    let mut pipeline = Pipeline::from_config(&config(), false, None, 0.0);

    for last in 0..10u8 {
        let src = [0x02, 0, 0, 0, 0, last];
        pipeline.process_frame(&ethernet(src, ROUTER, 0x88cc, &[0; 46]), 1.0);
        assert!(pipeline.stats().flows_len() <= 4);
    }

    let remaining: Vec<String> = pipeline
        .stats()
        .snapshot()
        .stats
        .iter()
        .map(|flow| flow.src_mac.clone())
        .collect();
    assert_eq!(
        remaining,
        vec![
            "02:00:00:00:00:06",
            "02:00:00:00:00:07",
            "02:00:00:00:00:08",
            "02:00:00:00:00:09"
        ]
    );
    assert_eq!(pipeline.stats().packets_count(), 10);
}

#[test]
fn garbage_never_panics() {
    let mut pipeline = Pipeline::from_config(&config(), false, None, 0.0);

    let mut frames: Vec<Vec<u8>> = (0..40).map(|len| vec![0x5a; len]).collect();
    frames.push(ethernet(PHONE, ROUTER, 0x0800, &[0x45, 0x00]));
    frames.push(ethernet(PHONE, ROUTER, 0x86dd, &[0x60; 12]));
    frames.push(ethernet(PHONE, ROUTER, 0x0806, &[0x00]));
    frames.push(ethernet(PHONE, ROUTER, 0x0001, &[0x08]));

    for (i, frame) in frames.iter().enumerate() {
        pipeline.process_frame(frame, i as f64);
    }
    assert_eq!(pipeline.stats().packets_count(), frames.len() as u64);
    assert_eq!(pipeline.frames(), frames.len() as u64);
}
