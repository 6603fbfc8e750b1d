use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_ws::{Message, Session};
use futures_util::StreamExt;
use log::{debug, info, warn};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::time::interval;

use crate::analysis::pipeline::SharedPipeline;
use crate::models::stats::StatsSnapshot;

/// How often statistics and heartbeat pings are pushed
const PUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Clients silent for this long are dropped
const CLIENT_TIMEOUT: Duration = Duration::from_secs(15);

/// WebSocket message types that can be sent to clients
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WsOutMessage {
    Stats(StatsSnapshot),
    Status { frames: u64, tracked_devices: usize },
}

impl WsOutMessage {
    fn stats(pipeline: &SharedPipeline) -> Self {
        WsOutMessage::Stats(pipeline.lock().stats().snapshot())
    }

    fn status(pipeline: &SharedPipeline) -> Self {
        let pipeline = pipeline.lock();
        WsOutMessage::Status {
            frames: pipeline.frames(),
            tracked_devices: pipeline.presence().tracked_devices().len(),
        }
    }
}

/// Handle WebSocket connections
pub async fn ws_index(
    req: HttpRequest,
    body: web::Payload,
    pipeline: web::Data<SharedPipeline>,
) -> Result<HttpResponse, Error> {
    let addr = req
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    info!("WebSocket connection from: {}", addr);

    let (response, session, msg_stream) = actix_ws::handle(&req, body)?;
    let pipeline = pipeline.get_ref().clone();

    actix_web::rt::spawn(run_session(session, msg_stream, pipeline));

    Ok(response)
}

/// Push statistics until the client leaves or stops answering
async fn run_session(mut session: Session, mut msg_stream: actix_ws::MessageStream, pipeline: SharedPipeline) {
    // First tick fires immediately and doubles as the initial push
    let mut push = interval(PUSH_INTERVAL);
    let mut last_heard = Instant::now();

    loop {
        tokio::select! {
            _ = push.tick() => {
                if last_heard.elapsed() > CLIENT_TIMEOUT {
                    warn!("WebSocket client heartbeat timed out");
                    break;
                }
                if session.ping(b"").await.is_err() {
                    break;
                }
                if send(&mut session, &WsOutMessage::stats(&pipeline)).await.is_err() {
                    break;
                }
            }
            msg = msg_stream.next() => {
                match msg {
                    Some(Ok(Message::Ping(bytes))) => {
                        last_heard = Instant::now();
                        if session.pong(&bytes).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        last_heard = Instant::now();
                    }
                    Some(Ok(Message::Text(text))) => {
                        last_heard = Instant::now();
                        let reply = match text.trim() {
                            "stats" => Some(WsOutMessage::stats(&pipeline)),
                            "status" => Some(WsOutMessage::status(&pipeline)),
                            other => {
                                debug!("Ignoring WebSocket command: {}", other);
                                None
                            }
                        };
                        if let Some(reply) = reply {
                            if send(&mut session, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(reason))) => {
                        info!("Client requested close");
                        let _ = session.close(reason).await;
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket protocol error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    let _ = session.close(None).await;
    info!("WebSocket connection closed");
}

async fn send(session: &mut Session, msg: &WsOutMessage) -> Result<(), actix_ws::Closed> {
    match serde_json::to_string(msg) {
        Ok(json) => session.text(json).await,
        Err(e) => {
            warn!("Failed to serialize WebSocket message: {}", e);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::pipeline::Pipeline;
    use crate::models::config::Config;

    fn pipeline() -> SharedPipeline {
        let config = Config::from_json(
            r#"{"devices": [{"mac": "02:00:00:00:00:01", "name": "phone", "track": true}]}"#,
        )
        .unwrap();
        Pipeline::from_config(&config, false, None, 0.0).into_shared()
    }

    #[test]
    fn stats_message_is_tagged_snapshot() {
        let pipeline = pipeline();
        pipeline.lock().process_frame(&[0u8; 20], 1.0);

        let json = serde_json::to_value(WsOutMessage::stats(&pipeline)).unwrap();
        assert_eq!(json["type"], "stats");
        assert_eq!(json["packets_count"], 1);
        assert!(json["stats"].is_object());
        assert!(json["events"].is_object());
    }

    #[test]
    fn status_message_counts_frames() {
        let pipeline = pipeline();
        pipeline.lock().process_frame(&[0u8; 4], 1.0);
        pipeline.lock().process_frame(&[0u8; 4], 2.0);

        let json = serde_json::to_value(WsOutMessage::status(&pipeline)).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["frames"], 2);
        assert_eq!(json["tracked_devices"], 1);
    }
}
