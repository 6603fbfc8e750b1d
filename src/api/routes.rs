use actix_web::{web, HttpResponse, Responder};
use serde_json::json;

use crate::api::handlers::{
    capture::{get_capture_status, list_interfaces, start_capture, stop_capture},
    devices::{get_devices, get_events},
    stats::{get_flows, get_stats},
};
use crate::api::websocket::ws_index;

/// Root endpoint to provide information about the API
async fn index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "endpoints": [
            {"path": "/api/stats", "method": "GET", "description": "Statistics snapshot"},
            {"path": "/api/flows?limit=N", "method": "GET", "description": "Busiest flows"},
            {"path": "/api/events", "method": "GET", "description": "Latest presence event per device"},
            {"path": "/api/devices", "method": "GET", "description": "Presence state of tracked devices"},
            {"path": "/api/interfaces", "method": "GET", "description": "List network interfaces"},
            {"path": "/api/capture/start", "method": "POST", "description": "Start packet capture"},
            {"path": "/api/capture/stop", "method": "POST", "description": "Stop packet capture"},
            {"path": "/api/capture/status", "method": "GET", "description": "Capture status"},
            {"path": "/api/ws", "method": "GET", "description": "WebSocket for live statistics"}
        ]
    }))
}

/// Configure API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index)).service(
        web::scope("/api")
            .route("/ws", web::get().to(ws_index))
            .route("/stats", web::get().to(get_stats))
            .route("/flows", web::get().to(get_flows))
            .route("/events", web::get().to(get_events))
            .route("/devices", web::get().to(get_devices))
            .route("/interfaces", web::get().to(list_interfaces))
            .service(
                web::scope("/capture")
                    .route("/start", web::post().to(start_capture))
                    .route("/stop", web::post().to(stop_capture))
                    .route("/status", web::get().to(get_capture_status)),
            ),
    );
}
