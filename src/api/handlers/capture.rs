use actix_web::{web, HttpResponse, Responder};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::api::SharedCaptureManager;
use crate::models::interface::{list_interfaces as os_interfaces, InterfaceInfo};

/// Request for starting capture
#[derive(Deserialize)]
pub struct StartCaptureRequest {
    /// Interface to capture on
    pub interface: Option<String>,

    /// Promiscuous mode
    pub promiscuous: Option<bool>,

    /// Filter expression; empty clears it
    pub filter: Option<String>,
}

#[derive(Serialize)]
struct InterfacesResponse {
    interfaces: Vec<InterfaceInfo>,

    /// Interface used when none is selected
    default: Option<String>,
}

/// List network interfaces
pub async fn list_interfaces() -> impl Responder {
    let interfaces = os_interfaces();
    let default = interfaces
        .iter()
        .find(|iface| iface.is_capture_candidate())
        .map(|iface| iface.device_name.clone());

    HttpResponse::Ok().json(InterfacesResponse { interfaces, default })
}

/// Start packet capture, optionally changing settings first
pub async fn start_capture(
    capture_manager: web::Data<SharedCaptureManager>,
    request: Option<web::Json<StartCaptureRequest>>,
) -> impl Responder {
    let mut capture_manager = capture_manager.write().await;

    if let Some(req) = request {
        if let Some(interface) = &req.interface {
            capture_manager.set_interface(interface.clone());
        }
        if let Some(promiscuous) = req.promiscuous {
            capture_manager.set_promiscuous(promiscuous);
        }
        if let Some(filter) = &req.filter {
            capture_manager.set_filter(filter.clone());
        }
    }

    match capture_manager.start_capture() {
        Ok(()) => {
            info!("Capture started on {:?}", capture_manager.get_selected_interface());
            HttpResponse::Ok().json(serde_json::json!({
                "status": "success",
                "message": "Capture started successfully"
            }))
        }
        Err(e) => {
            error!("Failed to start capture: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "status": "error",
                "message": format!("Failed to start capture: {}", e)
            }))
        }
    }
}

/// Stop packet capture
pub async fn stop_capture(capture_manager: web::Data<SharedCaptureManager>) -> impl Responder {
    let mut capture_manager = capture_manager.write().await;

    match capture_manager.stop_capture() {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "status": "success",
            "message": "Capture stopped successfully"
        })),
        Err(e) => {
            error!("Failed to stop capture: {}", e);
            HttpResponse::Conflict().json(serde_json::json!({
                "status": "error",
                "message": format!("Failed to stop capture: {}", e)
            }))
        }
    }
}

/// Get capture status
pub async fn get_capture_status(capture_manager: web::Data<SharedCaptureManager>) -> impl Responder {
    let status = capture_manager.read().await.status();
    HttpResponse::Ok().json(status)
}
