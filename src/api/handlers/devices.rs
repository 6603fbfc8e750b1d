use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::analysis::pipeline::SharedPipeline;
use crate::models::device::DeviceState;

#[derive(Serialize)]
struct DevicesResponse {
    /// Tracked device names in configuration order
    tracked: Vec<String>,

    /// State of every tracked device that has been seen
    devices: BTreeMap<String, DeviceState>,
}

/// Latest presence event per device
pub async fn get_events(pipeline: web::Data<SharedPipeline>) -> impl Responder {
    let events = pipeline.lock().tracker().snapshot();
    HttpResponse::Ok().json(events)
}

/// Presence state of the tracked devices
pub async fn get_devices(pipeline: web::Data<SharedPipeline>) -> impl Responder {
    let response = {
        let pipeline = pipeline.lock();
        let presence = pipeline.presence();
        DevicesResponse {
            tracked: presence.tracked_devices().to_vec(),
            devices: presence
                .devices()
                .iter()
                .map(|(name, state)| (name.clone(), state.clone()))
                .collect(),
        }
    };

    HttpResponse::Ok().json(response)
}
