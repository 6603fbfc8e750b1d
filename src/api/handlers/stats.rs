use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

use crate::analysis::pipeline::SharedPipeline;
use crate::models::stats::FlowEntry;

/// Flows shown when no limit is given
const DEFAULT_FLOW_LIMIT: usize = 20;

/// Query parameters for listing flows
#[derive(Deserialize)]
pub struct FlowsQuery {
    /// Maximum number of flows to return
    pub limit: Option<usize>,
}

#[derive(Serialize)]
struct FlowsResponse {
    /// Busiest flows first
    flows: Vec<FlowEntry>,

    /// Flows currently held
    total: usize,
}

/// Full statistics snapshot, the same payload published on the `stats` topic
pub async fn get_stats(pipeline: web::Data<SharedPipeline>) -> impl Responder {
    let snapshot = pipeline.lock().stats().snapshot();
    HttpResponse::Ok().json(snapshot)
}

/// Flows ordered by packet count
pub async fn get_flows(
    pipeline: web::Data<SharedPipeline>,
    query: web::Query<FlowsQuery>,
) -> impl Responder {
    let limit = query.limit.unwrap_or(DEFAULT_FLOW_LIMIT);

    let response = {
        let pipeline = pipeline.lock();
        FlowsResponse {
            flows: pipeline.stats().top_flows(limit),
            total: pipeline.stats().flows_len(),
        }
    };

    HttpResponse::Ok().json(response)
}
