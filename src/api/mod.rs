pub mod handlers;
pub mod routes;
pub mod websocket;

use std::sync::Arc;
use tokio::sync::RwLock;

use crate::capture::manager::CaptureManager;

/// Capture manager as shared with the HTTP handlers
pub type SharedCaptureManager = Arc<RwLock<CaptureManager>>;
