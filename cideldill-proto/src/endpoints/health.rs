use serde::{Deserialize, Serialize};

/// `GET /api/health`: the reachability probe the host switch performs when
/// debugging is turned on.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HealthResponse {
    pub status: String,
}
