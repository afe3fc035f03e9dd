use serde::{Deserialize, Serialize};

use crate::cid::Cid;

/// `POST /api/callable/register`. Idempotent by name: registering the same
/// name again overwrites the signature and target.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisterRequest {
    pub name: String,
    pub signature: String,
    pub target_cid: Cid,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisterResponse {
    pub status: String,
}
