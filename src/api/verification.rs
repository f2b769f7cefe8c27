use axum::{ extract::State, Json };
use serde::Serialize;

use crate::enums::ChallengeMode;
use crate::error::Result;
use crate::verification::{ PendingSummary, VerificationStats };

use super::AppState;

#[derive(Serialize)]
pub struct VerificationOverview {
    pub mode: ChallengeMode,
    pub timeout_secs: u64,
    pub pending_count: usize,
    pub stats: VerificationStats,
    pub pending: Vec<PendingSummary>,
}

pub async fn get_overview(State(state): State<AppState>) -> Result<Json<VerificationOverview>> {
    let controller = &state.verification;
    let pending: Vec<PendingSummary> = controller
        .registry()
        .snapshot().await
        .iter()
        .map(PendingSummary::from)
        .collect();

    Ok(
        Json(VerificationOverview {
            mode: controller.settings().mode,
            timeout_secs: controller.settings().timeout.as_secs(),
            pending_count: pending.len(),
            stats: controller.stats(),
            pending,
        })
    )
}
