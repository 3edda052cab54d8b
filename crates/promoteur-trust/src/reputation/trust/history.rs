use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::TrustScoreSnapshot;
use crate::reputation::domain::PromoteurId;
use crate::reputation::error::EngineError;
use crate::reputation::repository::ScoreRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Rising,
    Falling,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreTrend {
    pub promoteur_id: PromoteurId,
    pub since: DateTime<Utc>,
    pub snapshots: Vec<TrustScoreSnapshot>,
    /// Last minus first score; absent with fewer than two snapshots.
    pub delta: Option<i16>,
    pub direction: TrendDirection,
}

/// Read side of the append-only snapshot history.
pub struct ScoreHistory<S> {
    store: Arc<S>,
}

impl<S> ScoreHistory<S>
where
    S: ScoreRepository + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn trend(
        &self,
        promoteur: &PromoteurId,
        since: DateTime<Utc>,
    ) -> Result<ScoreTrend, EngineError> {
        let mut snapshots = self.store.snapshots_since(promoteur, since)?;
        snapshots.sort_by_key(|snapshot| snapshot.created_at);

        let delta = match (snapshots.first(), snapshots.last()) {
            (Some(first), Some(last)) if snapshots.len() > 1 => {
                Some(i16::from(last.score) - i16::from(first.score))
            }
            _ => None,
        };
        let direction = match delta {
            Some(delta) if delta > 0 => TrendDirection::Rising,
            Some(delta) if delta < 0 => TrendDirection::Falling,
            _ => TrendDirection::Flat,
        };

        Ok(ScoreTrend {
            promoteur_id: promoteur.clone(),
            since,
            snapshots,
            delta,
            direction,
        })
    }
}
