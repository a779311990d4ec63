/// Hevy fitness aggregation
///
/// API Flow:
/// 1. Routine folders: /v1/routine_folders (paged) → locate the "Current" folder
/// 2. Routines: /v1/routines (paged) → keep the ones in that folder
/// 3. Stats: /v1/workouts/count and the most recent /v1/workouts page
use std::sync::Arc;

use serde_json::Value;

use crate::{
    cache::{CacheKey, TtlCache},
    cached,
    config::require,
    error::{AppError, AppResult},
    models::{
        AggregationRequest, FitnessStats, FitnessSummary, HevyWorkoutPage, RecentWorkout,
        RoutineFolder, WorkoutCount,
    },
    services::{
        http::{HttpRequest, HttpTransport},
        pagination::fetch_all_pages,
    },
};

const PAGE_SIZE: u32 = 10;
const DEFAULT_RECENT_WORKOUTS: u32 = 5;
const MAX_RECENT_WORKOUTS: u32 = 10;
const CURRENT_FOLDER: &str = "current";

pub struct FitnessService {
    transport: Arc<dyn HttpTransport>,
    cache: TtlCache<FitnessSummary>,
    api_url: String,
    api_key: Option<String>,
}

impl FitnessService {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        cache: TtlCache<FitnessSummary>,
        api_url: &str,
        api_key: Option<String>,
    ) -> Self {
        Self {
            transport,
            cache,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub async fn get_summary(&self, request: AggregationRequest) -> AppResult<FitnessSummary> {
        let limit = request.limit_or(DEFAULT_RECENT_WORKOUTS, MAX_RECENT_WORKOUTS);

        cached!(
            self.cache,
            CacheKey::Fitness(limit),
            request.force_refresh,
            self.fetch_summary(limit)
        )
    }

    async fn fetch_summary(&self, limit: u32) -> AppResult<FitnessSummary> {
        let api_key = require(&self.api_key, "Hevy API key")?;

        let folders: Vec<RoutineFolder> = fetch_all_pages(
            self.transport.as_ref(),
            &self.request("/v1/routine_folders", api_key),
            PAGE_SIZE,
            "routine_folders",
        )
        .await?;

        let current = folders
            .iter()
            .find(|folder| folder.title.eq_ignore_ascii_case(CURRENT_FOLDER))
            .ok_or_else(|| AppError::NotFound("No \"Current\" folder found in Hevy".to_string()))?;

        let routines: Vec<Value> = fetch_all_pages(
            self.transport.as_ref(),
            &self.request("/v1/routines", api_key),
            PAGE_SIZE,
            "routines",
        )
        .await?;

        let total_routines = routines.len();
        let routines: Vec<Value> = routines
            .into_iter()
            .filter(|routine| routine.get("folder_id").and_then(Value::as_u64) == Some(current.id))
            .collect();

        let count: WorkoutCount = self
            .transport
            .send(self.request("/v1/workouts/count", api_key))
            .await?
            .error_for_status()?
            .json()?;

        let workouts: HevyWorkoutPage = self
            .transport
            .send(
                self.request("/v1/workouts", api_key)
                    .query("page", 1)
                    .query("pageSize", limit),
            )
            .await?
            .error_for_status()?
            .json()?;

        let recent_workouts: Vec<RecentWorkout> = workouts
            .workouts
            .into_iter()
            .take(limit as usize)
            .map(RecentWorkout::from)
            .collect();

        tracing::info!(
            folder_id = current.id,
            routines = routines.len(),
            total_routines,
            workouts = count.workout_count,
            provider = "hevy",
            "Fitness summary fetched"
        );

        Ok(FitnessSummary {
            routines,
            stats: FitnessStats {
                workout_count: count.workout_count,
                recent_workouts,
            },
        })
    }

    fn request(&self, path: &str, api_key: &str) -> HttpRequest {
        HttpRequest::get(format!("{}{}", self.api_url, path))
            .header("Accept", "application/json")
            .header("api-key", api_key)
    }
}
