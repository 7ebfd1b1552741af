pub mod anilist;
pub mod credentials;
pub mod mal;

use crate::domain::SeriesId;
use crate::error::OracleError;
use crate::models::series::AiringInfo;
use async_trait::async_trait;

/// Independent source of live airing data for a series.
///
/// Implementations make one unauthenticated call per lookup; callers decide
/// how to degrade on failure.
#[async_trait]
pub trait AiringOracle: Send + Sync {
    async fn query_by_external_id(&self, id: SeriesId) -> Result<AiringInfo, OracleError>;
}
