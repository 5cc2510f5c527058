//! Ports - trait definitions for external dependencies.
//! These are the "interfaces" that infrastructure must implement.

mod auth;
mod fast_store;
mod job_queue;
mod rate_source;
mod repository;

pub use auth::{AuthError, PasswordService, TokenClaims, TokenService};
pub use fast_store::{CacheError, FastStore, SetOp};
pub use job_queue::{Job, JobHandler, JobPayload, JobQueue, JobQueueError, JobResult, QueueStats};
pub use rate_source::{RateFetchError, RateSource};
pub use repository::{
    ArticleRepository, CategoryRepository, CommentRepository, ExchangeRateRepository,
    FavoriteRepository, LikeRepository, UserRepository,
};
