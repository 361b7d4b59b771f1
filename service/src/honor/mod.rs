//! Honor plans: events celebrating members, with contribution details and
//! a shareable invitation.

pub mod http;
pub mod model;
pub mod repo;
pub mod share;

pub use model::{HonorPlan, HonorPlanInput, HonorStatus, MobilePayment};
pub use repo::{HonorRepo, HonorRepoError, PgHonorRepo};
