//! Member roster: persistence, service operations and HTTP handlers.

pub mod http;
pub mod repo;
pub mod service;

pub use repo::{MemberRepo, MemberRepoError, PgMemberRepo};
pub use service::{
    EmailSyncReport, MemberEvent, MemberFilter, MemberInput, MemberService, MemberServiceError,
    MemberStats, ProfileInput, UpcomingBirthday,
};
