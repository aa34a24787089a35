//! Auth and multi-tenant primitives for the CRM API.

mod jwt;
mod store;

pub use jwt::{issue_token, verify_token, TokenType};
pub use store::{AuthStore, MembershipRecord, OrganizationSummary, UserSummary};
