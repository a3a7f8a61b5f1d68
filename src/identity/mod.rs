//! Login verification and per-user OS session lifecycle.
//! Keep the public surface thin and split implementation across sub-modules.

mod accounts;
mod authenticator;
mod credential;
mod membership;
mod profile;
mod registry;
mod user;
mod username;
mod verifier;

pub use accounts::ExistenceChecker;
pub use authenticator::WinAuthenticator;
pub use credential::{CredentialLease, LiveToken, OwnedCredential, RawCredential};
pub use membership::MembershipChecker;
pub use profile::{ProfileOutcome, ProfileSessions, ProfileState, SessionPolicy};
pub use registry::{AllowedUsers, UserRegistry};
pub use user::{AuthState, Authenticated, LoginRequest, User};
pub use username::{is_domain_qualified, qualify, split_username, LOCAL_DOMAIN};
pub use verifier::{IdentityVerifier, Verified};
