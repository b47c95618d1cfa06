//! Authentication relay.
//!
//! Bearer credentials are never decoded locally. Each verification is forwarded, exactly once,
//! to the remote identity service and its verdict is translated into an [`AuthOutcome`].

#![deny(missing_docs)]

mod credential;
mod relay;

pub use credential::Credential;
pub use relay::{AuthOutcome, AuthRelay, REJECTION_REASON, VerifiedIdentity};
