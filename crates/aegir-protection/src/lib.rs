//! aegir Token Protection
//!
//! Issues, protects, and validates the security tokens carried by the
//! protocol pipeline.
//!
//! # Modules
//!
//! - [`error`] - Protection error taxonomy
//! - [`codec`] - Signed self-contained token codec (JWT, HS256) with a
//!   private purpose claim restricting each token to one use
//! - [`protector`] - Purpose-scoped `protect`/`unprotect` capability
//!   (AES-256-GCM with keys derived per purpose chain)
//! - [`validator`] - Format-dispatching token validation with explicit
//!   tri-state results (`NotApplicable | Invalid | Valid`)

pub mod codec;
pub mod error;
pub mod protector;
pub mod validator;

pub use codec::{TokenClaims, TokenCodec, PURPOSE_CLAIM};
pub use error::ProtectionError;
pub use protector::{AesGcmProtector, DataProtector};
pub use validator::{
    purpose_labels, Principal, ReferenceTokenValidator, SelfContainedTokenValidator, TokenFormat,
    TokenFormatValidator, TokenKind, TokenValidator, ValidationOutcome,
};
