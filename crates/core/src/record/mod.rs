//! Log records and resource identity.
//!
//! A [`Record`] is the immutable unit the upstream parser hands to the
//! emitter. Records are grouped downstream by the [`ResourceFingerprint`] of
//! their resource attributes.

mod error;
mod fingerprint;
mod types;

pub use error::RecordError;
pub use fingerprint::ResourceFingerprint;
pub use types::{AttributeValue, Attributes, Record, Severity, TraceContext};
