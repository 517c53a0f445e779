//! Ephemeral TLS credentials for the cyphered file server
//!
//! [`CertificateIssuer`] produces a self-signed certificate and key as PEM
//! files in the temp directory, and [`LifecycleGuard`] removes them when the
//! process is interrupted or terminated.

pub mod error;
pub mod guard;
pub mod issuer;

pub use error::IssuanceError;
pub use guard::{LifecycleGuard, ShutdownSignal};
pub use issuer::{
    CertificateIssuer, CertificateTemplate, HostName, IssuedCertificate, PemKind,
    DEFAULT_ORGANIZATION, DEFAULT_VALIDITY_DAYS,
};
