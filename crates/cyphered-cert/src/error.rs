//! Certificate issuance errors

use crate::issuer::PemKind;
use std::io;
use thiserror::Error;

/// Any failure while issuing a certificate. None of them are retried.
#[derive(Debug, Error)]
pub enum IssuanceError {
    #[error("Failed to generate private key: {0}")]
    KeyGeneration(String),

    #[error("Failed to generate serial number: {0}")]
    SerialNumber(String),

    #[error("Failed to create certificate: {0}")]
    Encoding(String),

    #[error("Failed to open {kind} file for writing")]
    FileCreate {
        kind: PemKind,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write data to {kind} file")]
    FileWrite {
        kind: PemKind,
        #[source]
        source: io::Error,
    },

    #[error("Error closing {kind} file")]
    FileClose {
        kind: PemKind,
        #[source]
        source: io::Error,
    },
}
