//! Shallow PEM envelope check for submitted CSRs.
//!
//! Only the begin marker is looked for. Base64, ASN.1 and the signature are
//! left to the crypto provider.

use crate::error::ValidationError;

pub const CSR_BEGIN_MARKER: &str = "-----BEGIN CERTIFICATE REQUEST-----";

pub fn validate_csr_envelope(text: &str) -> Result<(), ValidationError> {
    if text.contains(CSR_BEGIN_MARKER) {
        Ok(())
    } else {
        Err(ValidationError::InvalidCsrFormat)
    }
}
