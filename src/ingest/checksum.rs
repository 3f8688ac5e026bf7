//! Payload fingerprint for duplicate batch detection

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::candidate::{AssignmentCandidate, ShiftCandidate};

#[derive(Serialize)]
struct Payload<'a> {
    shifts: &'a [ShiftCandidate],
    assignments: &'a [AssignmentCandidate],
}

/// SHA-256 (lowercase hex) of the canonical JSON of the candidate records
///
/// Field order is fixed by the record types, so equal payloads always hash
/// the same. Row order is significant.
pub fn payload_checksum(
    shifts: &[ShiftCandidate],
    assignments: &[AssignmentCandidate],
) -> serde_json::Result<String> {
    let bytes = serde_json::to_vec(&Payload {
        shifts,
        assignments,
    })?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}
