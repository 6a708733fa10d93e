//! Deterministic `client_order_id` derivation: a hash of `(run_id,
//! intent_id)` so duplicate `submit_intent` calls for the same intent
//! resolve to the same broker-facing id (retries never double-submit).

use sha2::{Digest, Sha256};
use uuid::Uuid;

pub fn derive(run_id: Uuid, intent_id: Uuid) -> String {
    let mut hasher = Sha256::new();
    hasher.update(run_id.as_bytes());
    hasher.update(intent_id.as_bytes());
    let digest = hasher.finalize();
    format!("co_{}", hex::encode(&digest[..12]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_inputs_produce_same_id() {
        let run_id = Uuid::new_v5(&Uuid::NAMESPACE_DNS, b"run-a");
        let intent_id = Uuid::new_v5(&Uuid::NAMESPACE_DNS, b"intent-1");
        assert_eq!(derive(run_id, intent_id), derive(run_id, intent_id));
    }

    #[test]
    fn different_intents_produce_different_ids() {
        let run_id = Uuid::new_v5(&Uuid::NAMESPACE_DNS, b"run-a");
        let i1 = Uuid::new_v5(&Uuid::NAMESPACE_DNS, b"intent-1");
        let i2 = Uuid::new_v5(&Uuid::NAMESPACE_DNS, b"intent-2");
        assert_ne!(derive(run_id, i1), derive(run_id, i2));
    }
}
