//! # Faulty Channel
//!
//! A seeded channel that corrupts each replica of a redundancy set
//! independently with a fixed probability. Used to exercise the corrector
//! against the error rate a [`FaultToleranceConfig`] declares.
//!
//! A corruption either drops one object key or perturbs one leaf:
//! numbers shift, strings gain a suffix, booleans flip, and nulls or empty
//! containers become a number.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Number, Value};

use sema_core::CoherenceError;

use crate::config::FaultToleranceConfig;
use crate::redundancy::{RedundancySet, Replica};

/// The result of one transmission.
#[derive(Debug, Clone, PartialEq)]
pub struct Transmission {
    /// What arrived.
    pub received: RedundancySet,
    /// Provenance of every replica the channel corrupted.
    pub corrupted: Vec<usize>,
}

/// Deterministic fault injector.
#[derive(Debug)]
pub struct FaultyChannel {
    rng: StdRng,
    error_rate: f64,
}

impl FaultyChannel {
    /// A channel corrupting each replica with probability `error_rate`.
    pub fn new(seed: u64, error_rate: f64) -> Result<Self, CoherenceError> {
        if !error_rate.is_finite() || !(0.0..=1.0).contains(&error_rate) {
            return Err(CoherenceError::InvalidThreshold(error_rate));
        }
        Ok(Self {
            rng: StdRng::seed_from_u64(seed),
            error_rate,
        })
    }

    /// A channel at the config's expected error rate.
    pub fn from_config(seed: u64, config: &FaultToleranceConfig) -> Result<Self, CoherenceError> {
        Self::new(seed, config.expected_error_rate)
    }

    /// Probability that a single replica is corrupted.
    pub fn error_rate(&self) -> f64 {
        self.error_rate
    }

    /// Pass `set` through the channel.
    pub fn transmit(&mut self, set: &RedundancySet) -> Result<Transmission, CoherenceError> {
        let mut corrupted = Vec::new();
        let mut members = Vec::with_capacity(set.len());
        for replica in set.members() {
            let mut value = replica.value.clone();
            if self.rng.gen_bool(self.error_rate) {
                self.corrupt(&mut value.payload);
                corrupted.push(replica.provenance);
            }
            members.push(Replica::new(replica.provenance, value));
        }
        if !corrupted.is_empty() {
            tracing::debug!(corrupted = corrupted.len(), members = set.len(), "channel corrupted replicas");
        }
        Ok(Transmission {
            received: RedundancySet::new(members)?,
            corrupted,
        })
    }

    fn corrupt(&mut self, payload: &mut Value) {
        match payload {
            Value::Object(map) if !map.is_empty() => {
                let idx = self.rng.gen_range(0..map.len());
                let Some(key) = map.keys().nth(idx).cloned() else {
                    return;
                };
                if self.rng.gen_bool(0.5) {
                    map.remove(&key);
                } else if let Some(child) = map.get_mut(&key) {
                    self.corrupt(child);
                }
            }
            Value::Array(items) if !items.is_empty() => {
                let idx = self.rng.gen_range(0..items.len());
                self.corrupt(&mut items[idx]);
            }
            Value::Number(n) => {
                let delta = self.rng.gen_range(1..=1000);
                *payload = match (n.as_i64(), n.as_f64()) {
                    (Some(i), _) => Value::from(i.wrapping_add(delta)),
                    (None, Some(f)) => Number::from_f64(f + delta as f64)
                        .map(Value::Number)
                        .unwrap_or(Value::Null),
                    (None, None) => Value::Null,
                };
            }
            Value::String(s) => s.push('~'),
            Value::Bool(b) => *b = !*b,
            Value::Null | Value::Object(_) | Value::Array(_) => {
                *payload = Value::from(self.rng.gen_range(1..=1000_i64));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sema_core::{FormatId, Representation};
    use serde_json::json;

    fn set(n: usize) -> RedundancySet {
        let value = Representation::new(
            FormatId::new("packed").unwrap(),
            json!({"sensor": {"id": "t-1"}, "temperature": 21.5, "ok": true}),
        );
        RedundancySet::encode(&value, n).unwrap()
    }

    #[test]
    fn zero_rate_is_lossless() {
        let mut ch = FaultyChannel::new(7, 0.0).unwrap();
        let sent = set(5);
        let t = ch.transmit(&sent).unwrap();
        assert_eq!(t.received, sent);
        assert!(t.corrupted.is_empty());
    }

    #[test]
    fn full_rate_corrupts_every_replica() {
        let mut ch = FaultyChannel::new(7, 1.0).unwrap();
        let sent = set(4);
        let t = ch.transmit(&sent).unwrap();
        assert_eq!(t.corrupted, vec![0, 1, 2, 3]);
        for (got, orig) in t.received.members().iter().zip(sent.members()) {
            assert_ne!(got.value, orig.value);
            assert_eq!(got.provenance, orig.provenance);
        }
    }

    #[test]
    fn same_seed_same_faults() {
        let sent = set(9);
        let a = FaultyChannel::new(42, 0.4).unwrap().transmit(&sent).unwrap();
        let b = FaultyChannel::new(42, 0.4).unwrap().transmit(&sent).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rate_out_of_range_rejected() {
        assert!(FaultyChannel::new(1, 1.2).is_err());
        assert!(FaultyChannel::new(1, f64::NAN).is_err());
        let cfg = FaultToleranceConfig::default();
        assert_eq!(FaultyChannel::from_config(1, &cfg).unwrap().error_rate(), 0.05);
    }

    #[test]
    fn every_leaf_kind_changes() {
        let mut ch = FaultyChannel::new(3, 1.0).unwrap();
        for original in [json!(5), json!(2.5), json!("a"), json!(false), json!(null), json!({}), json!([])] {
            let mut v = original.clone();
            ch.corrupt(&mut v);
            assert_ne!(v, original);
        }
    }
}
