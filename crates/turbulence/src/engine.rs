use std::future::Future;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use sha2::{Digest, Sha256};

use tempest_core::{TurbulenceAttempt, TurbulenceConfig, TurbulenceInfo, TurbulencePolicy, WorkflowContext};

use crate::error::TurbulenceError;

/// Applies deterministic fault injection (latency, timeout, retry storms)
/// around one action execution, per the merged policy for its
/// `(service, action)` pair.
///
/// Mirrors `TurbulenceEngine` in
/// `windtunnel/turbulence/engine.py`: a policy resolved once up front,
/// then an attempt loop that injects latency before each attempt, wraps
/// the attempt in a deadline if one is configured, and always returns the
/// *last* attempt's outcome regardless of whether it succeeded.
pub struct TurbulenceEngine {
    config: Option<TurbulenceConfig>,
    base_seed: u64,
}

impl TurbulenceEngine {
    #[must_use]
    pub fn new(config: Option<TurbulenceConfig>, base_seed: u64) -> Self {
        Self { config, base_seed }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.is_some()
    }

    #[must_use]
    pub fn resolve_policy(&self, service: &str, action: &str) -> Option<TurbulencePolicy> {
        self.config.as_ref().and_then(|config| config.resolve(service, action))
    }

    /// Run `execute` around the given resolved `policy`, injecting latency
    /// and an optional timeout on each of `1 + policy.retry_count`
    /// attempts, and returning the last attempt's `(ok, status_code,
    /// latency_ms, errors)` tuple plus the full per-attempt log.
    ///
    /// `execute` is re-invoked once per attempt; the caller owns retry
    /// semantics for the wrapped action itself (the turbulence retry
    /// storm is independent of, and composes with, the action's own
    /// retry policy).
    pub async fn apply<F, Fut>(
        &self,
        policy: &TurbulencePolicy,
        service_name: &str,
        action_name: &str,
        instance_id: &str,
        mut execute: F,
    ) -> Result<(AttemptOutcome, TurbulenceInfo), TurbulenceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AttemptOutcome>,
    {
        let retry_count = policy.retry_count.unwrap_or(0);
        let attempts_total = 1 + retry_count;
        let mut info = TurbulenceInfo {
            service: service_name.to_string(),
            action: action_name.to_string(),
            retry_count,
            timeout_after_ms: policy.timeout_after_ms,
            latency_ms: None,
            attempts: Vec::with_capacity(attempts_total as usize),
        };

        let mut last: Option<AttemptOutcome> = None;

        for attempt in 0..attempts_total {
            let injected_latency = self.pick_latency(policy, instance_id, service_name, action_name, attempt);
            if let Some(latency) = injected_latency {
                info.latency_ms = Some(latency);
                tokio::time::sleep(Duration::from_millis(latency)).await;
            }

            let outcome = match policy.timeout_after_ms {
                Some(timeout_ms) => match tokio::time::timeout(Duration::from_millis(timeout_ms), execute()).await {
                    Ok(outcome) => outcome,
                    Err(_elapsed) => AttemptOutcome {
                        ok: false,
                        status_code: None,
                        latency_ms: timeout_ms as f64,
                        errors: vec![format!("Injected timeout after {timeout_ms}ms")],
                    },
                },
                None => execute().await,
            };

            info.attempts.push(TurbulenceAttempt {
                ok: outcome.ok,
                status_code: outcome.status_code,
                latency_ms: outcome.latency_ms,
                injected_latency_ms: injected_latency,
                errors: outcome.errors.clone(),
            });
            last = Some(outcome);
        }

        last.map(|outcome| (outcome, info)).ok_or(TurbulenceError::NoObservation)
    }

    fn pick_latency(&self, policy: &TurbulencePolicy, instance_id: &str, service: &str, action: &str, attempt: u32) -> Option<u64> {
        let range = policy.latency_ms?;
        let seed = derive_seed(self.base_seed, instance_id, service, action, attempt);
        let mut rng = StdRng::seed_from_u64(seed);
        Some(rng.gen_range(range.min..=range.max))
    }
}

/// `Sha256(base_seed:instance_id:service:action:attempt)`, first 8 bytes
/// as a big-endian `u64` — see SPEC_FULL.md §4.6 AMBIENT "Hash-Derived
/// Seed" for why this, rather than re-seeding from the base seed alone,
/// is what gives per-attempt determinism.
fn derive_seed(base_seed: u64, instance_id: &str, service: &str, action: &str, attempt: u32) -> u64 {
    let payload = format!("{base_seed}:{instance_id}:{service}:{action}:{attempt}");
    let digest = Sha256::digest(payload.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// The subset of an Observation the turbulence loop needs to drive
/// retries and report attempts, decoupled from `tempest_core::Observation`
/// so this crate never needs to construct a full one on the caller's
/// behalf.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub ok: bool,
    pub status_code: Option<u16>,
    pub latency_ms: f64,
    pub errors: Vec<String>,
}

/// Injects per-instance step delay and timing jitter from the workflow
/// context into the caller's sleep point (spec §4.5: the two timing keys
/// are "consumed by the Scenario Runner, not exposed to scenario authors
/// as public contract").
pub async fn apply_timing_variation(context: &WorkflowContext) {
    let total_ms = context.step_delay_ms.unwrap_or(0) + context.timing_jitter_ms.unwrap_or(0);
    if total_ms > 0 {
        tokio::time::sleep(Duration::from_millis(total_ms)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempest_core::LatencyRange;

    fn policy(latency: Option<LatencyRange>, timeout_after_ms: Option<u64>, retry_count: Option<u32>) -> TurbulencePolicy {
        TurbulencePolicy {
            latency_ms: latency,
            timeout_after_ms,
            retry_count,
        }
    }

    #[tokio::test]
    async fn runs_exactly_one_plus_retry_count_attempts() {
        tokio::time::pause();
        let engine = TurbulenceEngine::new(None, 42);
        let calls = AtomicU32::new(0);
        let (_outcome, info) = engine
            .apply(&policy(None, None, Some(2)), "svc", "act", "inst-1", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { AttemptOutcome { ok: true, status_code: Some(200), latency_ms: 1.0, errors: vec![] } }
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(info.attempts.len(), 3);
    }

    #[tokio::test]
    async fn latency_seed_is_deterministic_per_attempt() {
        let engine = TurbulenceEngine::new(None, 7);
        let range = LatencyRange { min: 10, max: 20 };
        let first = engine.pick_latency(&policy(Some(range), None, None), "inst-1", "svc", "act", 0);
        let again = engine.pick_latency(&policy(Some(range), None, None), "inst-1", "svc", "act", 0);
        assert_eq!(first, again);
        assert!(first.unwrap() >= 10 && first.unwrap() <= 20);
    }

    #[tokio::test]
    async fn timeout_synthesizes_failed_attempt() {
        tokio::time::pause();
        let engine = TurbulenceEngine::new(None, 1);
        let (outcome, info) = engine
            .apply(&policy(None, Some(50), None), "svc", "act", "inst-1", || async {
                tokio::time::sleep(Duration::from_millis(5_000)).await;
                AttemptOutcome { ok: true, status_code: Some(200), latency_ms: 1.0, errors: vec![] }
            })
            .await
            .unwrap();
        assert!(!outcome.ok);
        assert_eq!(outcome.errors, vec!["Injected timeout after 50ms".to_string()]);
        assert_eq!(info.attempts.len(), 1);
        assert!(!info.attempts[0].ok);
    }

    #[tokio::test]
    async fn last_attempt_outcome_is_returned() {
        tokio::time::pause();
        let engine = TurbulenceEngine::new(None, 1);
        let calls = AtomicU32::new(0);
        let (outcome, _info) = engine
            .apply(&policy(None, None, Some(1)), "svc", "act", "inst-1", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    AttemptOutcome {
                        ok: n == 1,
                        status_code: Some(if n == 1 { 200 } else { 500 }),
                        latency_ms: 1.0,
                        errors: vec![],
                    }
                }
            })
            .await
            .unwrap();
        assert!(outcome.ok);
        assert_eq!(outcome.status_code, Some(200));
    }
}
