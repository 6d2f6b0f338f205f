//! Analysis orchestration
//!
//! Picks the provider(s) for a user, consults the result cache, applies the
//! Ollama-to-Gemini fallback or the hybrid comparison, and writes exactly one
//! audit record per call.
//!
//! ```text
//! analyze(user, txs, type, force_refresh)
//!   ├─ force_refresh? ── clear user's cache entries
//!   ├─ cache hit? ────── return cached (audited)
//!   ├─ preferred model
//!   │    ├─ ollama ───── ollama, on error → gemini
//!   │    ├─ hybrid ───── gemini ∥ ollama → combine
//!   │    └─ gemini/auto  gemini
//!   ├─ success? ──────── cache put
//!   └─ audit record
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::cache::{CachedAnalysis, ResultCache};
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::models::{
    AnalysisResult, AnalysisType, AuditStatus, ModelUsage, NewAuditRecord, PerformanceMetrics,
    PreferredModel, TransactionView, UserProfile,
};
use crate::store::AuditLog;

use super::hybrid;
use super::types::{is_success_payload, ProviderError, ProviderKind, ProviderResult, ProviderStatus};
use super::{AIClient, ProviderClient};

/// Namespace of every analysis cache key
pub const CACHE_KEY_PREFIX: &str = "ai_analysis";

/// How many audit records the performance metrics look at
const METRICS_WINDOW: usize = 100;

/// Stable hash of a request's user, analysis type and transaction content
///
/// Each transaction is serialized to JSON with sorted keys and the resulting
/// strings are sorted, so the order the caller passes them in does not matter.
pub fn fingerprint(
    user_id: i64,
    analysis_type: AnalysisType,
    transactions: &[TransactionView],
) -> Result<String> {
    let mut canonical = transactions
        .iter()
        .map(|tx| serde_json::to_value(tx).map(|v| v.to_string()))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    canonical.sort();

    let mut hasher = Sha256::new();
    hasher.update(user_id.to_string().as_bytes());
    hasher.update(b":");
    hasher.update(analysis_type.as_str().as_bytes());
    for tx in &canonical {
        hasher.update(b"\n");
        hasher.update(tx.as_bytes());
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Key prefix shared by all of a user's cache entries
pub fn user_cache_prefix(user_id: i64) -> String {
    format!("{}:{}:", CACHE_KEY_PREFIX, user_id)
}

pub fn cache_key(user_id: i64, analysis_type: AnalysisType, fingerprint: &str) -> String {
    format!(
        "{}{}:{}",
        user_cache_prefix(user_id),
        analysis_type.as_str(),
        fingerprint
    )
}

/// Coordinates providers, the result cache and the audit log
pub struct AnalysisOrchestrator {
    gemini: AIClient,
    ollama: AIClient,
    cache: Arc<ResultCache>,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
}

impl AnalysisOrchestrator {
    pub fn new(
        gemini: AIClient,
        ollama: AIClient,
        cache: Arc<ResultCache>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            gemini,
            ollama,
            cache,
            audit,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use `clock` for audit timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Run one analysis for `user`
    ///
    /// Never fails: provider and internal errors come back as an
    /// `{"error": ...}` analysis payload.
    pub async fn analyze(
        &self,
        user: &UserProfile,
        transactions: &[TransactionView],
        analysis_type: AnalysisType,
        force_refresh: bool,
    ) -> AnalysisResult {
        if force_refresh {
            let removed = self.clear_cache(Some(user.id));
            debug!(user_id = user.id, removed, "Forced refresh cleared cache entries");
        }

        let result = match self.run(user, transactions, analysis_type).await {
            Ok(result) => result,
            Err(e) => {
                error!(user_id = user.id, error = %e, "Analysis failed");
                AnalysisResult {
                    model_used: user.preferred_model.as_str().to_string(),
                    analysis: json!({ "error": e.to_string() }),
                    cached: false,
                }
            }
        };

        let request = json!({
            "analysis_type": analysis_type.as_str(),
            "preferred_model": user.preferred_model.as_str(),
            "transaction_count": transactions.len(),
            "force_refresh": force_refresh,
            "cached": result.cached,
        });
        self.record_audit(user.id, request, &result);

        result
    }

    async fn run(
        &self,
        user: &UserProfile,
        transactions: &[TransactionView],
        analysis_type: AnalysisType,
    ) -> Result<AnalysisResult> {
        let key = cache_key(
            user.id,
            analysis_type,
            &fingerprint(user.id, analysis_type, transactions)?,
        );

        if let Some(hit) = self.cache.get(&key) {
            info!(user_id = user.id, model = %hit.model_used, "Analysis served from cache");
            return Ok(AnalysisResult {
                model_used: hit.model_used,
                analysis: hit.analysis,
                cached: true,
            });
        }

        let (model_used, analysis) = match user.preferred_model {
            PreferredModel::Ollama => {
                self.analyze_with_fallback(user, transactions, analysis_type)
                    .await
            }
            PreferredModel::Hybrid => self.analyze_hybrid(user, transactions, analysis_type).await,
            PreferredModel::Gemini | PreferredModel::Auto => (
                ProviderKind::Gemini.as_str().to_string(),
                into_payload(self.gemini.analyze(analysis_type, transactions).await),
            ),
        };

        if is_success_payload(&analysis) {
            self.cache.put(
                &key,
                CachedAnalysis {
                    model_used: model_used.clone(),
                    analysis: analysis.clone(),
                },
            );
        }

        Ok(AnalysisResult {
            model_used,
            analysis,
            cached: false,
        })
    }

    /// The Ollama client for `user`, pointed at their own server if they have one
    fn ollama_for(&self, user: &UserProfile) -> AIClient {
        match user.ollama_server_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => self.ollama.with_host(url),
            _ => self.ollama.clone(),
        }
    }

    async fn analyze_with_fallback(
        &self,
        user: &UserProfile,
        transactions: &[TransactionView],
        analysis_type: AnalysisType,
    ) -> (String, Value) {
        let ollama = self.ollama_for(user);
        let reason = match ollama.analyze(analysis_type, transactions).await {
            Ok(value) if is_success_payload(&value) => {
                return (ProviderKind::Ollama.as_str().to_string(), value);
            }
            Ok(value) => value
                .get("error")
                .map(|e| e.as_str().map(str::to_string).unwrap_or_else(|| e.to_string()))
                .unwrap_or_default(),
            Err(e) => e.to_string(),
        };

        warn!(
            user_id = user.id,
            reason = %reason,
            "Ollama analysis failed, falling back to Gemini"
        );
        (
            ProviderKind::Gemini.as_str().to_string(),
            into_payload(self.gemini.analyze(analysis_type, transactions).await),
        )
    }

    async fn analyze_hybrid(
        &self,
        user: &UserProfile,
        transactions: &[TransactionView],
        analysis_type: AnalysisType,
    ) -> (String, Value) {
        let shared: Arc<[TransactionView]> = Arc::from(transactions.to_vec());

        let gemini = self.gemini.clone();
        let gemini_txs = Arc::clone(&shared);
        let gemini_task =
            tokio::spawn(async move { gemini.analyze(analysis_type, &gemini_txs).await });

        let ollama = self.ollama_for(user);
        let ollama_txs = Arc::clone(&shared);
        let ollama_task =
            tokio::spawn(async move { ollama.analyze(analysis_type, &ollama_txs).await });

        // Each outcome is joined independently; a panic in one task does not
        // touch the other's result.
        let (gemini_joined, ollama_joined) = tokio::join!(gemini_task, ollama_task);
        let gemini_result = join_outcome(ProviderKind::Gemini, gemini_joined);
        let ollama_result = join_outcome(ProviderKind::Ollama, ollama_joined);

        let outcome = hybrid::combine(analysis_type, &gemini_result, &ollama_result);
        info!(
            user_id = user.id,
            recommended = outcome.source.map(|k| k.as_str()).unwrap_or("none"),
            "Hybrid analysis complete"
        );
        ("hybrid".to_string(), outcome.analysis)
    }

    fn record_audit(&self, user_id: i64, request: Value, result: &AnalysisResult) {
        let (status, error_message) = match result.error_message() {
            Some(msg) => (AuditStatus::Error, Some(msg.to_string())),
            None if result.is_error() => (
                AuditStatus::Error,
                Some(result.analysis["error"].to_string()),
            ),
            None => (AuditStatus::Success, None),
        };

        let record = NewAuditRecord {
            user_id,
            request_payload: request,
            response_payload: result.analysis.clone(),
            model_used: result.model_used.clone(),
            status,
            error_message,
            timestamp: self.clock.now(),
        };

        if let Err(e) = self.audit.record(&record) {
            warn!(user_id, error = %e, "Failed to write analysis audit record");
        }
    }

    /// Drop a user's cached analyses, or everything when `user_id` is `None`
    ///
    /// Returns the number of entries removed.
    pub fn clear_cache(&self, user_id: Option<i64>) -> usize {
        match user_id {
            Some(id) => self.cache.invalidate_by_prefix(&user_cache_prefix(id)),
            None => {
                let removed = self.cache.len();
                self.cache.clear();
                removed
            }
        }
    }

    /// Success and per-model counts over the user's recent audit records
    pub fn get_performance_metrics(&self, user_id: i64) -> Result<PerformanceMetrics> {
        let records = self.audit.recent_for_user(user_id, METRICS_WINDOW)?;

        let mut model_usage: BTreeMap<String, ModelUsage> = BTreeMap::new();
        let mut successful = 0i64;
        for record in &records {
            let usage = model_usage.entry(record.model_used.clone()).or_default();
            usage.count += 1;
            match record.status {
                AuditStatus::Success => {
                    usage.success += 1;
                    successful += 1;
                }
                AuditStatus::Error => usage.error += 1,
            }
        }

        let total = records.len() as i64;
        Ok(PerformanceMetrics {
            total_analyses: total,
            successful_analyses: successful,
            failed_analyses: total - successful,
            success_rate: if total > 0 {
                successful as f64 / total as f64
            } else {
                0.0
            },
            model_usage,
            cache_size: self.cache.len(),
        })
    }

    /// Availability and installed models of both providers
    pub async fn provider_status(&self, user: Option<&UserProfile>) -> Vec<ProviderStatus> {
        let ollama = match user {
            Some(user) => self.ollama_for(user),
            None => self.ollama.clone(),
        };
        let (gemini, ollama) = tokio::join!(self.gemini.status(), ollama.status());
        vec![gemini, ollama]
    }
}

fn into_payload(result: ProviderResult) -> Value {
    result.unwrap_or_else(|e| e.to_payload())
}

fn join_outcome(
    kind: ProviderKind,
    joined: std::result::Result<ProviderResult, tokio::task::JoinError>,
) -> ProviderResult {
    joined.unwrap_or_else(|e| {
        error!(provider = %kind, error = %e, "Provider task aborted");
        Err(ProviderError::Request(format!("{} task failed: {}", kind, e)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;
    use crate::clock::ManualClock;
    use crate::config::CacheConfig;
    use crate::db::Database;
    use chrono::{DateTime, TimeZone, Utc};
    use std::time::Duration;

    struct Harness {
        gemini: MockBackend,
        ollama: MockBackend,
        db: Arc<Database>,
        orchestrator: AnalysisOrchestrator,
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn harness(gemini: MockBackend, ollama: MockBackend) -> Harness {
        let clock = Arc::new(ManualClock::new(start()));
        let cache = Arc::new(ResultCache::with_clock(
            &CacheConfig {
                capacity: 100,
                ttl: Duration::from_secs(3600),
            },
            clock.clone(),
        ));
        let db = Arc::new(Database::in_memory().unwrap());
        let orchestrator = AnalysisOrchestrator::new(
            AIClient::Mock(gemini.clone()),
            AIClient::Mock(ollama.clone()),
            cache,
            db.clone(),
        )
        .with_clock(clock);

        Harness {
            gemini,
            ollama,
            db,
            orchestrator,
        }
    }

    fn user(preferred_model: PreferredModel) -> UserProfile {
        UserProfile {
            id: 7,
            username: "dana".into(),
            email: "dana@example.com".into(),
            preferred_model,
            ollama_server_url: None,
            created_at: start(),
        }
    }

    fn tx(amount: f64, merchant: &str) -> TransactionView {
        TransactionView {
            amount,
            transaction_type: "debit".into(),
            date: start(),
            merchant_name: merchant.into(),
            category: "Food".into(),
            memo: String::new(),
        }
    }

    #[test]
    fn test_fingerprint_ignores_order() {
        let a = [tx(1.0, "A"), tx(2.0, "B")];
        let b = [tx(2.0, "B"), tx(1.0, "A")];
        assert_eq!(
            fingerprint(1, AnalysisType::Pattern, &a).unwrap(),
            fingerprint(1, AnalysisType::Pattern, &b).unwrap()
        );
        assert_ne!(
            fingerprint(1, AnalysisType::Pattern, &a).unwrap(),
            fingerprint(2, AnalysisType::Pattern, &a).unwrap()
        );
        assert_ne!(
            fingerprint(1, AnalysisType::Pattern, &a).unwrap(),
            fingerprint(1, AnalysisType::Report, &a).unwrap()
        );
    }

    #[test]
    fn test_cache_key_format() {
        assert_eq!(
            cache_key(12, AnalysisType::Report, "abc"),
            "ai_analysis:12:report:abc"
        );
        assert!(!cache_key(12, AnalysisType::Report, "abc").starts_with(&user_cache_prefix(1)));
    }

    #[tokio::test]
    async fn test_gemini_success_is_cached_and_audited() {
        let h = harness(
            MockBackend::new(ProviderKind::Gemini),
            MockBackend::new(ProviderKind::Ollama),
        );
        let user = user(PreferredModel::Gemini);
        let txs = [tx(12.5, "Cafe")];

        let first = h
            .orchestrator
            .analyze(&user, &txs, AnalysisType::Pattern, false)
            .await;
        assert_eq!(first.model_used, "gemini");
        assert!(!first.cached);

        let second = h
            .orchestrator
            .analyze(&user, &txs, AnalysisType::Pattern, false)
            .await;
        assert!(second.cached);
        assert_eq!(second.analysis, first.analysis);
        assert_eq!(h.gemini.calls(), 1);

        let logs = h.db.list_analysis_logs(user.id, 10).unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|l| l.status == AuditStatus::Success));
    }

    #[tokio::test]
    async fn test_force_refresh_bypasses_cache() {
        let h = harness(
            MockBackend::new(ProviderKind::Gemini),
            MockBackend::new(ProviderKind::Ollama),
        );
        let user = user(PreferredModel::Auto);
        let txs = [tx(3.0, "Bus")];

        h.orchestrator
            .analyze(&user, &txs, AnalysisType::Report, false)
            .await;
        let refreshed = h
            .orchestrator
            .analyze(&user, &txs, AnalysisType::Report, true)
            .await;
        assert!(!refreshed.cached);
        assert_eq!(h.gemini.calls(), 2);
    }

    #[tokio::test]
    async fn test_ollama_error_payload_falls_back_to_gemini() {
        let h = harness(
            MockBackend::new(ProviderKind::Gemini),
            MockBackend::new(ProviderKind::Ollama).with_response(json!({"error": "unreachable"})),
        );
        let user = user(PreferredModel::Ollama);

        let result = h
            .orchestrator
            .analyze(&user, &[tx(5.0, "Deli")], AnalysisType::Pattern, false)
            .await;
        assert_eq!(result.model_used, "gemini");
        assert!(!result.is_error());
        assert_eq!(h.ollama.calls(), 1);
        assert_eq!(h.gemini.calls(), 1);
    }

    #[tokio::test]
    async fn test_ollama_success_keeps_ollama() {
        let h = harness(
            MockBackend::new(ProviderKind::Gemini),
            MockBackend::new(ProviderKind::Ollama),
        );
        let user = user(PreferredModel::Ollama);

        let result = h
            .orchestrator
            .analyze(&user, &[], AnalysisType::Optimization, false)
            .await;
        assert_eq!(result.model_used, "ollama");
        assert_eq!(h.gemini.calls(), 0);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached_and_audited_as_error() {
        let h = harness(
            MockBackend::new(ProviderKind::Gemini)
                .failing(ProviderError::Unavailable("Gemini API not configured".into())),
            MockBackend::new(ProviderKind::Ollama),
        );
        let user = user(PreferredModel::Gemini);

        let result = h
            .orchestrator
            .analyze(&user, &[], AnalysisType::Pattern, false)
            .await;
        assert_eq!(result.error_message(), Some("Gemini API not configured"));
        assert!(h.orchestrator.cache().is_empty());

        let logs = h.db.list_analysis_logs(user.id, 10).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, AuditStatus::Error);
        assert_eq!(logs[0].error_message.as_deref(), Some("Gemini API not configured"));
    }

    #[tokio::test]
    async fn test_hybrid_runs_both_concurrently() {
        let delay = Duration::from_millis(200);
        let h = harness(
            MockBackend::new(ProviderKind::Gemini).with_delay(delay),
            MockBackend::new(ProviderKind::Ollama).with_delay(delay),
        );
        let user = user(PreferredModel::Hybrid);

        let started = tokio::time::Instant::now();
        let result = h
            .orchestrator
            .analyze(&user, &[tx(9.0, "Gym")], AnalysisType::Pattern, false)
            .await;
        let elapsed = started.elapsed();

        // Sequential calls would take at least 2 * delay
        assert!(elapsed >= delay);
        assert!(elapsed < delay * 2, "hybrid calls ran sequentially: {elapsed:?}");
        assert_eq!(result.model_used, "hybrid");
        assert_eq!(result.analysis["recommended_result"]["source"], "gemini");
        assert_eq!(h.gemini.calls(), 1);
        assert_eq!(h.ollama.calls(), 1);
        assert_eq!(h.orchestrator.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_hybrid_total_failure() {
        let h = harness(
            MockBackend::new(ProviderKind::Gemini)
                .failing(ProviderError::Timeout(Duration::from_secs(60))),
            MockBackend::new(ProviderKind::Ollama).unavailable(),
        );
        let user = user(PreferredModel::Hybrid);

        let result = h
            .orchestrator
            .analyze(&user, &[], AnalysisType::Report, false)
            .await;
        assert_eq!(result.error_message(), Some(hybrid::ALL_PROVIDERS_FAILED));
        assert!(h.orchestrator.cache().is_empty());
    }

    #[tokio::test]
    async fn test_clear_cache_scoped_to_user() {
        let h = harness(
            MockBackend::new(ProviderKind::Gemini),
            MockBackend::new(ProviderKind::Ollama),
        );
        let mut other = user(PreferredModel::Gemini);
        other.id = 70;
        let user = user(PreferredModel::Gemini);

        h.orchestrator
            .analyze(&user, &[], AnalysisType::Pattern, false)
            .await;
        h.orchestrator
            .analyze(&other, &[], AnalysisType::Pattern, false)
            .await;
        assert_eq!(h.orchestrator.cache().len(), 2);

        assert_eq!(h.orchestrator.clear_cache(Some(user.id)), 1);
        assert_eq!(h.orchestrator.cache().len(), 1);
        assert_eq!(h.orchestrator.clear_cache(None), 1);
        assert!(h.orchestrator.cache().is_empty());
    }

    #[tokio::test]
    async fn test_performance_metrics() {
        let h = harness(
            MockBackend::new(ProviderKind::Gemini),
            MockBackend::new(ProviderKind::Ollama),
        );
        let user = user(PreferredModel::Gemini);

        let empty = h.orchestrator.get_performance_metrics(user.id).unwrap();
        assert_eq!(empty.total_analyses, 0);
        assert_eq!(empty.success_rate, 0.0);

        h.gemini.push_outcome(Err(ProviderError::Request("503".into())));
        h.orchestrator
            .analyze(&user, &[], AnalysisType::Pattern, false)
            .await;
        h.orchestrator
            .analyze(&user, &[], AnalysisType::Pattern, false)
            .await;
        h.orchestrator
            .analyze(&user, &[], AnalysisType::Pattern, false)
            .await;

        let metrics = h.orchestrator.get_performance_metrics(user.id).unwrap();
        assert_eq!(metrics.total_analyses, 3);
        assert_eq!(metrics.successful_analyses, 2);
        assert_eq!(metrics.failed_analyses, 1);
        assert!((metrics.success_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(
            metrics.model_usage.get("gemini"),
            Some(&ModelUsage {
                count: 3,
                success: 2,
                error: 1
            })
        );
        assert_eq!(metrics.cache_size, 1);
    }

    #[tokio::test]
    async fn test_provider_status() {
        let h = harness(
            MockBackend::new(ProviderKind::Gemini),
            MockBackend::new(ProviderKind::Ollama).unavailable(),
        );
        let statuses = h.orchestrator.provider_status(None).await;
        assert_eq!(statuses.len(), 2);
        assert!(statuses[0].available);
        assert!(!statuses[1].available);
    }
}
