//! Multi-engine translation with latency-ranked fallback, retry and timeout

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::core::config::TranslatorConfig;
use crate::core::errors::{Result, TranslationError};
use crate::core::language::{alternate_target, is_echo, is_same_lang};
use crate::core::latency::LatencyTracker;
use crate::core::models::{ProviderReply, TranslationRequest, TranslationResult};
use crate::providers::{Provider, ProviderRegistry};

/// Attempts per engine before moving on
pub const MAX_RETRIES: u32 = 2;
/// Fixed pause between attempts on the same engine
pub const RETRY_DELAY: Duration = Duration::from_millis(1000);
/// Deadline for a single provider call
pub const TRANSLATE_TIMEOUT: Duration = Duration::from_secs(30);
/// Failures kept in the aggregated error
pub const ERROR_DIGEST_LEN: usize = 3;

/// One digest entry, always prefixed with the engine name
fn digest_line(engine: &str, err: TranslationError) -> String {
    match err {
        TranslationError::ProviderError { .. } | TranslationError::TimeoutError { .. } => {
            err.to_string()
        }
        other => format!("[{}] {}", engine, other),
    }
}

/// Tunables for one orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub call_timeout: Duration,
    pub max_text_length: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            retry_delay: RETRY_DELAY,
            call_timeout: TRANSLATE_TIMEOUT,
            max_text_length: 4000,
        }
    }
}

impl From<&TranslatorConfig> for OrchestratorSettings {
    fn from(config: &TranslatorConfig) -> Self {
        Self {
            max_retries: config.max_retries.max(1),
            retry_delay: config.retry_delay(),
            call_timeout: config.timeout(),
            max_text_length: config.max_text_length,
        }
    }
}

/// Translation orchestrator
///
/// Stateless per request; the registry and latency tracker are the only
/// shared state and neither is locked across an `.await`.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<ProviderRegistry>,
    latency: Arc<LatencyTracker>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        latency: Arc<LatencyTracker>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            registry,
            latency,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    pub fn latency(&self) -> &Arc<LatencyTracker> {
        &self.latency
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    fn validate(&self, request: &TranslationRequest) -> Result<()> {
        if request.text.trim().is_empty() {
            return Err(TranslationError::validation("text is empty"));
        }

        let length = request.text.chars().count();
        if length > self.settings.max_text_length {
            return Err(TranslationError::validation(format!(
                "text too long: {} characters (max {})",
                length, self.settings.max_text_length
            )));
        }

        Ok(())
    }

    /// Configured engines other than `primary`, fastest mean first; engines
    /// without samples keep catalog order at the back
    pub fn fallback_engines(&self, primary: &str) -> Vec<String> {
        let mut ranked: Vec<(String, Option<f64>)> = self
            .registry
            .available_engines()
            .into_iter()
            .filter(|engine| engine != primary)
            .map(|engine| {
                let mean = self.latency.mean_latency(&engine);
                (engine, mean)
            })
            .collect();

        ranked.sort_by(|(_, a), (_, b)| match (a, b) {
            (Some(a), Some(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });

        ranked.into_iter().map(|(engine, _)| engine).collect()
    }

    /// Ordered engines to try for `preferred`
    pub fn try_list(&self, preferred: &str) -> Vec<String> {
        let primary = preferred.trim().to_lowercase();
        let mut list = vec![primary.clone()];
        list.extend(self.fallback_engines(&primary));
        list
    }

    async fn call_with_timeout(
        &self,
        engine: &str,
        provider: &dyn Provider,
        text: &str,
        target_lang: &str,
        source_lang: &str,
    ) -> Result<ProviderReply> {
        let start = Instant::now();
        match timeout(
            self.settings.call_timeout,
            provider.translate(text, target_lang, source_lang),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(TranslationError::TimeoutError {
                engine: engine.to_string(),
                elapsed_secs: start.elapsed().as_secs_f64(),
                limit_secs: self.settings.call_timeout.as_secs_f64(),
            }),
        }
    }

    /// Re-target an echoed reply when the text was already in the target
    /// language. Returns `None` to keep the echoed result.
    async fn smart_switch(
        &self,
        engine: &str,
        provider: &dyn Provider,
        request: &TranslationRequest,
        detected: &str,
    ) -> Option<(String, &'static str)> {
        let alt = alternate_target(&request.target_lang);
        info!(
            "[{}] {} = {}, switching target to {}",
            engine, detected, request.target_lang, alt
        );

        match self
            .call_with_timeout(engine, provider, &request.text, alt, &request.source_lang)
            .await
        {
            Ok(reply)
                if !reply.translation.trim().is_empty()
                    && !is_echo(&request.text, &reply.translation) =>
            {
                Some((reply.translation, alt))
            }
            Ok(_) => {
                debug!("[{}] switched call echoed the input again", engine);
                None
            }
            Err(e) => {
                warn!("[{}] same-language switch failed: {}", engine, e);
                None
            }
        }
    }

    /// Translate through the fallback chain
    pub async fn translate(&self, request: &TranslationRequest) -> Result<TranslationResult> {
        self.validate(request)?;

        let primary = request.preferred_engine.trim().to_lowercase();
        let try_list = self.try_list(&primary);
        let mut errors: Vec<String> = Vec::new();

        for engine in &try_list {
            let model = if *engine == primary {
                request.model.as_deref()
            } else {
                None
            };

            let provider = match self.registry.get_provider(engine, model) {
                Ok(provider) => provider,
                Err(e) if !e.counts_as_attempt() => {
                    debug!("[{}] skipped: {}", engine, e);
                    continue;
                }
                Err(e) => {
                    warn!("[{}] unavailable: {}", engine, e);
                    errors.push(digest_line(engine, e));
                    continue;
                }
            };

            for attempt in 1..=self.settings.max_retries {
                let started = Instant::now();
                info!(
                    "[{}] translating (attempt {}): {}... → {}",
                    engine,
                    attempt,
                    request.text.chars().take(60).collect::<String>(),
                    request.target_lang
                );

                let outcome = self
                    .call_with_timeout(
                        engine,
                        provider.as_ref(),
                        &request.text,
                        &request.target_lang,
                        &request.source_lang,
                    )
                    .await
                    .and_then(|reply| {
                        if reply.translation.trim().is_empty() {
                            Err(TranslationError::provider(engine, "empty translation"))
                        } else {
                            Ok(reply)
                        }
                    });

                match outcome {
                    Ok(reply) => {
                        let mut result = TranslationResult {
                            translation: reply.translation,
                            detected_lang: reply.detected_lang,
                            target_lang: request.target_lang.clone(),
                            engine: engine.clone(),
                            latency_seconds: 0.0,
                        };

                        if is_same_lang(&result.detected_lang, &request.target_lang)
                            && is_echo(&request.text, &result.translation)
                        {
                            if let Some((translation, alt)) = self
                                .smart_switch(engine, provider.as_ref(), request, &result.detected_lang)
                                .await
                            {
                                result.translation = translation;
                                result.target_lang = alt.to_string();
                            }
                        }

                        let elapsed = started.elapsed();
                        self.latency.record(engine, elapsed);
                        result.latency_seconds = elapsed.as_secs_f64();

                        if *engine != primary {
                            info!("[{}] fell back from {}", engine, primary);
                        }
                        info!(
                            "[{}] done {} → {} in {:.2}s",
                            engine, result.detected_lang, result.target_lang, result.latency_seconds
                        );
                        return Ok(result);
                    }
                    Err(e) if !e.counts_as_attempt() => {
                        warn!("[{}] giving up without retry: {}", engine, e);
                        errors.push(digest_line(engine, e));
                        break;
                    }
                    Err(e) => {
                        if matches!(e, TranslationError::TimeoutError { .. }) {
                            warn!("[{}] attempt {} timed out: {}", engine, attempt, e);
                        } else {
                            warn!("[{}] attempt {} failed: {}", engine, attempt, e);
                        }
                        errors.push(digest_line(engine, e));

                        if attempt == self.settings.max_retries {
                            warn!("[{}] exhausted {} attempts", engine, attempt);
                        }
                    }
                }

                if attempt < self.settings.max_retries {
                    sleep(self.settings.retry_delay).await;
                }
            }
        }

        if errors.is_empty() {
            errors.push(format!(
                "no usable engine (tried: {})",
                try_list.join(", ")
            ));
        }
        let keep_from = errors.len().saturating_sub(ERROR_DIGEST_LEN);
        Err(TranslationError::AllEnginesFailed {
            digest: errors.split_off(keep_from),
        })
    }

    /// Round-trip a short probe through one engine
    pub async fn probe(&self, engine: &str) -> Result<Duration> {
        let provider = self.registry.get_provider(engine, None)?;
        let started = Instant::now();
        self.call_with_timeout(engine, provider.as_ref(), "hello", "中文", "auto")
            .await?;
        Ok(started.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderFactory;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use tokio_test::{assert_err, assert_ok};

    /// Scripted reply for one call
    #[derive(Clone)]
    enum Step {
        Reply(&'static str, &'static str),
        Fail,
        Misconfigured,
        Hang,
    }

    /// Replies by target language; the last step repeats
    struct ScriptedProvider {
        name: String,
        steps: Mutex<Vec<Step>>,
        by_target: HashMap<&'static str, Step>,
        calls: Arc<AtomicUsize>,
        targets: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn model(&self) -> &str {
            "scripted"
        }

        async fn translate(&self, _text: &str, target: &str, _: &str) -> Result<ProviderReply> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            self.targets.lock().push(target.to_string());
            let step = match self.by_target.get(target) {
                Some(step) => step.clone(),
                None => {
                    let mut steps = self.steps.lock();
                    if steps.len() > 1 {
                        steps.remove(0)
                    } else {
                        steps[0].clone()
                    }
                }
            };
            match step {
                Step::Reply(detected, translation) => Ok(ProviderReply {
                    detected_lang: detected.to_string(),
                    translation: translation.to_string(),
                }),
                Step::Fail => Err(TranslationError::provider(&self.name, "upstream 503")),
                Step::Misconfigured => Err(TranslationError::config("model not found")),
                Step::Hang => {
                    sleep(Duration::from_secs(5)).await;
                    Err(TranslationError::provider(&self.name, "unreachable"))
                }
            }
        }
    }

    #[derive(Default)]
    struct Harness {
        scripts: HashMap<String, (Vec<Step>, HashMap<&'static str, Step>)>,
        calls: HashMap<String, Arc<AtomicUsize>>,
        targets: HashMap<String, Arc<Mutex<Vec<String>>>>,
    }

    impl Harness {
        fn engine(mut self, name: &str, steps: Vec<Step>) -> Self {
            self.scripts.insert(name.to_string(), (steps, HashMap::new()));
            self.calls.insert(name.to_string(), Arc::new(AtomicUsize::new(0)));
            self.targets
                .insert(name.to_string(), Arc::new(Mutex::new(Vec::new())));
            self
        }

        fn on_target(mut self, name: &str, target: &'static str, step: Step) -> Self {
            self.scripts.get_mut(name).unwrap().1.insert(target, step);
            self
        }

        fn calls(&self, name: &str) -> usize {
            self.calls[name].load(AtomicOrdering::SeqCst)
        }

        fn targets(&self, name: &str) -> Vec<String> {
            self.targets[name].lock().clone()
        }

        fn build_with(
            &self,
            latency: Arc<LatencyTracker>,
            settings: OrchestratorSettings,
        ) -> Orchestrator {
            let factory = Arc::new(HarnessFactory {
                providers: Mutex::new(
                    self.scripts
                        .iter()
                        .map(|(name, (steps, by_target))| {
                            let provider: Arc<dyn Provider> = Arc::new(ScriptedProvider {
                                name: name.clone(),
                                steps: Mutex::new(steps.clone()),
                                by_target: by_target.clone(),
                                calls: self.calls[name].clone(),
                                targets: self.targets[name].clone(),
                            });
                            (name.clone(), provider)
                        })
                        .collect(),
                ),
            });
            let credentials: BTreeMap<String, String> = self
                .scripts
                .keys()
                .map(|name| (name.clone(), "key".to_string()))
                .collect();
            let registry = Arc::new(ProviderRegistry::new(factory, credentials));
            Orchestrator::new(registry, latency, settings)
        }

        fn build(&self, latency: Arc<LatencyTracker>) -> Orchestrator {
            self.build_with(
                latency,
                OrchestratorSettings {
                    max_retries: 2,
                    retry_delay: Duration::from_millis(5),
                    call_timeout: Duration::from_millis(100),
                    max_text_length: 50,
                },
            )
        }
    }

    struct HarnessFactory {
        providers: Mutex<HashMap<String, Arc<dyn Provider>>>,
    }

    impl ProviderFactory for HarnessFactory {
        fn create(&self, engine: &str, _: &str, _: Option<&str>) -> Result<Arc<dyn Provider>> {
            self.providers
                .lock()
                .get(engine)
                .cloned()
                .ok_or_else(|| TranslationError::config(engine))
        }
    }

    fn ok(translation: &'static str) -> Step {
        Step::Reply("English", translation)
    }

    #[tokio::test]
    async fn test_preferred_engine_answers() {
        let harness = Harness::default()
            .engine("openai", vec![ok("你好")])
            .engine("claude", vec![ok("不该用到")]);
        let orchestrator = harness.build(Arc::new(LatencyTracker::new()));

        let result = assert_ok!(
            orchestrator
                .translate(&TranslationRequest::new("Hello", "中文", "openai"))
                .await
        );

        assert_eq!(result.engine, "openai");
        assert_eq!(result.translation, "你好");
        assert_eq!(result.target_lang, "中文");
        assert_eq!(harness.calls("claude"), 0);
        assert_eq!(orchestrator.latency().sample_count("openai"), 1);
    }

    #[tokio::test]
    async fn test_falls_back_after_exhausting_retries() {
        let harness = Harness::default()
            .engine("openai", vec![Step::Fail])
            .engine("claude", vec![ok("你好")]);
        let orchestrator = harness.build(Arc::new(LatencyTracker::new()));

        let result = assert_ok!(
            orchestrator
                .translate(&TranslationRequest::new("Hello", "中文", "openai"))
                .await
        );

        assert_eq!(result.engine, "claude");
        assert_eq!(harness.calls("openai"), MAX_RETRIES as usize);
        assert_eq!(harness.calls("claude"), 1);
        assert_eq!(orchestrator.latency().mean_latency("openai"), None);
    }

    #[tokio::test]
    async fn test_retry_recovers_on_same_engine() {
        let harness = Harness::default()
            .engine("openai", vec![Step::Fail, ok("你好")])
            .engine("claude", vec![ok("备用")]);
        let orchestrator = harness.build(Arc::new(LatencyTracker::new()));

        let result = orchestrator
            .translate(&TranslationRequest::new("Hello", "中文", "openai"))
            .await
            .unwrap();

        assert_eq!(result.engine, "openai");
        assert_eq!(harness.calls("openai"), 2);
        assert_eq!(harness.calls("claude"), 0);
    }

    #[tokio::test]
    async fn test_attempts_bounded_and_digest_truncated() {
        let harness = Harness::default()
            .engine("deepseek", vec![Step::Fail])
            .engine("openai", vec![Step::Fail])
            .engine("claude", vec![Step::Reply("English", "   ")]);
        let orchestrator = harness.build(Arc::new(LatencyTracker::new()));

        let err = assert_err!(
            orchestrator
                .translate(&TranslationRequest::new("Hello", "中文", "deepseek"))
                .await
        );

        for engine in ["deepseek", "openai", "claude"] {
            assert_eq!(harness.calls(engine), MAX_RETRIES as usize);
        }
        match err {
            TranslationError::AllEnginesFailed { digest } => {
                assert_eq!(digest.len(), ERROR_DIGEST_LEN);
                assert!(digest[0].starts_with("[openai]"));
                assert_eq!(digest[2], "[claude] empty translation");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_counts_as_attempt_and_is_labelled() {
        let harness = Harness::default().engine("gemini", vec![Step::Hang]);
        let orchestrator = harness.build(Arc::new(LatencyTracker::new()));

        let err = orchestrator
            .translate(&TranslationRequest::new("Hello", "中文", "gemini"))
            .await
            .unwrap_err();

        assert_eq!(harness.calls("gemini"), 2);
        match err {
            TranslationError::AllEnginesFailed { digest } => {
                assert_eq!(digest.len(), 2);
                assert!(digest.iter().all(|d| d.starts_with("[gemini] timed out")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unconfigured_preferred_engine_is_skipped() {
        let harness = Harness::default().engine("mistral", vec![ok("你好")]);
        let orchestrator = harness.build(Arc::new(LatencyTracker::new()));

        let result = orchestrator
            .translate(&TranslationRequest::new("Hello", "中文", "claude"))
            .await
            .unwrap();

        assert_eq!(result.engine, "mistral");
    }

    #[tokio::test]
    async fn test_validation_rejects_before_any_call() {
        let harness = Harness::default().engine("openai", vec![ok("x")]);
        let orchestrator = harness.build(Arc::new(LatencyTracker::new()));

        let long_text = "a".repeat(51);
        for text in ["", "   ", long_text.as_str()] {
            let err = orchestrator
                .translate(&TranslationRequest::new(text, "中文", "openai"))
                .await
                .unwrap_err();
            assert!(matches!(err, TranslationError::ValidationError { .. }));
        }
        assert_eq!(harness.calls("openai"), 0);
    }

    #[tokio::test]
    async fn test_fallbacks_ranked_by_latency_unknown_last() {
        let latency = Arc::new(LatencyTracker::new());
        latency.record("groq", Duration::from_millis(800));
        latency.record("claude", Duration::from_millis(300));

        let harness = Harness::default()
            .engine("deepseek", vec![ok("a")])
            .engine("openai", vec![ok("b")])
            .engine("claude", vec![ok("c")])
            .engine("gemini", vec![ok("d")])
            .engine("groq", vec![ok("e")]);
        let orchestrator = harness.build(latency);

        assert_eq!(
            orchestrator.try_list("gemini"),
            vec!["gemini", "claude", "groq", "deepseek", "openai"]
        );
    }

    #[tokio::test]
    async fn test_smart_switch_retargets_echo() {
        let harness = Harness::default()
            .engine("openai", vec![Step::Reply("中文", "你好")])
            .on_target("openai", "English", Step::Reply("中文", "Hello"));
        let orchestrator = harness.build(Arc::new(LatencyTracker::new()));

        let result = orchestrator
            .translate(&TranslationRequest::new("你好", "中文", "openai"))
            .await
            .unwrap();

        assert_eq!(result.target_lang, "English");
        assert_eq!(result.translation, "Hello");
        assert_eq!(result.detected_lang, "中文");
        assert_eq!(harness.targets("openai"), vec!["中文", "English"]);
    }

    #[tokio::test]
    async fn test_smart_switch_failure_keeps_echo() {
        let harness = Harness::default()
            .engine("openai", vec![Step::Reply("中文", "你好")])
            .on_target("openai", "English", Step::Fail);
        let orchestrator = harness.build(Arc::new(LatencyTracker::new()));

        let result = orchestrator
            .translate(&TranslationRequest::new("你好", "中文", "openai"))
            .await
            .unwrap();

        assert_eq!(result.target_lang, "中文");
        assert_eq!(result.translation, "你好");
        assert_eq!(harness.calls("openai"), 2);
    }

    #[tokio::test]
    async fn test_no_switch_when_translation_differs() {
        let harness = Harness::default().engine("openai", vec![Step::Reply("中文", "你好呀")]);
        let orchestrator = harness.build(Arc::new(LatencyTracker::new()));

        let result = orchestrator
            .translate(&TranslationRequest::new("你好", "中文", "openai"))
            .await
            .unwrap();

        assert_eq!(result.translation, "你好呀");
        assert_eq!(harness.calls("openai"), 1);
    }

    #[tokio::test]
    async fn test_probe_reports_latency() {
        let harness = Harness::default().engine("groq", vec![ok("你好")]);
        let orchestrator = harness.build(Arc::new(LatencyTracker::new()));

        assert_ok!(orchestrator.probe("groq").await);
        assert_err!(orchestrator.probe("claude").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_is_fixed_and_skipped_after_last_attempt() {
        let harness = Harness::default()
            .engine("openai", vec![Step::Fail])
            .engine("claude", vec![Step::Fail]);
        let orchestrator = harness.build_with(
            Arc::new(LatencyTracker::new()),
            OrchestratorSettings {
                max_retries: 3,
                retry_delay: Duration::from_millis(400),
                call_timeout: Duration::from_secs(5),
                max_text_length: 50,
            },
        );

        let started = tokio::time::Instant::now();
        assert_err!(
            orchestrator
                .translate(&TranslationRequest::new("Hello", "中文", "openai"))
                .await
        );

        // two engines, two pauses each
        assert_eq!(started.elapsed(), Duration::from_millis(4 * 400));
        assert_eq!(harness.calls("openai"), 3);
        assert_eq!(harness.calls("claude"), 3);
    }

    #[tokio::test]
    async fn test_configuration_failure_moves_on_without_retry() {
        let harness = Harness::default()
            .engine("openai", vec![Step::Misconfigured])
            .engine("claude", vec![ok("你好")]);
        let orchestrator = harness.build(Arc::new(LatencyTracker::new()));

        let result = orchestrator
            .translate(&TranslationRequest::new("Hello", "中文", "openai"))
            .await
            .unwrap();

        assert_eq!(result.engine, "claude");
        assert_eq!(harness.calls("openai"), 1);
    }
}
