//! Metric names and a lazily built instrument set for the synthesis path

use std::{sync::OnceLock, time::Instant};

use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};

// Synthesis metric names
pub const SYNTHESIS_COUNT: &str = "tts.synthesis.count";
pub const SYNTHESIS_DURATION: &str = "tts.synthesis.duration";
pub const SYNTHESIS_QUEUE_WAIT: &str = "tts.synthesis.queue_wait";
pub const EMOTION_FALLBACK_COUNT: &str = "tts.emotion.fallback.count";
pub const CLEANUP_FAILURE_COUNT: &str = "tts.cleanup.failure.count";

/// Instruments recorded by the orchestration layer
///
/// Without an installed meter provider these are no-ops.
pub struct SynthesisMetrics {
    pub synthesis_count: Counter<u64>,
    pub synthesis_duration: Histogram<f64>,
    pub queue_wait: Histogram<f64>,
    pub emotion_fallbacks: Counter<u64>,
    pub cleanup_failures: Counter<u64>,
}

/// Shared instrument set, created on first use from the global meter
pub fn synthesis() -> &'static SynthesisMetrics {
    static METRICS: OnceLock<SynthesisMetrics> = OnceLock::new();

    METRICS.get_or_init(|| {
        let meter = global::meter("intone");

        SynthesisMetrics {
            synthesis_count: meter
                .u64_counter(SYNTHESIS_COUNT)
                .with_description("Synthesis jobs by outcome")
                .build(),
            synthesis_duration: meter
                .f64_histogram(SYNTHESIS_DURATION)
                .with_unit("s")
                .with_description("Time spent inside the engine per job")
                .build(),
            queue_wait: meter
                .f64_histogram(SYNTHESIS_QUEUE_WAIT)
                .with_unit("s")
                .with_description("Time a job waited for the engine slot")
                .build(),
            emotion_fallbacks: meter
                .u64_counter(EMOTION_FALLBACK_COUNT)
                .with_description("Requests whose emotion mode degraded to same-timbre")
                .build(),
            cleanup_failures: meter
                .u64_counter(CLEANUP_FAILURE_COUNT)
                .with_description("Staged files that could not be deleted")
                .build(),
        }
    })
}

/// Record a duration measurement on a histogram
pub fn record_duration(histogram: &Histogram<f64>, start: Instant, attributes: &[KeyValue]) {
    let duration = start.elapsed().as_secs_f64();
    histogram.record(duration, attributes);
}
