//! Unified configuration for the conversation engine.
//!
//! Consolidates the tunables spec §4.3/§4.6 otherwise leave as source
//! constants into a single, serializable, builder-constructible type,
//! following the same shape as the teacher's `CommyConfig`/`ConfigBuilder`.

use serde::{Deserialize, Serialize};

/// Engine-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Version negotiation caps (spec §4.3 "Version gating").
    pub version: VersionConfig,

    /// Adaptive file-chunk sizing (spec §4.3 "Adaptive chunk size").
    pub chunking: ChunkingConfig,

    /// Clock-skew correction bounds (spec §4.3 "Clock skew correction").
    pub clock_skew: ClockSkewConfig,

    /// Fixed leading-padding byte count used by the padded framing variant
    /// (spec §4.1, §6 wire format item 1).
    pub leading_padding_bytes: usize,

    /// Idle-timeout contract handed to the external timeout scheduler
    /// (spec §5 "timeout-scheduler").
    pub idle_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: VersionConfig::default(),
            chunking: ChunkingConfig::default(),
            clock_skew: ClockSkewConfig::default(),
            leading_padding_bytes: 4,
            idle_timeout_ms: 30_000,
        }
    }
}

/// The maximum protocol version this side advertises, and the known
/// peer-version workarounds applied when picking a response version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionConfig {
    pub max_major: u32,
    pub max_minor: u32,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            max_major: 2,
            max_minor: 18,
        }
    }
}

/// RTT thresholds and corresponding chunk sizes for file transfer (spec
/// §4.3): `rtt <= small_threshold_ms -> small_bytes`, `<= medium_threshold_ms
/// -> medium_bytes`, else `large_bytes`. Despite the name, `large_bytes` is
/// the smallest chunk (used for the worst RTT bucket) — kept because this is
/// the naming the spec itself uses ("64 KiB / 32 KiB / 16 KiB").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub small_threshold_ms: u64,
    pub small_bytes: usize,
    pub medium_threshold_ms: u64,
    pub medium_bytes: usize,
    pub large_bytes: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            small_threshold_ms: 500,
            small_bytes: 64 * 1024,
            medium_threshold_ms: 1000,
            medium_bytes: 32 * 1024,
            large_bytes: 16 * 1024,
        }
    }
}

/// Clock-skew correction bounds (spec §4.3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClockSkewConfig {
    /// Reject a SynchronizeIQ round trip slower than this.
    pub max_round_trip_ms: i64,
    /// Clamp `|timeCorrection|` to this bound.
    pub max_correction_ms: i64,
}

impl Default for ClockSkewConfig {
    fn default() -> Self {
        Self {
            max_round_trip_ms: 60_000,
            max_correction_ms: 3_600_000,
        }
    }
}

/// Builder for [`EngineConfig`], mirroring the teacher's `ConfigBuilder`.
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    pub fn version(mut self, version: VersionConfig) -> Self {
        self.config.version = version;
        self
    }

    pub fn chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.config.chunking = chunking;
        self
    }

    pub fn clock_skew(mut self, clock_skew: ClockSkewConfig) -> Self {
        self.config.clock_skew = clock_skew;
        self
    }

    pub fn leading_padding_bytes(mut self, bytes: usize) -> Self {
        self.config.leading_padding_bytes = bytes;
        self
    }

    pub fn idle_timeout_ms(mut self, ms: u64) -> Self {
        self.config.idle_timeout_ms = ms;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}
