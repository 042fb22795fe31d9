/// Modifier subsystem constants and tunable parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ModConfig {
    /// Simulation ticks per second. Every peer of a session must agree on it.
    pub tick_rate: u32,
}

impl ModConfig {
    // ===== wire layout (bit-stable across peers of one protocol version) =====
    pub const RECORD_SIZE: usize = 32;
    pub const HEADER_SIZE: usize = 4;
    pub const PAYLOAD_SIZE: usize = Self::RECORD_SIZE - Self::HEADER_SIZE;

    // ===== header ranges (wire value 0 is reserved as "unset") =====
    pub const MAX_BEHAVIOR_INDEX: u8 = u8::MAX - 1;
    pub const MAX_PREFAB_INDEX: u8 = u8::MAX - 1;
    pub const MAX_TARGET_INDEX: u16 = u16::MAX - 1;

    // ===== compile-time capacities =====
    /// Usable behavior slots: indices `0..=254`.
    pub const MAX_BEHAVIORS: usize = Self::MAX_BEHAVIOR_INDEX as usize + 1;
    pub const MAX_UPGRADE_LEVELS: usize = 16;

    // ===== runtime-tunable defaults =====
    pub const DEFAULT_TICK_RATE: u32 = 60;

    pub fn new() -> Self {
        Self {
            tick_rate: Self::DEFAULT_TICK_RATE,
        }
    }

    pub fn with_tick_rate(tick_rate: u32) -> Self {
        Self {
            tick_rate: tick_rate.max(1),
        }
    }

    /// Fixed simulation step in seconds.
    pub fn tick_delta(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    /// Fixed simulation step as a wall-clock duration.
    pub fn tick_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1)))
    }
}

impl Default for ModConfig {
    fn default() -> Self {
        Self::new()
    }
}
