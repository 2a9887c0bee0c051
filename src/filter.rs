// ============================================================================
// File: src/filter.rs
// Search filter model: capacity, generation, speed and retailer scope
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::FilterError;

/// Kit capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Capacity {
    #[serde(rename = "8GB")]
    Gb8,
    #[serde(rename = "16GB")]
    Gb16,
    #[serde(rename = "32GB")]
    Gb32,
    #[serde(rename = "64GB")]
    Gb64,
}

impl Capacity {
    pub const ALL: [Capacity; 4] = [Capacity::Gb8, Capacity::Gb16, Capacity::Gb32, Capacity::Gb64];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capacity::Gb8 => "8GB",
            Capacity::Gb16 => "16GB",
            Capacity::Gb32 => "32GB",
            Capacity::Gb64 => "64GB",
        }
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capacity {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        let digits = normalized.strip_suffix("GB").unwrap_or(&normalized).trim();
        match digits {
            "8" => Ok(Capacity::Gb8),
            "16" => Ok(Capacity::Gb16),
            "32" => Ok(Capacity::Gb32),
            "64" => Ok(Capacity::Gb64),
            _ => Err(FilterError::UnknownCapacity(s.to_string())),
        }
    }
}

/// Memory generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Generation {
    #[serde(rename = "DDR4")]
    Ddr4,
    #[serde(rename = "DDR5")]
    Ddr5,
}

const DDR4_SPEEDS: [Speed; 4] = [Speed(3200), Speed(3600), Speed(4000), Speed(4400)];
const DDR5_SPEEDS: [Speed; 6] = [
    Speed(4800),
    Speed(5200),
    Speed(5600),
    Speed(6000),
    Speed(6400),
    Speed(7200),
];

impl Generation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Generation::Ddr4 => "DDR4",
            Generation::Ddr5 => "DDR5",
        }
    }

    /// Speeds offered for this generation, slowest first.
    pub fn speeds(&self) -> &'static [Speed] {
        match self {
            Generation::Ddr4 => &DDR4_SPEEDS,
            Generation::Ddr5 => &DDR5_SPEEDS,
        }
    }

    /// Speed selected when switching to this generation.
    pub fn default_speed(&self) -> Speed {
        match self {
            Generation::Ddr4 => Speed(3200),
            Generation::Ddr5 => Speed(6000),
        }
    }

    pub fn supports(&self, speed: Speed) -> bool {
        self.speeds().contains(&speed)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Generation {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DDR4" => Ok(Generation::Ddr4),
            "DDR5" => Ok(Generation::Ddr5),
            _ => Err(FilterError::UnknownGeneration(s.to_string())),
        }
    }
}

/// Transfer speed in MHz, rendered as e.g. `6000MHz`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Speed(u16);

impl Speed {
    pub fn mhz(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}MHz", self.0)
    }
}

impl FromStr for Speed {
    type Err = FilterError;

    /// Accepts `6000MHz`, `6000 mhz` or a bare `6000`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let digits = lowered.strip_suffix("mhz").unwrap_or(&lowered).trim();
        digits
            .parse::<u16>()
            .map(Speed)
            .map_err(|_| FilterError::InvalidSpeed(s.to_string()))
    }
}

impl Serialize for Speed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Which retailers a scan covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum RetailerScope {
    #[default]
    All,
    /// A single retailer, by catalog id.
    Only(String),
}

impl fmt::Display for RetailerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetailerScope::All => f.write_str("all"),
            RetailerScope::Only(id) => f.write_str(id),
        }
    }
}

impl FromStr for RetailerScope {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.trim().to_ascii_lowercase();
        if id == "all" || id.is_empty() {
            Ok(RetailerScope::All)
        } else {
            Ok(RetailerScope::Only(id))
        }
    }
}

impl Serialize for RetailerScope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A complete search request.
///
/// The speed is always a member of [`Generation::speeds`] for the current
/// generation: the constructors reject unsupported speeds and
/// [`Filter::with_generation`] resets the speed when the generation changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Filter {
    capacity: Capacity,
    generation: Generation,
    speed: Speed,
    scope: RetailerScope,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            capacity: Capacity::Gb32,
            generation: Generation::Ddr5,
            speed: Generation::Ddr5.default_speed(),
            scope: RetailerScope::All,
        }
    }
}

impl Filter {
    pub fn new(
        capacity: Capacity,
        generation: Generation,
        speed: Speed,
        scope: RetailerScope,
    ) -> Result<Self, FilterError> {
        check_speed(generation, speed)?;
        Ok(Self {
            capacity,
            generation,
            speed,
            scope,
        })
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    pub fn scope(&self) -> &RetailerScope {
        &self.scope
    }

    pub fn with_capacity(mut self, capacity: Capacity) -> Self {
        self.capacity = capacity;
        self
    }

    /// Switches generation. The speed falls back to the new generation's
    /// default whenever the generation actually changes.
    pub fn with_generation(mut self, generation: Generation) -> Self {
        if generation != self.generation {
            self.generation = generation;
            self.speed = generation.default_speed();
        }
        self
    }

    pub fn with_speed(mut self, speed: Speed) -> Result<Self, FilterError> {
        check_speed(self.generation, speed)?;
        self.speed = speed;
        Ok(self)
    }

    pub fn with_scope(mut self, scope: RetailerScope) -> Self {
        self.scope = scope;
        self
    }

    /// Short human label, e.g. `32GB DDR5 6000MHz`.
    pub fn describe(&self) -> String {
        format!("{} {} {}", self.capacity, self.generation, self.speed)
    }
}

fn check_speed(generation: Generation, speed: Speed) -> Result<(), FilterError> {
    if generation.supports(speed) {
        Ok(())
    } else {
        Err(FilterError::UnsupportedSpeed {
            generation: generation.to_string(),
            speed: speed.to_string(),
        })
    }
}
