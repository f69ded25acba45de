//! Unit conversion factors.

/// Converts 1/s to 1/h.
pub const INVS_TO_INVH: f64 = 3600.0;

/// Converts m/s to km/h.
pub const MS_TO_KMH: f64 = 3.6;

/// Converts km/h to m/s.
pub const KMH_TO_MS: f64 = 1.0 / MS_TO_KMH;

/// Converts 1/m to 1/km.
pub const INVM_TO_INVKM: f64 = 1000.0;

/// Converts 1/km to 1/m.
pub const INVKM_TO_INVM: f64 = 1.0 / INVM_TO_INVKM;
