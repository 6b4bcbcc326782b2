//! Per-device caches feeding the adaptive policy
//!
//! Both caches are explicit shared objects handed to the engine at
//! construction time; there is no ambient global state. Entries are value
//! types keyed by device address. Individual operations are serialized behind
//! async locks, but callers must not run concurrent queries against the SAME
//! address: sample appends and capability records assume a single writer per
//! key, and interleaved queries would race on them.

pub mod capability;
pub mod performance;

pub use capability::CapabilityCache;
pub use performance::PerformanceCache;
