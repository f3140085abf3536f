//! Seed derivation for reproducible runs
//!
//! Every random component of a run (each worker's decision RNG, each
//! attribute distribution) gets its own seed derived from the master seed,
//! the component name and the worker id. SHA-256 keeps derived seeds
//! independent even for similar names.
//!
//! # Example
//!
//! ```
//! use bidstream_core::seed::{derive_seed, derive_worker_seed, components};
//!
//! let master = 42;
//! assert_eq!(derive_seed(master, "test"), derive_seed(master, "test"));
//! assert_ne!(
//!     derive_worker_seed(master, components::WIN_DELAY, 0),
//!     derive_worker_seed(master, components::WIN_DELAY, 1),
//! );
//! ```

use sha2::{Digest, Sha256};

/// Derive a component-specific seed from a master seed using SHA-256
pub fn derive_seed(master_seed: u64, component: &str) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(master_seed.to_be_bytes());
    hasher.update(component.as_bytes());
    let result = hasher.finalize();

    u64::from_be_bytes([
        result[0], result[1], result[2], result[3], result[4], result[5], result[6], result[7],
    ])
}

/// Derive a seed for one component of one worker
pub fn derive_worker_seed(master_seed: u64, component: &str, worker_id: usize) -> u64 {
    derive_seed(master_seed, &format!("{component}/worker-{worker_id}"))
}

/// `derive_worker_seed` lifted over an optional master seed
pub fn worker_seed(master_seed: Option<u64>, component: &str, worker_id: usize) -> Option<u64> {
    master_seed.map(|master| derive_worker_seed(master, component, worker_id))
}

/// Standard component names for seed derivation
pub mod components {
    pub const WIN_DECISION: &str = "win_decision";
    pub const WIN_DELAY: &str = "win_delay";
    pub const CLICK_DELAY: &str = "click_delay";
    pub const BID_PRICE: &str = "bid_price";
    pub const WIN_PRICE: &str = "win_price";
    pub const AD_URL: &str = "ad_url";
    pub const PUBLISHER: &str = "publisher";
    pub const GEO: &str = "geo";
    pub const DEVICE_TYPE: &str = "device_type";
    pub const DEVICE_OS: &str = "device_os";
    pub const ARRIVALS: &str = "arrivals";

    pub const ALL: [&str; 11] = [
        WIN_DECISION,
        WIN_DELAY,
        CLICK_DELAY,
        BID_PRICE,
        WIN_PRICE,
        AD_URL,
        PUBLISHER,
        GEO,
        DEVICE_TYPE,
        DEVICE_OS,
        ARRIVALS,
    ];
}
