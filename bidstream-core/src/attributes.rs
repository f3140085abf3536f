//! Random attribute generation for synthetic events
//!
//! The worker only needs the [`AttributeGenerator`] trait; [`RandomAttributes`]
//! is the default value model. Most numeric fields come from a bounded
//! exponential distribution, so small values (early table entries, short
//! delays, cheap bids) dominate while every value stays under a hard cap.

use crate::config::EventConfig;
use crate::event::{Targeting, TargetingDevice, TargetingGeo};
use crate::seed::{components, worker_seed};
use crate::Result;
use bidstream_common::{BoundedExponentialDistribution, UniformDistribution, WeightedChoice};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

pub const BID_PRICE_SKEW: f64 = 10.0;
pub const BID_PRICE_MAX: f64 = 20.0;
pub const AD_URL_SKEW: f64 = 10.0;
pub const AD_ID_MAX: f64 = 10_000.0;
pub const PUBLISHER_SKEW: f64 = 10.0;
pub const PUBLISHER_DOMAIN_MAX: f64 = 1_000.0;
pub const PUBLISHER_PAGE_MAX: f64 = 1_000.0;
pub const GEO_SKEW: f64 = 100.0;
pub const ZIP_MAX: f64 = 10_000.0;
/// Lower bound of the win price as a fraction of the bid price
pub const WIN_PRICE_MIN_RATIO: f64 = 0.5;

/// Countries, most frequent first
pub const COUNTRIES: &[&str] = &[
    "US", "GB", "DE", "FR", "CA", "SI", "IT", "ES", "NL", "BR", "IN", "JP", "AU", "MX", "PL", "SE",
];

pub const DEVICE_TYPES: &[(&str, f64)] =
    &[("mobile", 0.55), ("desktop", 0.35), ("tablet", 0.08), ("ctv", 0.02)];

const US_REGIONS: &[&str] = &["CA", "NY", "TX", "FL", "WA", "IL", "MA", "GA", "CO", "PA"];
const GB_REGIONS: &[&str] = &["ENG", "SCT", "WLS", "NIR"];
const DE_REGIONS: &[&str] = &["BY", "BE", "HH", "NW", "HE", "BW"];
const CA_REGIONS: &[&str] = &["ON", "QC", "BC", "AB"];
const SI_REGIONS: &[&str] = &["LJ", "MB", "KP"];

/// Regions of a country, most frequent first
pub fn regions(country: &str) -> Option<&'static [&'static str]> {
    match country {
        "US" => Some(US_REGIONS),
        "GB" => Some(GB_REGIONS),
        "DE" => Some(DE_REGIONS),
        "CA" => Some(CA_REGIONS),
        "SI" => Some(SI_REGIONS),
        _ => None,
    }
}

/// Operating systems seen on a device type
pub fn device_os(device_type: &str) -> &'static [&'static str] {
    match device_type {
        "mobile" => &["android", "ios"],
        "desktop" => &["windows", "macos", "linux"],
        "tablet" => &["ios", "android"],
        "ctv" => &["tvos", "android-tv", "roku"],
        _ => &["unknown"],
    }
}

/// Supplier of randomized event payloads and delays
///
/// Implementations must keep `win_delay()` and `click_delay()` within their
/// configured maxima and `win_price(p)` at or below `p`.
pub trait AttributeGenerator: Send {
    fn targeting(&mut self) -> Targeting;

    fn publisher_url(&mut self) -> String;

    fn ad_url(&mut self) -> String;

    fn bid_price(&mut self) -> f64;

    /// Clearing price for a won bid, never above `bid_price`
    fn win_price(&mut self, bid_price: f64) -> f64;

    /// Delay between a bid and its win notice
    fn win_delay(&mut self) -> Duration;

    /// Delay between a bid and its click
    fn click_delay(&mut self) -> Duration;
}

/// Default attribute model backed by seeded distributions
pub struct RandomAttributes {
    win_delay: BoundedExponentialDistribution,
    click_delay: BoundedExponentialDistribution,
    bid_price: BoundedExponentialDistribution,
    win_price_ratio: UniformDistribution,
    ad_id: BoundedExponentialDistribution,
    publisher: BoundedExponentialDistribution,
    geo: BoundedExponentialDistribution,
    device_type: WeightedChoice<&'static str>,
    device_os: SmallRng,
}

impl RandomAttributes {
    /// Create a generator with entropy-based seeds
    pub fn new(events: &EventConfig) -> Result<Self> {
        Self::with_seed(events, None, 0)
    }

    /// Create a generator whose components derive their seeds from `seed` and `worker_id`
    pub fn with_seed(events: &EventConfig, seed: Option<u64>, worker_id: usize) -> Result<Self> {
        let s = |component: &str| worker_seed(seed, component, worker_id);

        let win_delay = BoundedExponentialDistribution::with_seed(
            events.win_delay.skew,
            events.win_delay.max.as_nanos() as f64,
            s(components::WIN_DELAY),
        )?;
        let click_delay = BoundedExponentialDistribution::with_seed(
            events.click_delay.skew,
            events.click_delay.max.as_nanos() as f64,
            s(components::CLICK_DELAY),
        )?;

        let device_os = match s(components::DEVICE_OS) {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        };

        Ok(Self {
            win_delay,
            click_delay,
            bid_price: BoundedExponentialDistribution::with_seed(
                BID_PRICE_SKEW,
                BID_PRICE_MAX,
                s(components::BID_PRICE),
            )?,
            win_price_ratio: UniformDistribution::with_seed(
                WIN_PRICE_MIN_RATIO,
                1.0,
                s(components::WIN_PRICE),
            )?,
            ad_id: BoundedExponentialDistribution::with_seed(
                AD_URL_SKEW,
                AD_ID_MAX,
                s(components::AD_URL),
            )?,
            publisher: BoundedExponentialDistribution::with_seed(
                PUBLISHER_SKEW,
                PUBLISHER_DOMAIN_MAX,
                s(components::PUBLISHER),
            )?,
            geo: BoundedExponentialDistribution::with_seed(GEO_SKEW, ZIP_MAX, s(components::GEO))?,
            device_type: WeightedChoice::with_seed(
                DEVICE_TYPES.to_vec(),
                s(components::DEVICE_TYPE),
            )?,
            device_os,
        })
    }

    fn geo_targeting(&mut self) -> TargetingGeo {
        let country = COUNTRIES[self.geo.sample_index(COUNTRIES.len())];

        let region = regions(country)
            .map(|table| table[self.geo.sample_index(table.len())].to_string());

        let zip = (country == "US")
            .then(|| format!("{}", self.geo.sample_up_to(ZIP_MAX).floor() as u64));

        TargetingGeo { country: country.to_string(), region, zip }
    }

    fn device_targeting(&mut self) -> TargetingDevice {
        let device_type = *self.device_type.choose();
        let systems = device_os(device_type);
        let os = systems[self.device_os.random_range(0..systems.len())];

        TargetingDevice { device_type: device_type.to_string(), os: os.to_string() }
    }
}

fn floor_to_thousandths(value: f64) -> f64 {
    (value * 1000.0).floor() / 1000.0
}

fn nanos_to_duration(nanos: f64) -> Duration {
    Duration::from_nanos(nanos as u64)
}

impl AttributeGenerator for RandomAttributes {
    fn targeting(&mut self) -> Targeting {
        Targeting { geo: self.geo_targeting(), device: self.device_targeting() }
    }

    fn publisher_url(&mut self) -> String {
        let domain = self.publisher.sample_up_to(PUBLISHER_DOMAIN_MAX).floor() as u64;
        let page = self.publisher.sample_up_to(PUBLISHER_PAGE_MAX).floor() as u64;
        format!("https://{domain}.example.com/{page}.html")
    }

    fn ad_url(&mut self) -> String {
        let ad_id = self.ad_id.sample_bounded().floor() as u64;
        format!("https://ad.example.com/{ad_id}")
    }

    fn bid_price(&mut self) -> f64 {
        floor_to_thousandths(self.bid_price.sample_bounded())
    }

    fn win_price(&mut self, bid_price: f64) -> f64 {
        let ratio = bidstream_common::Distribution::sample(&mut self.win_price_ratio);
        floor_to_thousandths(bid_price * ratio).min(bid_price)
    }

    fn win_delay(&mut self) -> Duration {
        nanos_to_duration(self.win_delay.sample_bounded())
    }

    fn click_delay(&mut self) -> Duration {
        nanos_to_duration(self.click_delay.sample_bounded())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DelayConfig;

    fn seeded(seed: u64) -> RandomAttributes {
        RandomAttributes::with_seed(&EventConfig::default(), Some(seed), 0).unwrap()
    }

    #[test]
    fn test_delays_within_bounds() {
        let events = EventConfig::default();
        let mut attrs = seeded(1);
        for _ in 0..10_000 {
            assert!(attrs.win_delay() <= events.win_delay.max);
            assert!(attrs.click_delay() <= events.click_delay.max);
        }
    }

    #[test]
    fn test_delay_fallback_returns_exact_max() {
        let events = EventConfig {
            win_delay: DelayConfig { skew: 1e-9, max: Duration::from_secs(300) },
            ..EventConfig::default()
        };
        let mut attrs = RandomAttributes::with_seed(&events, Some(2), 0).unwrap();
        for _ in 0..100 {
            assert_eq!(attrs.win_delay(), Duration::from_secs(300));
        }
    }

    #[test]
    fn test_win_price_never_exceeds_bid_price() {
        let mut attrs = seeded(3);
        for _ in 0..10_000 {
            let bid = attrs.bid_price();
            let win = attrs.win_price(bid);
            assert!(win <= bid, "win {} > bid {}", win, bid);
            assert!(win >= 0.0);
        }
    }

    #[test]
    fn test_bid_price_bounded_and_rounded() {
        let mut attrs = seeded(4);
        for _ in 0..10_000 {
            let price = attrs.bid_price();
            assert!((0.0..=BID_PRICE_MAX).contains(&price));
            let thousandths = price * 1000.0;
            assert!((thousandths - thousandths.round()).abs() < 1e-6, "{} not rounded", price);
        }
    }

    #[test]
    fn test_targeting_uses_known_tables() {
        let mut attrs = seeded(5);
        for _ in 0..5_000 {
            let targeting = attrs.targeting();
            let geo = &targeting.geo;
            assert!(COUNTRIES.contains(&geo.country.as_str()));

            match regions(&geo.country) {
                Some(table) => assert!(table.contains(&geo.region.as_deref().unwrap())),
                None => assert!(geo.region.is_none()),
            }
            assert_eq!(geo.zip.is_some(), geo.country == "US");

            let device = &targeting.device;
            assert!(DEVICE_TYPES.iter().any(|(t, _)| *t == device.device_type));
            assert!(device_os(&device.device_type).contains(&device.os.as_str()));
        }
    }

    #[test]
    fn test_urls_well_formed() {
        let mut attrs = seeded(6);
        let publisher = attrs.publisher_url();
        assert!(publisher.starts_with("https://") && publisher.ends_with(".html"));
        assert!(attrs.ad_url().starts_with("https://ad.example.com/"));
    }

    #[test]
    fn test_seeded_generators_reproducible() {
        let mut a = seeded(7);
        let mut b = seeded(7);
        for _ in 0..100 {
            assert_eq!(a.targeting(), b.targeting());
            assert_eq!(a.bid_price(), b.bid_price());
            assert_eq!(a.win_delay(), b.win_delay());
        }
    }
}
