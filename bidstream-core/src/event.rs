//! Auction event model
//!
//! A [`Bid`] is the root of a possible chain: it may produce one [`Win`], and
//! a win may produce one [`Click`]. Wins and clicks copy the bid's id and
//! creation time; they never refer back to the bid itself.
//!
//! All times are wall-clock Unix nanoseconds. They serialize as RFC 3339
//! timestamps with nanosecond precision.

use crate::attributes::AttributeGenerator;
use crate::timing;
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// Capability shared by everything that can sit in a delay scheduler
pub trait LogTime {
    /// Scheduled emission time in Unix nanoseconds
    fn log_time_ns(&self) -> u64;
}

/// Bid identity, derived from the bid's creation timestamp
///
/// Serialized as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BidId(u64);

impl BidId {
    pub fn from_timestamp_ns(ns: u64) -> Self {
        Self(ns)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for BidId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn serialize_unix_ns<S: Serializer>(ns: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&humantime::format_rfc3339_nanos(timing::to_system_time(*ns)))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetingGeo {
    pub country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetingDevice {
    #[serde(rename = "type")]
    pub device_type: String,
    pub os: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Targeting {
    pub geo: TargetingGeo,
    pub device: TargetingDevice,
}

/// Synthetic auction response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bid {
    pub id: BidId,
    #[serde(rename = "time", serialize_with = "serialize_unix_ns")]
    pub time_ns: u64,
    pub targeting: Targeting,
    pub publisher: String,
    pub ad_url: String,
    pub bid_price: f64,
}

impl Bid {
    /// Build a bid stamped with a fresh, process-unique timestamp
    pub fn generate<A: AttributeGenerator + ?Sized>(attributes: &mut A) -> Self {
        Self::generate_at(timing::unique_timestamp_ns(), attributes)
    }

    /// Build a bid created at `time_ns`; the id is derived from that time
    pub fn generate_at<A: AttributeGenerator + ?Sized>(time_ns: u64, attributes: &mut A) -> Self {
        Self {
            id: BidId::from_timestamp_ns(time_ns),
            time_ns,
            targeting: attributes.targeting(),
            publisher: attributes.publisher_url(),
            ad_url: attributes.ad_url(),
            bid_price: attributes.bid_price(),
        }
    }
}

impl LogTime for Bid {
    fn log_time_ns(&self) -> u64 {
        self.time_ns
    }
}

/// Win notice for a bid, emitted after the win delay
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Win {
    pub bid_id: BidId,
    #[serde(rename = "bid_time", serialize_with = "serialize_unix_ns")]
    pub bid_time_ns: u64,
    #[serde(rename = "time", serialize_with = "serialize_unix_ns")]
    pub time_ns: u64,
    pub win_price: f64,
}

impl Win {
    /// Derive a win from `bid`; the price is capped at the bid price
    pub fn from_bid(bid: &Bid, delay: Duration, win_price: f64) -> Self {
        Self {
            bid_id: bid.id,
            bid_time_ns: bid.time_ns,
            time_ns: bid.time_ns.saturating_add(delay.as_nanos() as u64),
            win_price: win_price.min(bid.bid_price),
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_nanos(self.time_ns - self.bid_time_ns)
    }
}

impl LogTime for Win {
    fn log_time_ns(&self) -> u64 {
        self.time_ns
    }
}

/// Click on a won ad, emitted after the click delay
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Click {
    pub bid_id: BidId,
    #[serde(rename = "bid_time", serialize_with = "serialize_unix_ns")]
    pub bid_time_ns: u64,
    #[serde(rename = "time", serialize_with = "serialize_unix_ns")]
    pub time_ns: u64,
}

impl Click {
    pub fn from_bid(bid: &Bid, delay: Duration) -> Self {
        Self {
            bid_id: bid.id,
            bid_time_ns: bid.time_ns,
            time_ns: bid.time_ns.saturating_add(delay.as_nanos() as u64),
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_nanos(self.time_ns - self.bid_time_ns)
    }
}

impl LogTime for Click {
    fn log_time_ns(&self) -> u64 {
        self.time_ns
    }
}

/// Event kind, also the `type` discriminator of output records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Bid,
    Win,
    Click,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Bid => "bid",
            EventKind::Win => "win",
            EventKind::Click => "click",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any emitted event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Event {
    Bid(Bid),
    Win(Win),
    Click(Click),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Bid(_) => EventKind::Bid,
            Event::Win(_) => EventKind::Win,
            Event::Click(_) => EventKind::Click,
        }
    }

    /// Id of the bid this event belongs to
    pub fn bid_id(&self) -> BidId {
        match self {
            Event::Bid(bid) => bid.id,
            Event::Win(win) => win.bid_id,
            Event::Click(click) => click.bid_id,
        }
    }
}

impl LogTime for Event {
    fn log_time_ns(&self) -> u64 {
        match self {
            Event::Bid(bid) => bid.log_time_ns(),
            Event::Win(win) => win.log_time_ns(),
            Event::Click(click) => click.log_time_ns(),
        }
    }
}

impl From<Bid> for Event {
    fn from(bid: Bid) -> Self {
        Event::Bid(bid)
    }
}

impl From<Win> for Event {
    fn from(win: Win) -> Self {
        Event::Win(win)
    }
}

impl From<Click> for Event {
    fn from(click: Click) -> Self {
        Event::Click(click)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bid(time_ns: u64, price: f64) -> Bid {
        Bid {
            id: BidId::from_timestamp_ns(time_ns),
            time_ns,
            targeting: Targeting {
                geo: TargetingGeo {
                    country: "US".into(),
                    region: Some("CA".into()),
                    zip: Some("94105".into()),
                },
                device: TargetingDevice { device_type: "mobile".into(), os: "ios".into() },
            },
            publisher: "https://1.example.com/2.html".into(),
            ad_url: "https://ad.example.com/3".into(),
            bid_price: price,
        }
    }

    #[test]
    fn test_bid_record_shape() {
        let bid = sample_bid(1_700_000_000_123_456_789, 1.5);
        let value = serde_json::to_value(Event::from(bid)).unwrap();

        assert_eq!(value["type"], "bid");
        assert_eq!(value["id"], "1700000000123456789");
        assert_eq!(value["time"], "2023-11-14T22:13:20.123456789Z");
        assert_eq!(value["targeting"]["geo"]["country"], "US");
        assert_eq!(value["targeting"]["device"]["type"], "mobile");
        assert_eq!(value["bid_price"], 1.5);
    }

    #[test]
    fn test_absent_geo_fields_omitted() {
        let mut bid = sample_bid(1, 1.0);
        bid.targeting.geo = TargetingGeo { country: "SI".into(), region: None, zip: None };
        let value = serde_json::to_value(&bid).unwrap();

        let geo = value["targeting"]["geo"].as_object().unwrap();
        assert_eq!(geo.len(), 1);
    }

    #[test]
    fn test_win_references_bid() {
        let bid = sample_bid(1_000, 2.0);
        let win = Win::from_bid(&bid, Duration::from_secs(3), 1.25);

        assert_eq!(win.bid_id, bid.id);
        assert_eq!(win.bid_time_ns, 1_000);
        assert_eq!(win.time_ns, 1_000 + 3_000_000_000);
        assert_eq!(win.delay(), Duration::from_secs(3));

        let value = serde_json::to_value(Event::from(win)).unwrap();
        assert_eq!(value["type"], "win");
        assert_eq!(value["bid_id"], "1000");
        assert_eq!(value["win_price"], 1.25);
    }

    #[test]
    fn test_win_price_capped_at_bid_price() {
        let bid = sample_bid(1_000, 2.0);
        let win = Win::from_bid(&bid, Duration::ZERO, 5.0);
        assert_eq!(win.win_price, 2.0);
    }

    #[test]
    fn test_click_record_shape() {
        let bid = sample_bid(5_000, 1.0);
        let click = Click::from_bid(&bid, Duration::from_millis(7));
        let event = Event::from(click);

        assert_eq!(event.kind(), EventKind::Click);
        assert_eq!(event.bid_id(), bid.id);
        assert_eq!(event.log_time_ns(), 5_000 + 7_000_000);

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "click");
        assert!(value.get("win_price").is_none());
    }

    #[test]
    fn test_scheduled_time_saturates() {
        let bid = sample_bid(u64::MAX - 10, 1.0);
        let click = Click::from_bid(&bid, Duration::from_secs(1));
        assert_eq!(click.time_ns, u64::MAX);
    }
}
