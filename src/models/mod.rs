use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Listing discovered on a search-results page, before its detail page is read
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingStub {
    pub url: String,
    pub title: String,
    pub image_url: Option<String>,
    pub images_count: u32,
}

/// Attributes recovered from a detail page's embedded client state.
///
/// `Default` is the "nothing recovered" result: price 0, everything else null.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DetailAttributes {
    pub price_usd: u32,
    pub odometer: Option<u32>,
    pub username: Option<String>,
    pub phone_number: Option<String>,
    pub car_number: Option<String>,
    pub car_vin: Option<String>,
}

/// Core vehicle data model, one row per listing URL
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VehicleRecord {
    pub url: String,
    pub title: String,
    /// 0 when the price is unknown
    pub price_usd: u32,
    /// Kilometers, always a multiple of 1000
    pub odometer: Option<u32>,
    pub username: Option<String>,
    pub phone_number: Option<String>,
    pub image_url: Option<String>,
    pub images_count: u32,
    pub car_number: Option<String>,
    pub car_vin: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl VehicleRecord {
    /// Merge a stub with whatever the detail page yielded.
    pub fn from_parts(
        stub: ListingStub,
        attributes: DetailAttributes,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            url: stub.url,
            title: stub.title,
            price_usd: attributes.price_usd,
            odometer: attributes.odometer,
            username: attributes.username,
            phone_number: attributes.phone_number,
            image_url: stub.image_url,
            images_count: stub.images_count,
            car_number: attributes.car_number,
            car_vin: attributes.car_vin,
            observed_at,
        }
    }

    /// Record carrying only what the search page showed.
    pub fn from_stub(stub: ListingStub, observed_at: DateTime<Utc>) -> Self {
        Self::from_parts(stub, DetailAttributes::default(), observed_at)
    }
}
