//! Activity catalog reader.
//!
//! Lists published activities and renders the display fields shown on
//! catalog cards.

use crate::store::{BookingStore, StoreError};
use crate::types::{Activity, ActivityId, ActivityStatus, Money};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// A catalog card: the activity plus preformatted display text
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActivityCard {
    /// Activity ID
    pub id: ActivityId,
    /// URL slug
    pub slug: String,
    /// Title
    pub title: String,
    /// Description
    pub description: String,
    /// Card image
    pub featured_image: Option<String>,
    /// Location
    pub location: Option<String>,
    /// `"Sat 14 Jun 2025, 10:00"` or `"Flexible date"`
    pub date_text: String,
    /// `"1h 30min"`, absent when no duration is set
    pub duration_text: Option<String>,
    /// `"€12.50 per person"` or `"Free"`
    pub price_text: String,
    /// `"or 40 GREENs"` when a credits price exists
    pub credits_text: Option<String>,
    /// Eligibility badges
    pub badges: Vec<String>,
    /// Quorum
    pub min_participants: u32,
    /// Capacity
    pub max_participants: Option<u32>,
}

impl ActivityCard {
    /// Render the card for an activity
    #[must_use]
    pub fn from_activity(activity: &Activity) -> Self {
        Self {
            id: activity.id,
            slug: activity.slug.clone(),
            title: activity.title.clone(),
            description: activity.description.clone(),
            featured_image: activity.featured_image.clone(),
            location: activity.location.clone(),
            date_text: format_date(activity.date_time),
            duration_text: activity.duration_minutes.map(format_duration),
            price_text: format_price(activity.price_per_person),
            credits_text: activity.credits_price.map(|c| format!("or {c} GREENs")),
            badges: badges(activity),
            min_participants: activity.min_participants,
            max_participants: activity.max_participants,
        }
    }
}

/// Card date text
#[must_use]
pub fn format_date(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(
        || "Flexible date".to_string(),
        |t| t.format("%a %-d %b %Y, %H:%M").to_string(),
    )
}

/// `90` → `"1h 30min"`, `60` → `"1h"`, `45` → `"45min"`
#[must_use]
pub fn format_duration(minutes: u32) -> String {
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{m}min"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}min"),
    }
}

/// Card price text
#[must_use]
pub fn format_price(price: Money) -> String {
    if price.is_zero() {
        "Free".to_string()
    } else {
        format!("{price} per person")
    }
}

fn badges(activity: &Activity) -> Vec<String> {
    let mut badges = Vec::new();
    if activity.min_participants > 1 {
        badges.push(format!("Group of {}+", activity.min_participants));
    }
    if let Some(max) = activity.max_participants {
        badges.push(format!("Max {max}"));
    }
    if activity.credits_price.is_some() {
        badges.push("Pay with GREENs".to_string());
    }
    badges
}

/// Reads the catalog from the datastore
#[derive(Clone)]
pub struct ActivityCatalog {
    store: Arc<dyn BookingStore>,
}

impl ActivityCatalog {
    /// Create a catalog reader
    #[must_use]
    pub fn new(store: Arc<dyn BookingStore>) -> Self {
        Self { store }
    }

    /// Published activity cards, optionally filtered by a search term
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the datastore query fails.
    pub async fn list(&self, search: Option<&str>) -> Result<Vec<ActivityCard>, StoreError> {
        let activities = self.store.list_published_activities(search).await?;
        Ok(activities.iter().map(ActivityCard::from_activity).collect())
    }

    /// One published activity's card
    ///
    /// Draft and archived activities are reported as absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the datastore query fails.
    pub async fn card(&self, id: ActivityId) -> Result<Option<ActivityCard>, StoreError> {
        Ok(self
            .store
            .get_activity(id)
            .await?
            .filter(|a| a.status == ActivityStatus::Published)
            .as_ref()
            .map(ActivityCard::from_activity))
    }
}
