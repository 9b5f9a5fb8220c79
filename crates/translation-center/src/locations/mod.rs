//! Registered translation locations and the active pointer.

use serde::{Deserialize, Serialize};
use specta::Type;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::error::CoreError;

/// Which key/value semantics a location follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, Default)]
pub enum LocationTag {
    #[serde(rename = "FE", alias = "frontend")]
    #[default]
    Frontend,
    #[serde(rename = "BE", alias = "backend")]
    Backend,
}

impl LocationTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationTag::Frontend => "FE",
            LocationTag::Backend => "BE",
        }
    }
}

/// Counters reported by the backend after a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, Default)]
pub struct ScanSummary {
    pub keys: u32,
    pub untranslated_keys: u32,
}

/// A translation project the entry cache can be pointed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Type)]
pub struct Location {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub tag: LocationTag,
    #[serde(default)]
    pub is_favourite: bool,
    #[serde(default)]
    pub num_of_keys: u32,
    #[serde(default)]
    pub num_of_untranslated_keys: u32,
    #[serde(default = "now_timestamp")]
    pub added_at: String,
}

pub(crate) fn now_timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

impl Location {
    pub fn new(name: impl Into<String>, path: impl Into<String>, tag: LocationTag) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            tag,
            is_favourite: false,
            num_of_keys: 0,
            num_of_untranslated_keys: 0,
            added_at: now_timestamp(),
        }
    }

    pub fn with_summary(mut self, summary: ScanSummary) -> Self {
        self.apply_summary(summary);
        self
    }

    fn apply_summary(&mut self, summary: ScanSummary) {
        self.num_of_keys = summary.keys;
        self.num_of_untranslated_keys = summary.untranslated_keys;
    }
}

/// In-memory set of known locations. Persisted through the `location_store` record.
#[derive(Debug, Clone, Default)]
pub struct LocationRegistry {
    locations: Vec<Location>,
    active: Option<String>,
}

impl LocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from persisted state. An active name that no longer matches a
    /// location is dropped.
    pub fn from_parts(locations: Vec<Location>, active: Option<String>) -> Self {
        let active = active.filter(|name| locations.iter().any(|loc| &loc.name == name));
        Self { locations, active }
    }

    pub fn list(&self) -> &[Location] {
        &self.locations
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Location> {
        self.locations.iter().find(|loc| loc.name == name)
    }

    pub fn find_by_path(&self, path: &str) -> Option<&Location> {
        self.locations.iter().find(|loc| loc.path == path)
    }

    pub fn favourites(&self) -> impl Iterator<Item = &Location> {
        self.locations.iter().filter(|loc| loc.is_favourite)
    }

    pub fn active(&self) -> Option<&Location> {
        self.active.as_deref().and_then(|name| self.get(name))
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Append a location. The active pointer is left unchanged.
    pub fn add(&mut self, location: Location) -> Result<(), CoreError> {
        if self.get(&location.name).is_some() {
            return Err(CoreError::DuplicateLocationName { name: location.name });
        }
        if self.find_by_path(&location.path).is_some() {
            return Err(CoreError::DuplicateLocationPath { path: location.path });
        }
        self.locations.push(location);
        Ok(())
    }

    /// Remove by name. Clears the active pointer if it pointed at the removed
    /// location. Returns the removed location, if any.
    pub fn remove(&mut self, name: &str) -> Option<Location> {
        let index = self.locations.iter().position(|loc| loc.name == name)?;
        let removed = self.locations.remove(index);
        if self.active.as_deref() == Some(name) {
            self.active = None;
        }
        Some(removed)
    }

    /// Point at `name`. Fetching entries is the caller's job.
    pub fn set_active(&mut self, name: &str) -> Result<&Location, CoreError> {
        let index = self.index_of(name)?;
        self.active = Some(name.to_string());
        Ok(&self.locations[index])
    }

    /// Flip `is_favourite`; returns the new value.
    pub fn toggle_favourite(&mut self, name: &str) -> Result<bool, CoreError> {
        let index = self.index_of(name)?;
        let location = &mut self.locations[index];
        location.is_favourite = !location.is_favourite;
        Ok(location.is_favourite)
    }

    pub fn update_summary(&mut self, name: &str, summary: ScanSummary) -> Result<(), CoreError> {
        let index = self.index_of(name)?;
        self.locations[index].apply_summary(summary);
        Ok(())
    }

    fn index_of(&self, name: &str) -> Result<usize, CoreError> {
        self.locations
            .iter()
            .position(|loc| loc.name == name)
            .ok_or_else(|| CoreError::LocationNotFound { name: name.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(name: &str, path: &str) -> Location {
        Location::new(name, path, LocationTag::Frontend)
    }

    #[test]
    fn rejects_duplicate_name_or_path() {
        let mut registry = LocationRegistry::new();
        registry.add(location("web", "/repo/web")).unwrap();

        let err = registry.add(location("web", "/repo/other")).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateLocationName { .. }));

        let err = registry.add(location("other", "/repo/web")).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateLocationPath { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn add_keeps_active_and_remove_clears_it() {
        let mut registry = LocationRegistry::new();
        registry.add(location("web", "/repo/web")).unwrap();
        registry.set_active("web").unwrap();
        registry.add(location("api", "/repo/api")).unwrap();
        assert_eq!(registry.active_name(), Some("web"));

        registry.remove("api");
        assert_eq!(registry.active_name(), Some("web"));

        let removed = registry.remove("web").unwrap();
        assert_eq!(removed.path, "/repo/web");
        assert!(registry.active().is_none());
        assert!(registry.remove("web").is_none());
    }

    #[test]
    fn toggles_favourite_and_updates_summary_by_name() {
        let mut registry = LocationRegistry::new();
        registry.add(location("web", "/repo/web")).unwrap();

        assert!(registry.toggle_favourite("web").unwrap());
        assert_eq!(registry.favourites().count(), 1);
        assert!(!registry.toggle_favourite("web").unwrap());

        registry.update_summary("web", ScanSummary { keys: 12, untranslated_keys: 3 }).unwrap();
        let web = registry.get("web").unwrap();
        assert_eq!((web.num_of_keys, web.num_of_untranslated_keys), (12, 3));

        let err = registry.toggle_favourite("missing").unwrap_err();
        assert!(matches!(err, CoreError::LocationNotFound { .. }));
    }

    #[test]
    fn restoring_drops_unknown_active_name() {
        let registry = LocationRegistry::from_parts(vec![location("web", "/w")], Some("gone".into()));
        assert!(registry.active().is_none());
    }

    #[test]
    fn tag_uses_backend_wire_names() {
        assert_eq!(serde_json::to_string(&LocationTag::Backend).unwrap(), "\"BE\"");
        let tag: LocationTag = serde_json::from_str("\"FE\"").unwrap();
        assert_eq!(tag, LocationTag::Frontend);
    }
}
