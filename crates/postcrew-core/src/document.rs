//! The persisted-document contract shared by the store and the domain types.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A document the shared store can load and save as a whole.
///
/// `Default` is the well-defined empty structure returned when the document
/// does not exist yet.
pub trait Document: Serialize + DeserializeOwned + Default {
    /// Logical name; the store derives the file name from it.
    const NAME: &'static str;

    /// Called right before every save.
    fn touch(&mut self, _now: DateTime<Utc>) {}
}
