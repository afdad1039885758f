use serde::{Deserialize, Serialize};

use crate::{geo::MapPoint, id::Id};

/// The resolved location of a free-text address.
///
/// Immutable once produced; cached keyed by the raw address text
/// exactly as it was submitted (case-sensitive, untrimmed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub pos: MapPoint,
    pub formatted_address: String,
}

/// One autocomplete prediction for a partial address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressSuggestion {
    pub id: Id,
    pub description: String,
}
