use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// A venue type that is queried as a separate nearby search.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct CategoryParseError;

impl Category {
    pub const TAG_RESTAURANT: &'static str = "restaurant";
    pub const TAG_BAR: &'static str = "bar";
    pub const TAG_CAFE: &'static str = "cafe";
    pub const TAG_NIGHT_CLUB: &'static str = "night_club";
    pub const TAG_PARK: &'static str = "park";

    pub fn new_restaurant() -> Self {
        Self(Self::TAG_RESTAURANT.into())
    }

    pub fn new_bar() -> Self {
        Self(Self::TAG_BAR.into())
    }

    pub fn new_cafe() -> Self {
        Self(Self::TAG_CAFE.into())
    }

    pub fn new_night_club() -> Self {
        Self(Self::TAG_NIGHT_CLUB.into())
    }

    pub fn new_park() -> Self {
        Self(Self::TAG_PARK.into())
    }

    /// The category list searched by default. The order is significant:
    /// it determines which category a venue matching multiple types is
    /// attributed to (first seen wins).
    pub fn default_search_set() -> Vec<Self> {
        vec![
            Self::new_restaurant(),
            Self::new_bar(),
            Self::new_cafe(),
            Self::new_night_club(),
            Self::new_park(),
        ]
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for Category {
    type Err = CategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CategoryParseError);
        }
        Ok(Self(trimmed.to_lowercase()))
    }
}

impl From<Category> for String {
    fn from(from: Category) -> Self {
        from.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_category() {
        assert_eq!(Ok(Category::new_cafe()), " Cafe ".parse());
        assert_eq!(Err(CategoryParseError), "  ".parse::<Category>());
    }

    #[test]
    fn default_search_set_order() {
        let set = Category::default_search_set();
        assert_eq!(5, set.len());
        assert_eq!(Category::TAG_RESTAURANT, set[0].as_str());
        assert_eq!(Category::TAG_PARK, set[4].as_str());
    }
}
