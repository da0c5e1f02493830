//! Market item identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Wear grade of a skin, as the market spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exterior {
    FactoryNew,
    MinimalWear,
    FieldTested,
    WellWorn,
    BattleScarred,
    NotPainted,
    /// Items without a wear grade (cases, stickers, keys).
    Unspecified,
}

impl Exterior {
    /// Market spelling used in item names and the persisted key.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FactoryNew => "Factory New",
            Self::MinimalWear => "Minimal Wear",
            Self::FieldTested => "Field-Tested",
            Self::WellWorn => "Well-Worn",
            Self::BattleScarred => "Battle-Scarred",
            Self::NotPainted => "Not Painted",
            Self::Unspecified => "",
        }
    }

    /// True for the five float-based wear grades.
    #[must_use]
    pub fn is_wear_grade(&self) -> bool {
        !matches!(self, Self::NotPainted | Self::Unspecified)
    }
}

impl fmt::Display for Exterior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Exterior {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "factorynew" | "fn" => Ok(Self::FactoryNew),
            "minimalwear" | "mw" => Ok(Self::MinimalWear),
            "fieldtested" | "ft" => Ok(Self::FieldTested),
            "wellworn" | "ww" => Ok(Self::WellWorn),
            "battlescarred" | "bs" => Ok(Self::BattleScarred),
            "notpainted" | "vanilla" => Ok(Self::NotPainted),
            "" | "none" => Ok(Self::Unspecified),
            _ => Err(format!("unknown exterior '{s}'")),
        }
    }
}

/// Identity of a priced market item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceKey {
    pub market_hash_name: String,
    pub exterior: Exterior,
    pub stattrack: bool,
    pub app_id: u32,
}

impl PriceKey {
    pub fn new(
        market_hash_name: impl Into<String>,
        exterior: Exterior,
        stattrack: bool,
        app_id: u32,
    ) -> Self {
        Self {
            market_hash_name: market_hash_name.into(),
            exterior,
            stattrack,
            app_id,
        }
    }

    /// Full listing name, e.g. `StatTrak™ AK-47 | Redline (Field-Tested)`.
    #[must_use]
    pub fn listing_name(&self) -> String {
        let mut name = String::new();
        if self.stattrack {
            name.push_str("StatTrak™ ");
        }
        name.push_str(&self.market_hash_name);
        if self.exterior.is_wear_grade() {
            name.push_str(" (");
            name.push_str(self.exterior.as_str());
            name.push(')');
        }
        name
    }
}

impl fmt::Display for PriceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.listing_name(), self.app_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_name_includes_stattrak_and_wear() {
        let key = PriceKey::new("AK-47 | Redline", Exterior::FieldTested, true, 730);
        assert_eq!(key.listing_name(), "StatTrak™ AK-47 | Redline (Field-Tested)");
    }

    #[test]
    fn listing_name_skips_exterior_for_unpainted_items() {
        let key = PriceKey::new("Clutch Case", Exterior::Unspecified, false, 730);
        assert_eq!(key.listing_name(), "Clutch Case");

        let knife = PriceKey::new("★ Karambit", Exterior::NotPainted, false, 730);
        assert_eq!(knife.listing_name(), "★ Karambit");
    }

    #[test]
    fn exterior_parses_market_and_short_forms() {
        assert_eq!("Field-Tested".parse::<Exterior>(), Ok(Exterior::FieldTested));
        assert_eq!("ft".parse::<Exterior>(), Ok(Exterior::FieldTested));
        assert_eq!("Battle-Scarred".parse::<Exterior>(), Ok(Exterior::BattleScarred));
        assert_eq!("".parse::<Exterior>(), Ok(Exterior::Unspecified));
        assert!("Shiny".parse::<Exterior>().is_err());
    }

    #[test]
    fn exterior_round_trips_through_market_spelling() {
        for exterior in [
            Exterior::FactoryNew,
            Exterior::MinimalWear,
            Exterior::FieldTested,
            Exterior::WellWorn,
            Exterior::BattleScarred,
            Exterior::NotPainted,
            Exterior::Unspecified,
        ] {
            assert_eq!(exterior.as_str().parse::<Exterior>(), Ok(exterior));
        }
    }
}
