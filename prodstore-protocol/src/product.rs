//! Product model shared by client and server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Validation failure for a product.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid product: {0}")]
pub struct InvalidProduct(pub String);

/// Unit a product is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitOfMeasure {
    Kilograms,
    Meters,
    Centimeters,
    Liters,
    Grams,
}

impl UnitOfMeasure {
    pub const ALL: [UnitOfMeasure; 5] = [
        UnitOfMeasure::Kilograms,
        UnitOfMeasure::Meters,
        UnitOfMeasure::Centimeters,
        UnitOfMeasure::Liters,
        UnitOfMeasure::Grams,
    ];

    /// Parses a unit name (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|unit| unit.as_str().eq_ignore_ascii_case(value.trim()))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitOfMeasure::Kilograms => "KILOGRAMS",
            UnitOfMeasure::Meters => "METERS",
            UnitOfMeasure::Centimeters => "CENTIMETERS",
            UnitOfMeasure::Liters => "LITERS",
            UnitOfMeasure::Grams => "GRAMS",
        }
    }
}

impl fmt::Display for UnitOfMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a product.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: i64,
}

/// Product fields supplied by a client. The server assigns the id and
/// creation date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub coordinates: Coordinates,
    pub price: f64,
    pub part_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacture_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_of_measure: Option<UnitOfMeasure>,
}

impl NewProduct {
    pub fn validate(&self) -> Result<(), InvalidProduct> {
        if self.name.trim().is_empty() {
            return Err(InvalidProduct("name must not be empty".to_string()));
        }
        if !self.coordinates.x.is_finite() {
            return Err(InvalidProduct("coordinates.x must be finite".to_string()));
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(InvalidProduct("price must be greater than 0".to_string()));
        }
        if self.part_number.trim().is_empty() {
            return Err(InvalidProduct("part number must not be empty".to_string()));
        }
        if let Some(cost) = self.manufacture_cost {
            if !cost.is_finite() {
                return Err(InvalidProduct(
                    "manufacture cost must be finite".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Builds a stored product with the given id and creation date.
    pub fn into_product(self, id: u64, creation_date: DateTime<Utc>) -> Product {
        Product {
            id,
            name: self.name,
            coordinates: self.coordinates,
            creation_date,
            price: self.price,
            part_number: self.part_number,
            manufacture_cost: self.manufacture_cost,
            unit_of_measure: self.unit_of_measure,
        }
    }
}

/// A stored product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub coordinates: Coordinates,
    pub creation_date: DateTime<Utc>,
    pub price: f64,
    pub part_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacture_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_of_measure: Option<UnitOfMeasure>,
}

impl Product {
    pub fn validate(&self) -> Result<(), InvalidProduct> {
        if self.id == 0 {
            return Err(InvalidProduct("id must be greater than 0".to_string()));
        }
        self.fields().validate()
    }

    /// Returns the client-supplied fields of this product.
    pub fn fields(&self) -> NewProduct {
        NewProduct {
            name: self.name.clone(),
            coordinates: self.coordinates,
            price: self.price,
            part_number: self.part_number.clone(),
            manufacture_cost: self.manufacture_cost,
            unit_of_measure: self.unit_of_measure,
        }
    }

    /// Natural collection order: by price, then by id.
    pub fn compare(&self, other: &Product) -> Ordering {
        self.price
            .total_cmp(&other.price)
            .then(self.id.cmp(&other.id))
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} [{}] price={} at ({}, {})",
            self.id, self.name, self.part_number, self.price, self.coordinates.x, self.coordinates.y
        )?;
        if let Some(cost) = self.manufacture_cost {
            write!(f, " cost={cost}")?;
        }
        if let Some(unit) = self.unit_of_measure {
            write!(f, " unit={unit}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewProduct {
        NewProduct {
            name: "Bolt".to_string(),
            coordinates: Coordinates { x: 1.5, y: -3 },
            price: 9.99,
            part_number: "BLT-001".to_string(),
            manufacture_cost: Some(2.0),
            unit_of_measure: Some(UnitOfMeasure::Grams),
        }
    }

    #[test]
    fn test_validate_ok() {
        assert!(sample().validate().is_ok());
        assert!(sample().into_product(1, Utc::now()).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let mut p = sample();
        p.name = "  ".to_string();
        assert!(p.validate().is_err());

        let mut p = sample();
        p.price = 0.0;
        assert!(p.validate().is_err());

        let mut p = sample();
        p.price = f64::NAN;
        assert!(p.validate().is_err());

        let mut p = sample();
        p.part_number.clear();
        assert!(p.validate().is_err());

        let product = sample().into_product(0, Utc::now());
        assert_eq!(
            product.validate(),
            Err(InvalidProduct("id must be greater than 0".to_string()))
        );
    }

    #[test]
    fn test_compare_by_price_then_id() {
        let now = Utc::now();
        let cheap = sample().into_product(5, now);
        let mut pricey = sample().into_product(1, now);
        pricey.price = 100.0;
        let mut cheap_twin = sample().into_product(6, now);
        cheap_twin.price = cheap.price;

        assert_eq!(cheap.compare(&pricey), Ordering::Less);
        assert_eq!(cheap.compare(&cheap_twin), Ordering::Less);
    }

    #[test]
    fn test_unit_parse() {
        assert_eq!(UnitOfMeasure::parse("liters"), Some(UnitOfMeasure::Liters));
        assert_eq!(UnitOfMeasure::parse(" GRAMS "), Some(UnitOfMeasure::Grams));
        assert_eq!(UnitOfMeasure::parse("parsecs"), None);
    }

    #[test]
    fn test_optional_fields_omitted() {
        let mut p = sample();
        p.manufacture_cost = None;
        p.unit_of_measure = None;
        let json = serde_json::to_string(&p).unwrap();
        assert!(!json.contains("manufacture_cost"));
        assert!(!json.contains("unit_of_measure"));
    }
}
