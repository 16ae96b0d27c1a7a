//! Product Aggregate

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use crate::domain::value_objects::Money;
use super::ProductId;

/// Catalog product as the backend stores it. `stock` is the authoritative counter.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_price")]
    pub price: Money,
    #[serde(default, deserialize_with = "lenient_count")]
    pub stock: u32,
    #[serde(default)]
    pub genero: String,
    #[serde(default)]
    pub descripcion: String,
    #[serde(default)]
    pub image: Vec<ImageRef>,
}

/// Uploaded file descriptor returned by the backend's image upload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl ImageRef {
    /// Best reference for display: the absolute url when the backend gives one, else the path.
    pub fn reference(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty()).or(Some(self.path.as_str()).filter(|p| !p.is_empty()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StockDirection { Decrement, Increment }

impl Product {
    pub fn is_in_stock(&self) -> bool { self.stock > 0 }
    pub fn primary_image(&self) -> Option<&str> { self.image.first().and_then(ImageRef::reference) }
}

// One malformed record must not fail a whole catalog listing: null, unparsable and negative
// values all read as zero.

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

fn lenient_count<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let n = match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    // `as` saturates, and NaN becomes 0.
    Ok(n.map_or(0, |n| n.max(0.0) as u32))
}

fn lenient_price<'de, D: Deserializer<'de>>(d: D) -> Result<Money, D::Error> {
    let amount = match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.to_string().parse::<Decimal>().ok().or_else(|| n.as_f64().and_then(|f| Decimal::try_from(f).ok())),
        Some(Value::String(s)) => s.trim().parse::<Decimal>().ok(),
        _ => None,
    };
    Ok(Money::new(amount.unwrap_or_default().max(Decimal::ZERO)))
}

/// Stock after shipping or restoring `qty` units. Shipping never drives stock below zero.
pub fn adjusted_stock(current: u32, qty: u32, direction: StockDirection) -> u32 {
    match direction {
        StockDirection::Decrement => current.saturating_sub(qty),
        StockDirection::Increment => current.saturating_add(qty),
    }
}

/// Body of `POST /product`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProductDraft {
    pub name: String,
    pub price: Money,
    pub stock: u32,
    pub descripcion: String,
    pub genero: String,
    pub image: Vec<ImageRef>,
}

/// Body of `PATCH /product/{id}`. Only the fields that are set travel.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descripcion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genero: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<Vec<ImageRef>>,
}

impl ProductPatch {
    pub fn stock(stock: u32) -> Self { Self { stock: Some(stock), ..Self::default() } }
    pub fn is_empty(&self) -> bool { self == &Self::default() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_product_defaults_missing_fields() {
        let p: Product = serde_json::from_value(json!({ "id": 7, "name": "Dragon Ball FighterZ", "price": 29990 })).unwrap();
        assert_eq!(p.stock, 0);
        assert!(!p.is_in_stock());
        assert!(p.image.is_empty());
        assert_eq!(p.price, Money::from_units(29990));
    }

    #[test]
    fn test_malformed_numbers_read_as_zero() {
        let products: Vec<Product> = serde_json::from_value(json!([
            { "id": 1, "name": null, "price": null, "stock": null },
            { "id": 2, "name": "Budokai", "price": -5, "stock": -1 },
            { "id": 3, "name": "Kakarot", "price": "59.99", "stock": "4" },
        ]))
        .unwrap();

        assert_eq!(products.iter().map(|p| p.stock).collect::<Vec<_>>(), vec![0, 0, 4]);
        assert_eq!(products[0].name, "");
        assert_eq!(products[0].price, Money::ZERO);
        assert_eq!(products[1].price, Money::ZERO);
        assert_eq!(products[2].price, Money::new(Decimal::new(5999, 2)));
    }

    #[test]
    fn test_adjusted_stock() {
        assert_eq!(adjusted_stock(5, 2, StockDirection::Decrement), 3);
        assert_eq!(adjusted_stock(1, 2, StockDirection::Decrement), 0);
        assert_eq!(adjusted_stock(3, 2, StockDirection::Increment), 5);
    }

    #[test]
    fn test_patch_sends_only_set_fields() {
        let body = serde_json::to_value(ProductPatch::stock(4)).unwrap();
        assert_eq!(body, json!({ "stock": 4 }));
        assert!(ProductPatch::default().is_empty());
    }

    #[test]
    fn test_primary_image_prefers_url() {
        let img = ImageRef { path: "/vault/a.png".into(), url: Some("https://cdn/a.png".into()), ..ImageRef::default() };
        let p = Product { id: 1, name: "P".into(), price: Money::ZERO, stock: 1, genero: String::new(), descripcion: String::new(), image: vec![img] };
        assert_eq!(p.primary_image(), Some("https://cdn/a.png"));
    }
}
