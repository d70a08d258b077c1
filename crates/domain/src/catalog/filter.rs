use std::cmp::Ordering;
use std::str::FromStr;

use common::{CategoryId, Money};
use serde::Deserialize;

use crate::aggregation::ProductView;
use crate::error::DomainError;

/// Sort direction for catalog listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Field a filtered listing can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderBy {
    Name,
    Price,
    CreatedDate,
    Quantity,
    Location,
    NumberSold,
    AverageRating,
}

impl OrderBy {
    /// Compares two views by this field, ascending.
    pub fn compare(&self, a: &ProductView, b: &ProductView) -> Ordering {
        match self {
            OrderBy::Name => a.product.name.cmp(&b.product.name),
            OrderBy::Price => a.product.price.cmp(&b.product.price),
            OrderBy::CreatedDate => a.product.created_at.cmp(&b.product.created_at),
            OrderBy::Quantity => a.product.quantity.cmp(&b.product.quantity),
            OrderBy::Location => a.product.location.cmp(&b.product.location),
            OrderBy::NumberSold => a.metrics.number_sold.cmp(&b.metrics.number_sold),
            OrderBy::AverageRating => a
                .metrics
                .average_rating
                .total_cmp(&b.metrics.average_rating),
        }
    }
}

impl FromStr for OrderBy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(OrderBy::Name),
            "price" => Ok(OrderBy::Price),
            "created_date" => Ok(OrderBy::CreatedDate),
            "quantity" => Ok(OrderBy::Quantity),
            "location" => Ok(OrderBy::Location),
            "number_sold" => Ok(OrderBy::NumberSold),
            "average_rating" => Ok(OrderBy::AverageRating),
            other => Err(DomainError::validation(format!(
                "Cannot order products by '{other}'."
            ))),
        }
    }
}

/// Optional, AND-combined catalog filters.
///
/// Deserializes from the query string of the product listing, so the field
/// names double as query parameters. An empty filter selects the grouped
/// listing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProductFilter {
    pub category: Option<CategoryId>,
    pub min_price: Option<Money>,
    /// Substring of the product name (case-sensitive).
    pub name: Option<String>,
    /// Substring of the product location (case-sensitive).
    pub location: Option<String>,
    /// Keep only the N most recently created matches.
    #[serde(rename = "quantity")]
    pub most_recent: Option<usize>,
    #[serde(rename = "number_sold")]
    pub min_number_sold: Option<u64>,
    pub order_by: Option<String>,
    pub direction: Option<Direction>,
}

impl ProductFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no filter, ordering or direction was supplied.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn category(mut self, category: CategoryId) -> Self {
        self.category = Some(category);
        self
    }

    pub fn min_price(mut self, price: Money) -> Self {
        self.min_price = Some(price);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn most_recent(mut self, count: usize) -> Self {
        self.most_recent = Some(count);
        self
    }

    pub fn min_number_sold(mut self, count: u64) -> Self {
        self.min_number_sold = Some(count);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some(field.into());
        self.direction = Some(direction);
        self
    }

    /// Parses the requested ordering, if any.
    pub fn ordering(&self) -> Result<Option<(OrderBy, Direction)>, DomainError> {
        self.order_by
            .as_deref()
            .map(|field| {
                let field = field.parse::<OrderBy>()?;
                Ok((field, self.direction.unwrap_or_default()))
            })
            .transpose()
    }

    /// Checks the filters answerable from the product record alone.
    pub(crate) fn admits(&self, product: &ledger::Product) -> bool {
        self.min_price.is_none_or(|min| product.price >= min)
            && self
                .name
                .as_deref()
                .is_none_or(|name| product.name.contains(name))
            && self
                .location
                .as_deref()
                .is_none_or(|location| product.location.contains(location))
    }
}
