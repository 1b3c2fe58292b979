//! Storefront table ordering.
//!
//! The two lists below are configuration, maintained by hand. When the schema
//! gains or drops a table or a foreign key, update [`DELETION_ORDER`],
//! [`INSERTION_ORDER`] and [`FOREIGN_KEYS`] together; [`TableOrder::validate`]
//! checks that they still agree with each other.

use std::collections::{HashMap, HashSet};

use crate::domain::value_objects::{TableName, TableNameError};
use crate::error::{DemoDataError, Result};

/// Children before parents.
pub const DELETION_ORDER: &[&str] = &[
    "settings",
    "verificationTokens",
    "sessions",
    "accounts",
    "paymentHealthChecks",
    "paymentTransactionLogs",
    "refunds",
    "payments",
    "paymentGatewaySettings",
    "shipments",
    "couponUsages",
    "orderItems",
    "orders",
    "cartItems",
    "carts",
    "addresses",
    "wishlists",
    "reviews",
    "variationAttributeValues",
    "productVariations",
    "productAttributeValues",
    "productAttributes",
    "productTaxonomies",
    "productImages",
    "discounts",
    "products",
    "attributeValues",
    "attributes",
    "taxonomies",
    "brands",
    "categories",
    "coupons",
    "paymentGateways",
    "menuItems",
    "menus",
    "pageRevisions",
    "pages",
    "bannerRevisions",
    "banners",
    "media",
    "users",
];

/// Parents before children.
pub const INSERTION_ORDER: &[&str] = &[
    "users",
    "accounts",
    "sessions",
    "verificationTokens",
    "media",
    "categories",
    "brands",
    "taxonomies",
    "attributes",
    "attributeValues",
    "products",
    "productImages",
    "productTaxonomies",
    "productAttributes",
    "productAttributeValues",
    "productVariations",
    "variationAttributeValues",
    "reviews",
    "wishlists",
    "coupons",
    "discounts",
    "addresses",
    "carts",
    "cartItems",
    "orders",
    "orderItems",
    "couponUsages",
    "shipments",
    "paymentGateways",
    "paymentGatewaySettings",
    "payments",
    "paymentTransactionLogs",
    "paymentHealthChecks",
    "refunds",
    "pages",
    "pageRevisions",
    "banners",
    "bannerRevisions",
    "menus",
    "menuItems",
    "settings",
];

/// Declared `(child, parent)` foreign-key pairs. Used to check the lists, never
/// to compute them.
pub const FOREIGN_KEYS: &[(&str, &str)] = &[
    ("accounts", "users"),
    ("sessions", "users"),
    ("media", "users"),
    ("attributeValues", "attributes"),
    ("products", "categories"),
    ("products", "brands"),
    ("productImages", "products"),
    ("productImages", "media"),
    ("productTaxonomies", "products"),
    ("productTaxonomies", "taxonomies"),
    ("productAttributes", "products"),
    ("productAttributes", "attributes"),
    ("productAttributeValues", "productAttributes"),
    ("productAttributeValues", "attributeValues"),
    ("productVariations", "products"),
    ("variationAttributeValues", "productVariations"),
    ("variationAttributeValues", "attributeValues"),
    ("reviews", "products"),
    ("reviews", "users"),
    ("wishlists", "products"),
    ("wishlists", "users"),
    ("discounts", "products"),
    ("discounts", "categories"),
    ("addresses", "users"),
    ("carts", "users"),
    ("cartItems", "carts"),
    ("cartItems", "products"),
    ("cartItems", "productVariations"),
    ("orders", "users"),
    ("orders", "addresses"),
    ("orders", "coupons"),
    ("orderItems", "orders"),
    ("orderItems", "products"),
    ("orderItems", "productVariations"),
    ("couponUsages", "coupons"),
    ("couponUsages", "orders"),
    ("couponUsages", "users"),
    ("shipments", "orders"),
    ("paymentGatewaySettings", "paymentGateways"),
    ("payments", "orders"),
    ("payments", "paymentGateways"),
    ("paymentTransactionLogs", "payments"),
    ("paymentTransactionLogs", "paymentGateways"),
    ("paymentHealthChecks", "paymentGateways"),
    ("refunds", "payments"),
    ("refunds", "orders"),
    ("pages", "users"),
    ("pageRevisions", "pages"),
    ("pageRevisions", "users"),
    ("banners", "media"),
    ("bannerRevisions", "banners"),
    ("bannerRevisions", "users"),
    ("menuItems", "menus"),
    ("menuItems", "pages"),
    ("settings", "media"),
];

/// A deletion list and an insertion list over the same set of tables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableOrder {
    deletion: Vec<TableName>,
    insertion: Vec<TableName>,
}

impl TableOrder {
    pub fn new(deletion: Vec<TableName>, insertion: Vec<TableName>) -> Self { Self { deletion, insertion } }

    /// Builds an order from plain names, rejecting anything that is not a valid identifier.
    pub fn from_names(deletion: &[&str], insertion: &[&str]) -> std::result::Result<Self, TableNameError> {
        let parse = |list: &[&str]| list.iter().map(|n| TableName::new(*n)).collect::<std::result::Result<Vec<_>, _>>();
        Ok(Self::new(parse(deletion)?, parse(insertion)?))
    }

    /// The storefront's built-in lists.
    pub fn storefront() -> Result<Self> {
        Self::from_names(DELETION_ORDER, INSERTION_ORDER).map_err(|e| DemoDataError::InvalidTableOrder(e.to_string()))
    }

    pub fn deletion(&self) -> &[TableName] { &self.deletion }
    pub fn insertion(&self) -> &[TableName] { &self.insertion }

    pub fn contains(&self, table: &TableName) -> bool { self.insertion.contains(table) }

    /// Checks both lists are duplicate-free, cover the same tables, and respect
    /// every `(child, parent)` pair whose tables are both listed.
    pub fn validate(&self, foreign_keys: &[(&str, &str)]) -> Result<()> {
        let deletion = positions(&self.deletion, "deletion")?;
        let insertion = positions(&self.insertion, "insertion")?;

        let del_set: HashSet<&str> = deletion.keys().copied().collect();
        let ins_set: HashSet<&str> = insertion.keys().copied().collect();
        if let Some(missing) = del_set.difference(&ins_set).min() {
            return Err(DemoDataError::InvalidTableOrder(format!("{missing} is deleted but never reinserted")));
        }
        if let Some(missing) = ins_set.difference(&del_set).min() {
            return Err(DemoDataError::InvalidTableOrder(format!("{missing} is inserted but never deleted")));
        }

        for (child, parent) in foreign_keys {
            let (Some(dc), Some(dp)) = (deletion.get(child), deletion.get(parent)) else { continue };
            if dc > dp {
                return Err(DemoDataError::InvalidTableOrder(format!("{child} must be deleted before {parent}")));
            }
            if let (Some(ic), Some(ip)) = (insertion.get(child), insertion.get(parent)) {
                if ic < ip {
                    return Err(DemoDataError::InvalidTableOrder(format!("{parent} must be inserted before {child}")));
                }
            }
        }
        Ok(())
    }
}

fn positions<'a>(list: &'a [TableName], which: &str) -> Result<HashMap<&'a str, usize>> {
    let mut map = HashMap::with_capacity(list.len());
    for (i, t) in list.iter().enumerate() {
        if map.insert(t.as_str(), i).is_some() {
            return Err(DemoDataError::InvalidTableOrder(format!("{t} appears twice in the {which} list")));
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(list: &[&str], name: &str) -> usize {
        list.iter().position(|t| *t == name).unwrap_or_else(|| panic!("{name} not listed"))
    }

    #[test]
    fn test_storefront_order_is_valid() {
        let order = TableOrder::storefront().unwrap();
        order.validate(FOREIGN_KEYS).unwrap();
        assert!(order.deletion().len() >= 40);
    }

    #[test]
    fn test_every_foreign_key_is_respected() {
        for (child, parent) in FOREIGN_KEYS {
            assert!(index(DELETION_ORDER, child) < index(DELETION_ORDER, parent), "delete {child} before {parent}");
            assert!(index(INSERTION_ORDER, parent) < index(INSERTION_ORDER, child), "insert {parent} before {child}");
        }
    }

    #[test]
    fn test_lists_cover_the_same_tables_once() {
        let del: HashSet<&str> = DELETION_ORDER.iter().copied().collect();
        let ins: HashSet<&str> = INSERTION_ORDER.iter().copied().collect();
        assert_eq!(del.len(), DELETION_ORDER.len());
        assert_eq!(ins.len(), INSERTION_ORDER.len());
        assert_eq!(del, ins);
    }

    #[test]
    fn test_lists_are_not_required_to_mirror() {
        let mut reversed = INSERTION_ORDER.to_vec();
        reversed.reverse();
        assert_ne!(reversed, DELETION_ORDER);
    }

    #[test]
    fn test_validate_reports_problems() {
        let fks = &[("orders", "users")];
        let bad_delete = TableOrder::from_names(&["users", "orders"], &["users", "orders"]).unwrap();
        assert!(bad_delete.validate(fks).unwrap_err().to_string().contains("orders must be deleted before users"));

        let bad_insert = TableOrder::from_names(&["orders", "users"], &["orders", "users"]).unwrap();
        assert!(bad_insert.validate(fks).unwrap_err().to_string().contains("users must be inserted before orders"));

        let missing = TableOrder::from_names(&["orders", "users"], &["users"]).unwrap();
        assert!(missing.validate(fks).unwrap_err().to_string().contains("orders is deleted but never reinserted"));

        let dup = TableOrder::from_names(&["users", "users"], &["users"]).unwrap();
        assert!(dup.validate(fks).unwrap_err().to_string().contains("appears twice"));
    }
}
