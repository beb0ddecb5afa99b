//! The two-collection cart record and its aggregate projections.
//!
//! A cart holds two independent line collections: the `local` cart used while
//! the shopper is anonymous, and the `remote` mirror of the server-side cart
//! used while a session is active. Exactly one of them is active at a time,
//! selected by [`CartMode`].
//!
//! Aggregates are never stored. [`CartTotals`] is recomputed from the active
//! collection on every read so it cannot drift from the lines it summarizes.

use serde::{Deserialize, Serialize};

use crate::types::{CartLine, CurrencyCode, LineId, LineKey, Price};

/// Which collection is authoritative for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartMode {
    /// No server session; the local cart is active.
    Anonymous,
    /// A server session is active; the remote mirror is active.
    Authenticated,
}

impl CartMode {
    /// Select the mode from the auth session flag.
    #[must_use]
    pub const fn from_session(active: bool) -> Self {
        if active {
            Self::Authenticated
        } else {
            Self::Anonymous
        }
    }

    /// Whether mutations in this mode go through the cart backend.
    #[must_use]
    pub const fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

/// The cart's two line collections.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartCollections {
    #[serde(default)]
    local: Vec<CartLine>,
    #[serde(default)]
    remote: Vec<CartLine>,
}

impl CartCollections {
    /// Create a record from previously persisted collections.
    #[must_use]
    pub const fn from_parts(local: Vec<CartLine>, remote: Vec<CartLine>) -> Self {
        Self { local, remote }
    }

    /// Lines of the anonymous cart.
    #[must_use]
    pub fn local(&self) -> &[CartLine] {
        &self.local
    }

    /// Lines of the authenticated mirror.
    #[must_use]
    pub fn remote(&self) -> &[CartLine] {
        &self.remote
    }

    /// The active collection for `mode`.
    #[must_use]
    pub fn active(&self, mode: CartMode) -> &[CartLine] {
        match mode {
            CartMode::Anonymous => &self.local,
            CartMode::Authenticated => &self.remote,
        }
    }

    /// Mutable access to the active collection for `mode`.
    pub fn active_mut(&mut self, mode: CartMode) -> &mut Vec<CartLine> {
        match mode {
            CartMode::Anonymous => &mut self.local,
            CartMode::Authenticated => &mut self.remote,
        }
    }

    /// Empty the anonymous cart, returning its previous lines.
    pub fn take_local(&mut self) -> Vec<CartLine> {
        std::mem::take(&mut self.local)
    }

    /// Replace the authenticated mirror wholesale.
    pub fn replace_remote(&mut self, lines: Vec<CartLine>) {
        self.remote = lines;
    }

    /// Discard the authenticated mirror.
    pub fn clear_remote(&mut self) {
        self.remote.clear();
    }

    /// Aggregates over the active collection.
    #[must_use]
    pub fn totals(&self, mode: CartMode) -> CartTotals {
        CartTotals::of(self.active(mode))
    }
}

/// Position and line with the given ID.
#[must_use]
pub fn find_line<'a>(lines: &'a [CartLine], line_id: &LineId) -> Option<(usize, &'a CartLine)> {
    lines
        .iter()
        .enumerate()
        .find(|(_, line)| &line.line_id == line_id)
}

/// Position of the line carrying `key`.
#[must_use]
pub fn find_by_key(lines: &[CartLine], key: &LineKey) -> Option<usize> {
    lines.iter().position(|line| key.matches(line))
}

/// Aggregate projections over one collection.
///
/// A cart holds prices in a single currency. `total_price` carries the
/// currency of the first line; use [`has_mixed_currencies`] to detect a
/// collection that breaks that assumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartTotals {
    /// Sum of line quantities.
    pub total_items: u64,
    /// Sum of quantity times unit price.
    pub total_price: Price,
    /// Number of distinct lines.
    pub unique_line_count: usize,
}

impl CartTotals {
    /// Compute the aggregates of `lines`.
    #[must_use]
    pub fn of(lines: &[CartLine]) -> Self {
        Self {
            total_items: total_items(lines),
            total_price: total_price(lines),
            unique_line_count: lines.len(),
        }
    }
}

/// Sum of quantities.
#[must_use]
pub fn total_items(lines: &[CartLine]) -> u64 {
    lines.iter().map(|line| u64::from(line.quantity)).sum()
}

/// Sum of `quantity × unit_price`.
///
/// Lines in one cart share a currency; the total takes the currency of the
/// first line and defaults to USD for an empty collection.
#[must_use]
pub fn total_price(lines: &[CartLine]) -> Price {
    let currency = lines
        .first()
        .map_or_else(CurrencyCode::default, |line| {
            line.product.unit_price.currency_code
        });

    lines.iter().fold(Price::zero(currency), |acc, line| {
        Price::new(acc.amount + line.line_price().amount, currency)
    })
}

/// Whether any line is priced in a different currency than the first.
#[must_use]
pub fn has_mixed_currencies(lines: &[CartLine]) -> bool {
    lines.first().is_some_and(|first| {
        let currency = first.product.unit_price.currency_code;
        lines
            .iter()
            .any(|line| line.product.unit_price.currency_code != currency)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::types::{ProductId, ProductReference};

    fn line(id: &str, unit: i64, quantity: u32) -> CartLine {
        let product = ProductReference {
            id: ProductId::new(id),
            unit_price: Price::new(Decimal::from(unit), CurrencyCode::USD),
            display_name: id.to_string(),
            images: vec![],
        };
        CartLine::new_local(product, quantity, None).unwrap()
    }

    #[test]
    fn test_mixed_currencies() {
        let usd = line("P1", 500, 1);
        let mut eur = line("P2", 300, 1);
        eur.product.unit_price = Price::new(Decimal::from(300), CurrencyCode::EUR);

        assert!(!has_mixed_currencies(&[]));
        assert!(!has_mixed_currencies(&[usd.clone(), line("P3", 100, 2)]));
        assert!(has_mixed_currencies(&[usd, eur]));
    }

    #[test]
    fn test_mode_from_session() {
        assert_eq!(CartMode::from_session(true), CartMode::Authenticated);
        assert_eq!(CartMode::from_session(false), CartMode::Anonymous);
    }

    #[test]
    fn test_active_selects_collection() {
        let cart = CartCollections::from_parts(vec![line("P1", 500, 1)], vec![]);
        assert_eq!(cart.active(CartMode::Anonymous).len(), 1);
        assert!(cart.active(CartMode::Authenticated).is_empty());
    }

    #[test]
    fn test_totals() {
        let lines = vec![line("P1", 500, 3), line("P2", 250, 2)];
        let totals = CartTotals::of(&lines);
        assert_eq!(totals.total_items, 5);
        assert_eq!(totals.total_price.amount, Decimal::from(2000));
        assert_eq!(totals.unique_line_count, 2);
    }

    #[test]
    fn test_totals_empty() {
        let totals = CartTotals::of(&[]);
        assert_eq!(totals.total_items, 0);
        assert_eq!(totals.total_price, Price::zero(CurrencyCode::USD));
        assert_eq!(totals.unique_line_count, 0);
    }

    #[test]
    fn test_totals_follow_active_mode() {
        let cart = CartCollections::from_parts(vec![line("P1", 500, 1)], vec![line("P2", 100, 4)]);
        assert_eq!(cart.totals(CartMode::Anonymous).total_items, 1);
        assert_eq!(cart.totals(CartMode::Authenticated).total_items, 4);
    }

    #[test]
    fn test_take_local_empties() {
        let mut cart = CartCollections::from_parts(vec![line("P1", 500, 1)], vec![]);
        let taken = cart.take_local();
        assert_eq!(taken.len(), 1);
        assert!(cart.local().is_empty());
    }

    #[test]
    fn test_find_helpers() {
        let lines = vec![line("P1", 500, 1), line("P2", 100, 1)];
        let id = lines[1].line_id.clone();
        let (index, found) = find_line(&lines, &id).unwrap();
        assert_eq!(index, 1);
        assert_eq!(found.product_id, ProductId::new("P2"));

        let key = LineKey::new(ProductId::new("P1"), None);
        assert_eq!(find_by_key(&lines, &key), Some(0));
    }
}
