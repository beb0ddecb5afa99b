//! Cart display data.
//!
//! Flattens the active collection into pre-formatted strings for templates
//! and the CLI. Built on demand from the lines, never stored.

use basket_core::{CartLine, CartMode, CartTotals};
use serde::Serialize;

/// Cart item display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub id: String,
    pub product_id: String,
    pub title: String,
    pub variant_title: Option<String>,
    pub quantity: u32,
    pub price: String,
    pub line_price: String,
    pub image: Option<String>,
}

/// Cart display data.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub mode: CartMode,
    pub items: Vec<CartItemView>,
    pub subtotal: String,
    pub item_count: u64,
}

impl CartView {
    /// Create an empty cart.
    #[must_use]
    pub fn empty(mode: CartMode) -> Self {
        Self::from_lines(mode, &[])
    }

    /// Build the view of `lines`.
    #[must_use]
    pub fn from_lines(mode: CartMode, lines: &[CartLine]) -> Self {
        let totals = CartTotals::of(lines);
        Self {
            mode,
            items: lines.iter().map(CartItemView::from).collect(),
            subtotal: totals.total_price.display(),
            item_count: totals.total_items,
        }
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<&CartLine> for CartItemView {
    fn from(line: &CartLine) -> Self {
        Self {
            id: line.line_id.to_string(),
            product_id: line.product_id.to_string(),
            title: line.product.display_name.clone(),
            variant_title: line.selected_variant.clone(),
            quantity: line.quantity,
            price: line.product.unit_price.display(),
            line_price: line.line_price().display(),
            image: line.product.featured_image().map(str::to_string),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use basket_core::{CurrencyCode, Price, ProductId, ProductReference};

    use super::*;

    #[test]
    fn test_empty_view() {
        let view = CartView::empty(CartMode::Anonymous);
        assert!(view.is_empty());
        assert_eq!(view.subtotal, "$0.00");
        assert_eq!(view.item_count, 0);
    }

    #[test]
    fn test_view_formats_prices() {
        let product = ProductReference {
            id: ProductId::new("P1"),
            unit_price: Price::from_minor(1250, CurrencyCode::USD),
            display_name: "Dried Pineapple".to_string(),
            images: vec!["https://cdn.shop.test/p1.jpg".to_string()],
        };
        let line = CartLine::new_local(product, 3, Some("Large".into())).unwrap();
        let view = CartView::from_lines(CartMode::Anonymous, &[line]);

        assert_eq!(view.item_count, 3);
        assert_eq!(view.subtotal, "$37.50");
        let item = &view.items[0];
        assert_eq!(item.title, "Dried Pineapple");
        assert_eq!(item.variant_title.as_deref(), Some("Large"));
        assert_eq!(item.price, "$12.50");
        assert_eq!(item.line_price, "$37.50");
        assert_eq!(item.image.as_deref(), Some("https://cdn.shop.test/p1.jpg"));
    }
}
