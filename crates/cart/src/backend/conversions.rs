//! Wire → domain conversions.

use std::str::FromStr;

use basket_core::{CartLine, CurrencyCode, LineId, Price, ProductId, ProductReference};
use rust_decimal::Decimal;

use super::ApiError;
use super::types::{LineRecord, MoneyRecord, ProductRecord};

pub fn convert_money(money: MoneyRecord) -> Result<Price, ApiError> {
    let amount = Decimal::from_str(&money.amount)
        .map_err(|e| ApiError::Malformed(format!("amount '{}': {e}", money.amount)))?;
    let currency = CurrencyCode::from_str(&money.currency_code)
        .map_err(|e| ApiError::Malformed(e.to_string()))?;
    Ok(Price::new(amount, currency))
}

pub fn convert_product(product: ProductRecord) -> Result<ProductReference, ApiError> {
    if product.id.is_empty() {
        return Err(ApiError::Malformed("product without id".to_string()));
    }

    Ok(ProductReference {
        id: ProductId::new(product.id),
        unit_price: convert_money(product.price)?,
        display_name: product.title,
        images: product.images.into_iter().map(|img| img.url).collect(),
    })
}

/// Convert a server line, rejecting lines the cart cannot hold.
///
/// A usable line has a non-empty, server-issued ID and a quantity of at
/// least one.
pub fn convert_line(line: LineRecord) -> Result<CartLine, ApiError> {
    let line_id = match line.id {
        Some(id) if !id.is_empty() => LineId::new(id),
        _ => return Err(ApiError::Malformed("cart line without id".to_string())),
    };

    if line_id.is_local() {
        return Err(ApiError::Malformed(format!(
            "cart line id '{line_id}' uses the reserved local prefix"
        )));
    }

    let quantity = u32::try_from(line.quantity)
        .ok()
        .filter(|q| *q >= 1)
        .ok_or_else(|| {
            ApiError::Malformed(format!("cart line '{line_id}' has quantity {}", line.quantity))
        })?;

    let product = convert_product(line.product)?;

    Ok(CartLine {
        line_id,
        product_id: product.id.clone(),
        quantity,
        selected_variant: line.variant,
        product,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::backend::types::ImageRecord;

    fn record(id: Option<&str>, quantity: i64) -> LineRecord {
        LineRecord {
            id: id.map(str::to_string),
            quantity,
            variant: Some("Large".to_string()),
            product: ProductRecord {
                id: "P1".to_string(),
                title: "Dried Pineapple".to_string(),
                price: MoneyRecord {
                    amount: "5.00".to_string(),
                    currency_code: "USD".to_string(),
                },
                images: vec![ImageRecord {
                    url: "https://cdn.shop.test/p1.jpg".to_string(),
                }],
            },
        }
    }

    #[test]
    fn test_convert_line() {
        let line = convert_line(record(Some("line-1"), 2)).unwrap();
        assert_eq!(line.line_id, LineId::new("line-1"));
        assert_eq!(line.product_id, ProductId::new("P1"));
        assert_eq!(line.quantity, 2);
        assert_eq!(line.selected_variant.as_deref(), Some("Large"));
        assert_eq!(line.product.unit_price.amount, Decimal::new(500, 2));
        assert_eq!(
            line.product.featured_image(),
            Some("https://cdn.shop.test/p1.jpg")
        );
    }

    #[test]
    fn test_missing_id_is_malformed() {
        assert!(matches!(
            convert_line(record(None, 1)),
            Err(ApiError::Malformed(_))
        ));
        assert!(matches!(
            convert_line(record(Some(""), 1)),
            Err(ApiError::Malformed(_))
        ));
    }

    #[test]
    fn test_local_prefix_is_malformed() {
        assert!(matches!(
            convert_line(record(Some("local-123"), 1)),
            Err(ApiError::Malformed(_))
        ));
    }

    #[test]
    fn test_non_positive_quantity_is_malformed() {
        assert!(matches!(
            convert_line(record(Some("line-1"), 0)),
            Err(ApiError::Malformed(_))
        ));
        assert!(matches!(
            convert_line(record(Some("line-1"), -3)),
            Err(ApiError::Malformed(_))
        ));
    }

    #[test]
    fn test_bad_money_is_malformed() {
        let bad = MoneyRecord {
            amount: "five".to_string(),
            currency_code: "USD".to_string(),
        };
        assert!(matches!(convert_money(bad), Err(ApiError::Malformed(_))));

        let bad = MoneyRecord {
            amount: "5".to_string(),
            currency_code: "JPY".to_string(),
        };
        assert!(matches!(convert_money(bad), Err(ApiError::Malformed(_))));
    }
}
