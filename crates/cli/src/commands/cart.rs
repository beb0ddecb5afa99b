//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! basket show
//! basket add P1 --quantity 2 --variant Large
//! basket qty <line-id> -1
//! basket variant <line-id> Small
//! basket remove <line-id>
//! basket sync
//! ```

use basket_cart::{CartView, SyncOutcome};
use basket_core::{LineId, ProductId};

use super::{App, CliError};

/// Print the active cart.
pub fn show(app: &App, json: bool) {
    print_view(&app.cart.view(), json);
}

/// Add a product by ID.
pub async fn add(
    app: &App,
    product_id: &str,
    quantity: u32,
    variant: Option<String>,
) -> Result<(), CliError> {
    let line_id = app
        .cart
        .add_product(&ProductId::new(product_id), quantity, variant)
        .await?;
    tracing::info!(line_id = %line_id, "Added to cart");
    print_view(&app.cart.view(), false);
    Ok(())
}

/// Remove a line.
pub async fn remove(app: &App, line_id: &str) -> Result<(), CliError> {
    app.cart.remove_line(&LineId::new(line_id)).await?;
    print_view(&app.cart.view(), false);
    Ok(())
}

/// Change a line's quantity by a signed delta.
pub async fn quantity(app: &App, line_id: &str, delta: i64) -> Result<(), CliError> {
    app.cart.update_quantity(&LineId::new(line_id), delta).await?;
    print_view(&app.cart.view(), false);
    Ok(())
}

/// Change a line's variant.
pub async fn variant(app: &App, line_id: &str, variant: String) -> Result<(), CliError> {
    app.cart
        .update_variant(&LineId::new(line_id), variant)
        .await?;
    print_view(&app.cart.view(), false);
    Ok(())
}

/// Refresh the signed-in cart from the backend.
pub async fn sync(app: &App) {
    let outcome = app.cart.sync().await;
    print_line(match outcome {
        SyncOutcome::Local => "Not signed in, nothing to sync",
        SyncOutcome::Fresh => "Cart synced",
        SyncOutcome::Stale => "Backend unavailable, showing last known cart",
    });
    print_view(&app.cart.view(), false);
}

#[allow(clippy::print_stdout)]
pub(super) fn print_line(message: &str) {
    println!("{message}");
}

#[allow(clippy::print_stdout)]
pub(super) fn print_view(view: &CartView, json: bool) {
    if json {
        match serde_json::to_string_pretty(view) {
            Ok(out) => println!("{out}"),
            Err(e) => tracing::error!(error = %e, "Failed to render cart"),
        }
        return;
    }

    if view.is_empty() {
        println!("Cart is empty ({:?})", view.mode);
        return;
    }

    for item in &view.items {
        let variant = item
            .variant_title
            .as_deref()
            .map(|v| format!(" [{v}]"))
            .unwrap_or_default();
        println!(
            "{:<40} {}{} x{} @ {} = {}",
            item.id, item.title, variant, item.quantity, item.price, item.line_price
        );
    }
    println!(
        "{} items, subtotal {} ({:?})",
        view.item_count, view.subtotal, view.mode
    );
}
