//! Session commands.
//!
//! The CLI has no real auth flow; `login` and `logout` flip the persisted
//! session flag and run the same lifecycle the session listener would.

use super::cart::{print_line, print_view};
use super::{App, CliError};

/// Mark the session active and merge the anonymous cart.
pub async fn login(app: &App) -> Result<(), CliError> {
    if app.session.is_active() {
        print_line("Already signed in");
        return Ok(());
    }

    app.session.sign_in();
    app.save_session().await?;

    let report = app.cart.handle_login().await;
    if report.is_partial() {
        for failure in &report.failures {
            print_line(&format!(
                "Could not merge {} x{}: {}",
                failure.product_id, failure.quantity, failure.reason
            ));
        }
    }
    print_line(&format!(
        "Signed in, merged {} of {} lines",
        report.merged,
        report.attempted()
    ));
    print_view(&app.cart.view(), false);
    Ok(())
}

/// End the session and discard the signed-in cart.
pub async fn logout(app: &App) -> Result<(), CliError> {
    if !app.session.is_active() {
        print_line("Not signed in");
        return Ok(());
    }

    app.session.sign_out();
    app.save_session().await?;
    app.cart.handle_logout().await;

    print_line("Signed out");
    print_view(&app.cart.view(), false);
    Ok(())
}
