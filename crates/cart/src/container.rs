//! The cart state container.
//!
//! Holds the anonymous (`local`) and authenticated (`remote`) collections and
//! routes every operation to whichever one the session flag selects.
//!
//! # Mutations
//!
//! Anonymous mutations are local only and cannot fail at this layer.
//! Authenticated mutations follow one shape:
//!
//! 1. snapshot the affected line
//! 2. apply the change to the mirror (optimistic)
//! 3. send the change to the backend
//! 4. on success, run a reconciliation sync; on failure, restore the snapshot
//!
//! The state lock is never held across a backend call, so two mutations of
//! the same line issued back to back can interleave; each computes its change
//! from the quantity it observed and the slower one's commit or rollback wins.
//!
//! # Persistence
//!
//! Both collections are saved after every change. Save failures are logged
//! and never undo an in-memory change.

use std::sync::{Arc, Mutex, PoisonError};

use basket_core::collections::{find_by_key, find_line, has_mixed_currencies};
use basket_core::{
    CartCollections, CartLine, CartMode, CartTotals, LineId, LineKey, ProductId,
    ProductReference, QuantityError, apply_delta,
};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use crate::backend::ApiError;
use crate::catalog::Catalog;
use crate::error::{CartError, Mutation, Result};
use crate::events::{CartEvent, EVENT_CAPACITY};
use crate::gateway::CartGateway;
use crate::session::SessionWatch;
use crate::store::CartPersistence;
use crate::view::CartView;

/// Result of a reconciliation sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Anonymous mode; nothing to fetch.
    Local,
    /// The mirror was replaced with the backend's lines.
    Fresh,
    /// The backend was unreachable; the previous mirror was kept.
    Stale,
}

/// A local line that could not be merged on login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeFailure {
    pub product_id: ProductId,
    pub variant: Option<String>,
    pub quantity: u32,
    pub reason: String,
}

/// Outcome of merge-on-login.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Lines accepted by the backend.
    pub merged: usize,
    /// Lines the backend rejected. They are not retried.
    pub failures: Vec<MergeFailure>,
}

impl MergeReport {
    /// Number of local lines submitted.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.merged + self.failures.len()
    }

    /// Whether any line failed to merge.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Cart state container.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CartContainer {
    inner: Arc<CartContainerInner>,
}

struct CartContainerInner {
    state: Mutex<CartCollections>,
    session: SessionWatch,
    gateway: Arc<dyn CartGateway>,
    catalog: Arc<dyn Catalog>,
    store: Arc<dyn CartPersistence>,
    save_lock: tokio::sync::Mutex<()>,
    events: broadcast::Sender<CartEvent>,
}

enum VariantCheck {
    Missing,
    Unchanged,
    Duplicate(ProductId),
    Ready(Option<String>),
}

impl CartContainer {
    /// Restore the cart from `store` and wire it to its collaborators.
    ///
    /// A store that fails to load is logged and treated as empty. A saved
    /// authenticated mirror is dropped when no session is active, since it
    /// belongs to a session that no longer exists.
    pub async fn restore(
        gateway: Arc<dyn CartGateway>,
        catalog: Arc<dyn Catalog>,
        store: Arc<dyn CartPersistence>,
        session: SessionWatch,
    ) -> Self {
        let mut collections = match store.load().await {
            Ok(Some(collections)) => collections,
            Ok(None) => CartCollections::default(),
            Err(e) => {
                error!(error = %e, "Failed to restore saved cart, starting empty");
                CartCollections::default()
            }
        };

        if !session.is_active() && !collections.remote().is_empty() {
            debug!("No active session, dropping saved authenticated cart");
            collections.clear_remote();
        }

        info!(
            local_lines = collections.local().len(),
            remote_lines = collections.remote().len(),
            "Cart restored"
        );

        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(CartContainerInner {
                state: Mutex::new(collections),
                session,
                gateway,
                catalog,
                store,
                save_lock: tokio::sync::Mutex::new(()),
                events,
            }),
        }
    }

    // =========================================================================
    // Read side
    // =========================================================================

    /// Which collection is active right now.
    #[must_use]
    pub fn mode(&self) -> CartMode {
        CartMode::from_session(self.inner.session.is_active())
    }

    /// Lines of the active collection.
    #[must_use]
    pub fn lines(&self) -> Vec<CartLine> {
        let mode = self.mode();
        self.read(|c| c.active(mode).to_vec())
    }

    /// Aggregates over the active collection.
    #[must_use]
    pub fn totals(&self) -> CartTotals {
        let mode = self.mode();
        let (totals, mixed) =
            self.read(|c| (c.totals(mode), has_mixed_currencies(c.active(mode))));
        if mixed {
            warn!(
                currency = ?totals.total_price.currency_code,
                "Cart mixes currencies, total is labelled with the first line's"
            );
        }
        totals
    }

    /// Display data for the active collection.
    #[must_use]
    pub fn view(&self) -> CartView {
        let mode = self.mode();
        self.read(|c| CartView::from_lines(mode, c.active(mode)))
    }

    /// Snapshot of both collections.
    #[must_use]
    pub fn collections(&self) -> CartCollections {
        self.read(CartCollections::clone)
    }

    /// Subscribe to cart events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CartEvent> {
        self.inner.events.subscribe()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Look a product up in the catalog and add it.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown products, `Catalog` when the lookup itself
    /// fails, otherwise as [`CartContainer::add_line`].
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_product(
        &self,
        product_id: &ProductId,
        quantity: u32,
        variant: Option<String>,
    ) -> Result<LineId> {
        let product = self
            .inner
            .catalog
            .get_product(product_id)
            .await
            .map_err(|e| match e {
                ApiError::NotFound(_) => CartError::NotFound(format!("product {product_id}")),
                other => CartError::Catalog(other),
            })?;

        self.add_line(product, quantity, variant).await
    }

    /// Add units of a product.
    ///
    /// An existing line with the same product and variant is incremented
    /// instead. Returns the ID of the line holding the product.
    ///
    /// # Errors
    ///
    /// `InvalidQuantity` for zero units, `MutationFailed` if the backend
    /// rejects the line or answers without a usable line ID.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_line(
        &self,
        product: ProductReference,
        quantity: u32,
        variant: Option<String>,
    ) -> Result<LineId> {
        if quantity == 0 {
            return Err(QuantityError::Zero.into());
        }

        let mode = self.mode();
        let key = LineKey::new(product.id.clone(), variant.clone());

        if !mode.is_authenticated() {
            let fresh = CartLine::new_local(product, quantity, variant)?;
            // Lookup and insert under one lock so concurrent adds of a key
            // cannot both miss.
            let line_id = self.write(|c| -> Result<LineId> {
                let lines = c.active_mut(mode);
                if let Some(line) = lines.iter_mut().find(|line| key.matches(line)) {
                    debug!(line_id = %line.line_id, "Line already in cart, incrementing");
                    let next = apply_delta(line.quantity, i64::from(quantity))?;
                    line.quantity = next.unwrap_or(line.quantity);
                    return Ok(line.line_id.clone());
                }
                let line_id = fresh.line_id.clone();
                lines.push(fresh);
                Ok(line_id)
            })?;
            self.commit(mode).await;
            return Ok(line_id);
        }

        let existing = self.read(|c| {
            c.active(mode)
                .iter()
                .find(|line| key.matches(line))
                .map(|line| line.line_id.clone())
        });

        if let Some(line_id) = existing {
            debug!(line_id = %line_id, "Line already in cart, incrementing");
            self.update_quantity(&line_id, i64::from(quantity)).await?;
            return Ok(line_id);
        }

        let line = self
            .inner
            .gateway
            .add(&product.id, quantity, variant.as_deref())
            .await
            .and_then(require_server_line)
            .map_err(|e| self.fail(Mutation::Add, None, e))?;

        let line_id = line.line_id.clone();
        if self.mode() == mode {
            self.write(|c| upsert(c.active_mut(mode), line));
            self.commit(mode).await;
        }

        self.sync().await;
        Ok(line_id)
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown lines, `MutationFailed` if the backend rejects
    /// the removal (the line is put back where it was).
    #[instrument(skip(self), fields(line_id = %line_id))]
    pub async fn remove_line(&self, line_id: &LineId) -> Result<()> {
        let mode = self.mode();

        let removed = self.write(|c| {
            let lines = c.active_mut(mode);
            let index = lines.iter().position(|line| &line.line_id == line_id)?;
            Some((index, lines.remove(index)))
        });

        let Some((index, line)) = removed else {
            debug!("Remove for unknown line");
            return Err(CartError::NotFound(format!("line {line_id}")));
        };

        self.commit(mode).await;

        if !mode.is_authenticated() {
            return Ok(());
        }

        match self.inner.gateway.remove(line_id).await {
            Ok(()) => {
                self.sync().await;
                Ok(())
            }
            Err(e) => {
                if self.still_in(mode) {
                    self.write(|c| reinsert(c.active_mut(mode), index, line));
                    self.commit(mode).await;
                }
                Err(self.fail(Mutation::Remove, Some(line_id), e))
            }
        }
    }

    /// Change a line's quantity by `delta`.
    ///
    /// A result of zero or less removes the line.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown lines, `InvalidQuantity` on overflow,
    /// `MutationFailed` if the backend rejects the change (the previous
    /// quantity is restored).
    #[instrument(skip(self), fields(line_id = %line_id))]
    pub async fn update_quantity(&self, line_id: &LineId, delta: i64) -> Result<()> {
        let mode = self.mode();

        let previous = self
            .read(|c| find_line(c.active(mode), line_id).map(|(_, line)| line.quantity))
            .ok_or_else(|| CartError::NotFound(format!("line {line_id}")))?;

        if delta == 0 {
            return Ok(());
        }

        let Some(next) = apply_delta(previous, delta)? else {
            debug!(previous, delta, "Quantity reaches zero, removing line");
            return self.remove_line(line_id).await;
        };

        self.set_quantity(mode, line_id, next);
        self.commit(mode).await;

        if !mode.is_authenticated() {
            return Ok(());
        }

        match self.inner.gateway.update_quantity(line_id, delta).await {
            Ok(()) => {
                self.sync().await;
                Ok(())
            }
            Err(e) => {
                if self.still_in(mode) {
                    self.set_quantity(mode, line_id, previous);
                    self.commit(mode).await;
                }
                Err(self.fail(Mutation::UpdateQuantity, Some(line_id), e))
            }
        }
    }

    /// Change a line's selected variant. Signed-in carts only.
    ///
    /// # Errors
    ///
    /// `VariantChangeUnsupported` in anonymous mode, `NotFound` for unknown
    /// lines, `DuplicateLine` if another line already holds the product with
    /// that variant, `MutationFailed` if the backend rejects the change.
    #[instrument(skip(self), fields(line_id = %line_id))]
    pub async fn update_variant(&self, line_id: &LineId, variant: String) -> Result<()> {
        let mode = self.mode();
        if !mode.is_authenticated() {
            return Err(CartError::VariantChangeUnsupported);
        }

        let check = self.read(|c| {
            let lines = c.active(mode);
            let Some((_, line)) = find_line(lines, line_id) else {
                return VariantCheck::Missing;
            };
            if line.selected_variant.as_deref() == Some(variant.as_str()) {
                return VariantCheck::Unchanged;
            }
            let key = LineKey::new(line.product_id.clone(), Some(variant.clone()));
            if find_by_key(lines, &key).is_some() {
                VariantCheck::Duplicate(line.product_id.clone())
            } else {
                VariantCheck::Ready(line.selected_variant.clone())
            }
        });

        let previous = match check {
            VariantCheck::Missing => return Err(CartError::NotFound(format!("line {line_id}"))),
            VariantCheck::Unchanged => return Ok(()),
            VariantCheck::Duplicate(product_id) => return Err(CartError::DuplicateLine(product_id)),
            VariantCheck::Ready(previous) => previous,
        };

        self.set_variant(mode, line_id, Some(variant.clone()));
        self.commit(mode).await;

        match self.inner.gateway.update_variant(line_id, &variant).await {
            Ok(()) => {
                self.sync().await;
                Ok(())
            }
            Err(e) => {
                if self.still_in(mode) {
                    self.set_variant(mode, line_id, previous);
                    self.commit(mode).await;
                }
                Err(self.fail(Mutation::UpdateVariant, Some(line_id), e))
            }
        }
    }

    // =========================================================================
    // Reconciliation and session lifecycle
    // =========================================================================

    /// Replace the authenticated mirror with the backend's lines.
    ///
    /// Never fails: an unreachable backend leaves the previous mirror in
    /// place and reports [`SyncOutcome::Stale`].
    #[instrument(skip(self))]
    pub async fn sync(&self) -> SyncOutcome {
        if !self.mode().is_authenticated() {
            return SyncOutcome::Local;
        }

        match self.inner.gateway.list().await {
            Ok(lines) => {
                if !self.mode().is_authenticated() {
                    debug!("Session ended during sync, dropping backend lines");
                    return SyncOutcome::Local;
                }

                let lines = coalesce(lines);
                let count = lines.len();
                self.write(|c| c.replace_remote(lines));
                self.persist().await;
                self.emit(CartEvent::Synced { lines: count });
                debug!(lines = count, "Cart synced");
                SyncOutcome::Fresh
            }
            Err(e) => {
                warn!(error = %e, "Cart sync unavailable, keeping previous cart");
                self.emit(CartEvent::SyncUnavailable {
                    reason: e.to_string(),
                });
                SyncOutcome::Stale
            }
        }
    }

    /// Drain the anonymous cart into the backend cart.
    ///
    /// Lines are submitted one at a time in cart order. Failed lines are
    /// logged and dropped; the anonymous cart is cleared whatever the
    /// outcome, then the mirror is synced. Without an active session this
    /// does nothing.
    #[instrument(skip(self))]
    pub async fn merge_on_login(&self) -> MergeReport {
        let mut report = MergeReport::default();
        if !self.mode().is_authenticated() {
            debug!("No active session, keeping anonymous cart");
            return report;
        }

        let snapshot = self.read(|c| c.local().to_vec());

        if snapshot.is_empty() {
            debug!("Anonymous cart empty, nothing to merge");
            return report;
        }

        for line in &snapshot {
            match self
                .inner
                .gateway
                .add(&line.product_id, line.quantity, line.selected_variant.as_deref())
                .await
                .and_then(require_server_line)
            {
                Ok(_) => report.merged += 1,
                Err(e) => {
                    warn!(
                        product_id = %line.product_id,
                        quantity = line.quantity,
                        error = %e,
                        "Failed to merge cart line"
                    );
                    report.failures.push(MergeFailure {
                        product_id: line.product_id.clone(),
                        variant: line.selected_variant.clone(),
                        quantity: line.quantity,
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.write(|c| {
            c.take_local();
        });
        self.commit(CartMode::Anonymous).await;

        if report.is_partial() {
            warn!(
                merged = report.merged,
                failed = report.failures.len(),
                "Partial merge failure, unmerged lines were dropped"
            );
            self.emit(CartEvent::PartialMergeFailure {
                merged: report.merged,
                failed: report.failures.len(),
            });
        } else {
            info!(merged = report.merged, "Anonymous cart merged");
        }

        self.sync().await;
        report
    }

    /// React to the session becoming active.
    ///
    /// Merges the anonymous cart, or just syncs when there is nothing to
    /// merge so the mirror is populated either way.
    pub async fn handle_login(&self) -> MergeReport {
        let report = self.merge_on_login().await;
        if report.attempted() == 0 {
            self.sync().await;
        }
        report
    }

    /// React to the session ending: discard the authenticated mirror.
    pub async fn handle_logout(&self) {
        self.write(CartCollections::clear_remote);
        self.persist().await;
        self.emit(CartEvent::RemoteDiscarded);
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn read<R>(&self, f: impl FnOnce(&CartCollections) -> R) -> R {
        let guard = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write<R>(&self, f: impl FnOnce(&mut CartCollections) -> R) -> R {
        let mut guard = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Whether the session still selects `mode`; rollbacks only apply if so.
    fn still_in(&self, mode: CartMode) -> bool {
        let same = self.mode() == mode;
        if !same {
            debug!("Session changed during mutation, skipping rollback");
        }
        same
    }

    fn set_quantity(&self, mode: CartMode, line_id: &LineId, quantity: u32) {
        self.write(|c| {
            if let Some(line) = c
                .active_mut(mode)
                .iter_mut()
                .find(|line| &line.line_id == line_id)
            {
                line.quantity = quantity;
            }
        });
    }

    fn set_variant(&self, mode: CartMode, line_id: &LineId, variant: Option<String>) {
        self.write(|c| {
            let lines = c.active_mut(mode);
            let key = lines
                .iter()
                .find(|line| &line.line_id == line_id)
                .map(|line| LineKey::new(line.product_id.clone(), variant.clone()));
            let Some(key) = key else { return };
            if lines
                .iter()
                .any(|line| &line.line_id != line_id && key.matches(line))
            {
                return;
            }
            if let Some(line) = lines.iter_mut().find(|line| &line.line_id == line_id) {
                line.selected_variant = variant;
            }
        });
    }

    /// Persist and announce a change to `mode`'s collection.
    async fn commit(&self, mode: CartMode) {
        self.persist().await;
        self.emit(CartEvent::Changed { mode });
    }

    async fn persist(&self) {
        // Snapshot under the save lock so saves land in order.
        let _guard = self.inner.save_lock.lock().await;
        let snapshot = self.collections();
        if let Err(e) = self.inner.store.save(&snapshot).await {
            error!(error = %e, "Failed to persist cart");
        }
    }

    fn emit(&self, event: CartEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    fn fail(&self, operation: Mutation, line_id: Option<&LineId>, source: ApiError) -> CartError {
        warn!(
            operation = %operation,
            line_id = ?line_id.map(LineId::as_str),
            error = %source,
            "Cart mutation failed, change reverted"
        );
        self.emit(CartEvent::MutationFailed {
            operation,
            line_id: line_id.cloned(),
            reason: source.to_string(),
        });
        CartError::MutationFailed {
            operation,
            line_id: line_id.cloned(),
            source,
        }
    }
}

/// Reject backend lines without a usable server-issued ID.
fn require_server_line(line: CartLine) -> std::result::Result<CartLine, ApiError> {
    if line.line_id.as_str().is_empty() || line.line_id.is_local() {
        return Err(ApiError::Malformed(format!(
            "backend returned line without a server id ('{}')",
            line.line_id
        )));
    }
    if line.quantity == 0 {
        return Err(ApiError::Malformed(format!(
            "backend returned line '{}' with zero quantity",
            line.line_id
        )));
    }
    Ok(line)
}

/// Insert `line`, replacing any line with the same ID or identity key.
fn upsert(lines: &mut Vec<CartLine>, line: CartLine) {
    let key = line.key();
    match lines
        .iter_mut()
        .find(|existing| existing.line_id == line.line_id || key.matches(existing))
    {
        Some(existing) => *existing = line,
        None => lines.push(line),
    }
}

/// Put a removed line back at its old position unless it was re-added meanwhile.
fn reinsert(lines: &mut Vec<CartLine>, index: usize, line: CartLine) {
    let key = line.key();
    if lines
        .iter()
        .any(|existing| existing.line_id == line.line_id || key.matches(existing))
    {
        return;
    }
    let at = index.min(lines.len());
    lines.insert(at, line);
}

/// Fold backend lines sharing an identity key into the first of them.
fn coalesce(lines: Vec<CartLine>) -> Vec<CartLine> {
    let mut out: Vec<CartLine> = Vec::with_capacity(lines.len());
    for line in lines {
        let key = line.key();
        if let Some(existing) = out.iter_mut().find(|existing| key.matches(existing)) {
            warn!(
                line_id = %line.line_id,
                kept = %existing.line_id,
                "Backend returned duplicate cart line, folding quantities"
            );
            existing.quantity = existing.quantity.saturating_add(line.quantity);
        } else {
            out.push(line);
        }
    }
    out
}
