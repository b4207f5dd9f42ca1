//! Dashboard orchestrator.
//!
//! [`Dashboard`] owns the authoritative, ordered list of the user's
//! widgets and a per-widget data cache. It refreshes the list, fetches
//! widget data, refetches stale data when the list changes, and applies
//! reorders optimistically, resynchronizing from the backend when the
//! backend rejects the new order.
//!
//! State lives behind a [`RwLock`] that is never held across a backend
//! call. Readers get cloned snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use futures::future::join_all;
use tokio::sync::RwLock;
use widgetdash_core::error::CoreError;
use widgetdash_core::models::{AttachWidget, UserWidget, WidgetDefinition, WidgetPosition};
use widgetdash_core::staleness::{default_stale_after, is_stale};
use widgetdash_core::types::{DbId, Timestamp};

use crate::api::GatewayError;
use crate::backend::DashboardBackend;

/// Cached state of one widget's data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WidgetDataEntry {
    /// Last successfully fetched payload.
    pub data: Option<serde_json::Value>,
    /// A fetch for this widget is in flight.
    pub loading: bool,
    /// Error from the most recent fetch, if it failed.
    pub error: Option<String>,
    /// When `data` was fetched.
    pub last_updated: Option<Timestamp>,
}

/// Result of a [`Dashboard::fetch_widget_data`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// New data was stored.
    Updated,
    /// The fetch failed; previous data was kept.
    Failed,
    /// Another fetch for the same widget was already in flight.
    Skipped,
}

/// Errors from dashboard operations that can fail before reaching the
/// backend.
#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

#[derive(Default)]
struct DashboardState {
    widgets: Vec<UserWidget>,
    data: HashMap<DbId, WidgetDataEntry>,
    /// A widget-list fetch is in flight.
    loading: bool,
    error: Option<String>,
}

/// Owns the user's widget list and the per-widget data cache.
///
/// Shared as `Arc<Dashboard>` between the front end and every
/// [`WidgetInstance`](crate::instance::WidgetInstance). All mutation goes
/// through its methods; readers get cloned snapshots.
pub struct Dashboard {
    backend: Arc<dyn DashboardBackend>,
    state: RwLock<DashboardState>,
    stale_after: TimeDelta,
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("stale_after", &self.stale_after)
            .finish_non_exhaustive()
    }
}

impl Dashboard {
    /// Create an empty dashboard. Call [`refresh_widget_list`] to load it.
    ///
    /// [`refresh_widget_list`]: Self::refresh_widget_list
    pub fn new(backend: Arc<dyn DashboardBackend>) -> Self {
        Self {
            backend,
            state: RwLock::new(DashboardState::default()),
            stale_after: default_stale_after(),
        }
    }

    /// Override the age after which cached data is refetched.
    pub fn with_stale_after(mut self, stale_after: TimeDelta) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn backend(&self) -> &Arc<dyn DashboardBackend> {
        &self.backend
    }

    // ---- snapshots ----

    /// All widgets in display order.
    pub async fn widgets(&self) -> Vec<UserWidget> {
        self.state.read().await.widgets.clone()
    }

    /// Visible widgets in display order.
    pub async fn visible_widgets(&self) -> Vec<UserWidget> {
        self.state
            .read()
            .await
            .widgets
            .iter()
            .filter(|w| w.is_visible)
            .cloned()
            .collect()
    }

    pub async fn widget(&self, widget_id: DbId) -> Option<UserWidget> {
        self.state
            .read()
            .await
            .widgets
            .iter()
            .find(|w| w.id() == widget_id)
            .cloned()
    }

    pub async fn entry(&self, widget_id: DbId) -> Option<WidgetDataEntry> {
        self.state.read().await.data.get(&widget_id).cloned()
    }

    /// `true` while the widget list is being fetched.
    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    /// Dashboard-level error from the last list fetch.
    pub async fn error(&self) -> Option<String> {
        self.state.read().await.error.clone()
    }

    // ---- widget list ----

    /// Replace the widget list with the backend's.
    ///
    /// On failure the previous list is kept and the dashboard error is
    /// set. A successful replacement runs the staleness pass.
    pub async fn refresh_widget_list(&self) -> Result<(), GatewayError> {
        self.load_widget_list().await?;
        self.run_staleness_pass().await;
        Ok(())
    }

    /// Replace the widget list without fetching any widget data.
    ///
    /// For callers that fetch the data they need themselves.
    pub async fn load_widget_list(&self) -> Result<(), GatewayError> {
        {
            let mut state = self.state.write().await;
            state.loading = true;
            state.error = None;
        }

        let result = self.backend.list_user_widgets().await;

        let mut state = self.state.write().await;
        state.loading = false;
        match result {
            Ok(mut widgets) => {
                widgets.sort_by_key(|w| w.position);
                tracing::debug!(count = widgets.len(), "Widget list refreshed");
                state.widgets = widgets;
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load widget list");
                state.error = Some(list_error_message(&e));
                Err(e)
            }
        }
    }

    /// Apply a new display order immediately, then persist it.
    ///
    /// The local order is not reverted when the backend rejects it; the
    /// list is refetched instead and the submission error is returned.
    pub async fn reorder(&self, new_sequence: Vec<UserWidget>) -> Result<(), GatewayError> {
        let positions: Vec<WidgetPosition> = new_sequence
            .iter()
            .enumerate()
            .map(|(index, w)| WidgetPosition {
                widget_id: w.id(),
                position: index as i32,
            })
            .collect();

        {
            let mut state = self.state.write().await;
            state.widgets = new_sequence
                .into_iter()
                .enumerate()
                .map(|(index, mut w)| {
                    w.position = index as i32;
                    w
                })
                .collect();
        }

        let (submitted, _) = tokio::join!(
            self.backend.update_positions(&positions),
            self.run_staleness_pass()
        );

        if let Err(e) = submitted {
            tracing::warn!(error = %e, "Failed to save widget order");
            // After a 401 there is no session left to resynchronize with.
            if !e.is_unauthorized() {
                if let Err(refresh_err) = self.refresh_widget_list().await {
                    tracing::error!(error = %refresh_err, "Resync after failed reorder failed");
                }
            }
            return Err(e);
        }

        tracing::debug!(count = positions.len(), "Widget order saved");
        Ok(())
    }

    /// Reorder by id: `ids` first in the given order, then every other
    /// widget in its current order.
    pub async fn reorder_ids(&self, ids: &[DbId]) -> Result<(), DashboardError> {
        let current = self.widgets().await;

        let mut sequence = Vec::with_capacity(current.len());
        for id in ids {
            if sequence.iter().any(|w: &UserWidget| w.id() == *id) {
                return Err(CoreError::Validation(format!("Widget {id} listed twice")).into());
            }
            let widget = current
                .iter()
                .find(|w| w.id() == *id)
                .ok_or(CoreError::NotFound {
                    entity: "widget",
                    id: *id,
                })?;
            sequence.push(widget.clone());
        }
        sequence.extend(current.into_iter().filter(|w| !ids.contains(&w.id())));

        Ok(self.reorder(sequence).await?)
    }

    /// Attach a catalog widget and reload the list.
    pub async fn attach_widget(
        &self,
        definition_id: DbId,
        input: &AttachWidget,
    ) -> Result<(), GatewayError> {
        self.backend.attach_widget(definition_id, input).await?;
        self.refresh_widget_list().await
    }

    /// The catalog of widgets the user can attach.
    pub async fn available_widgets(&self) -> Result<Vec<WidgetDefinition>, GatewayError> {
        self.backend.list_catalog().await.inspect_err(|e| {
            tracing::error!(error = %e, "Failed to load widget catalog");
        })
    }

    /// Forget a removed widget and resynchronize everything.
    ///
    /// Drops `widget_id` from the list, discards the whole data cache and
    /// reloads the list, which refetches data for every visible widget.
    /// Entries with a fetch in flight are kept so the in-flight guard
    /// still holds for them.
    pub async fn resync_after_removal(&self, widget_id: DbId) -> Result<(), GatewayError> {
        {
            let mut state = self.state.write().await;
            state.widgets.retain(|w| w.id() != widget_id);
            state
                .data
                .retain(|id, entry| entry.loading && *id != widget_id);
        }
        tracing::info!(widget_id, "Widget removed, resynchronizing dashboard");
        self.refresh_widget_list().await
    }

    /// Apply `update` to the local copy of a widget.
    ///
    /// Returns `false` if the widget is not in the list.
    pub(crate) async fn update_local_widget(
        &self,
        widget_id: DbId,
        update: impl FnOnce(&mut UserWidget),
    ) -> bool {
        let mut state = self.state.write().await;
        match state.widgets.iter_mut().find(|w| w.id() == widget_id) {
            Some(widget) => {
                update(widget);
                true
            }
            None => false,
        }
    }

    // ---- widget data ----

    /// Fetch fresh data for one widget.
    ///
    /// At most one fetch per widget is in flight; a request that arrives
    /// while one is running is dropped. On failure the previous payload
    /// and timestamp are kept and only the error is recorded.
    pub async fn fetch_widget_data(&self, widget_id: DbId) -> FetchOutcome {
        {
            let mut state = self.state.write().await;
            let entry = state.data.entry(widget_id).or_default();
            if entry.loading {
                tracing::debug!(widget_id, "Fetch already in flight, skipping");
                return FetchOutcome::Skipped;
            }
            entry.loading = true;
            entry.error = None;
        }

        let result = self.backend.widget_data(widget_id).await;

        let mut state = self.state.write().await;
        let entry = state.data.entry(widget_id).or_default();
        entry.loading = false;

        match result {
            Ok(data) => {
                entry.data = Some(data);
                entry.error = None;
                entry.last_updated = Some(Utc::now());
                FetchOutcome::Updated
            }
            Err(e) => {
                tracing::warn!(widget_id, error = %e, "Failed to fetch widget data");
                entry.error = Some(data_error_message(&e));
                FetchOutcome::Failed
            }
        }
    }

    /// Refetch data for every visible widget that is stale.
    ///
    /// Runs after each change to the widget list. Does nothing while the
    /// list itself is loading. Returns the number of fetches issued.
    pub async fn run_staleness_pass(&self) -> usize {
        let due: Vec<DbId> = {
            let state = self.state.read().await;
            if state.loading {
                return 0;
            }
            let now = Utc::now();
            state
                .widgets
                .iter()
                .filter(|w| w.is_visible)
                .filter(|w| match state.data.get(&w.id()) {
                    None => true,
                    Some(entry) => {
                        !entry.loading && is_stale(entry.last_updated, now, self.stale_after)
                    }
                })
                .map(UserWidget::id)
                .collect()
        };

        if due.is_empty() {
            return 0;
        }

        tracing::debug!(count = due.len(), "Refreshing stale widgets");
        join_all(due.iter().map(|id| self.fetch_widget_data(*id))).await;
        due.len()
    }
}

fn list_error_message(err: &GatewayError) -> String {
    match err {
        GatewayError::Rejected(None) => "Failed to load widgets".to_string(),
        other => other.user_message("Error loading dashboard"),
    }
}

fn data_error_message(err: &GatewayError) -> String {
    match err {
        GatewayError::Rejected(None) => "Failed to load widget data".to_string(),
        other => other.user_message("Error loading widget data"),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Notify;
    use widgetdash_core::models::{UpdateUserWidget, WidgetDefinition};

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Call {
        ListWidgets,
        Catalog,
        WidgetData(DbId),
        Attach(DbId),
        Update(DbId, serde_json::Value),
        Remove(DbId),
        Positions(Vec<WidgetPosition>),
    }

    /// Scripted in-memory backend that records every call.
    #[derive(Default)]
    pub(crate) struct FakeBackend {
        pub widgets: Mutex<Vec<UserWidget>>,
        pub fail_list: AtomicBool,
        pub fail_positions: AtomicBool,
        pub fail_update: AtomicBool,
        pub unauthorized_positions: AtomicBool,
        /// Queued responses per widget; defaults to `{"widget": id}`.
        pub data: Mutex<HashMap<DbId, VecDeque<Result<serde_json::Value, String>>>>,
        pub calls: Mutex<Vec<Call>>,
        /// When set, `update_positions` and `widget_data` wait for a release.
        pub gated: AtomicBool,
        pub entered: Notify,
        pub release: Notify,
    }

    impl FakeBackend {
        pub fn with_widgets(widgets: Vec<UserWidget>) -> Arc<Self> {
            let backend = Self::default();
            *backend.widgets.lock().unwrap() = widgets;
            Arc::new(backend)
        }

        pub fn script_data(&self, widget_id: DbId, response: Result<serde_json::Value, String>) {
            self.data
                .lock()
                .unwrap()
                .entry(widget_id)
                .or_default()
                .push_back(response);
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count(&self, matcher: impl Fn(&Call) -> bool) -> usize {
            self.calls().iter().filter(|c| matcher(c)).count()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }

        async fn gate(&self) {
            if self.gated.load(Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
        }
    }

    #[async_trait]
    impl DashboardBackend for FakeBackend {
        async fn list_user_widgets(&self) -> Result<Vec<UserWidget>, GatewayError> {
            self.record(Call::ListWidgets);
            if self.fail_list.load(Ordering::SeqCst) {
                return Err(GatewayError::Api {
                    status: 500,
                    message: None,
                });
            }
            Ok(self.widgets.lock().unwrap().clone())
        }

        async fn list_catalog(&self) -> Result<Vec<WidgetDefinition>, GatewayError> {
            self.record(Call::Catalog);
            Ok(self
                .widgets
                .lock()
                .unwrap()
                .iter()
                .map(|w| w.definition.clone())
                .collect())
        }

        async fn widget_data(&self, widget_id: DbId) -> Result<serde_json::Value, GatewayError> {
            self.record(Call::WidgetData(widget_id));
            self.gate().await;
            let scripted = self
                .data
                .lock()
                .unwrap()
                .get_mut(&widget_id)
                .and_then(VecDeque::pop_front);
            match scripted {
                Some(Ok(value)) => Ok(value),
                Some(Err(message)) => Err(GatewayError::Rejected(Some(message))),
                None => Ok(json!({ "widget": widget_id })),
            }
        }

        async fn attach_widget(
            &self,
            widget_id: DbId,
            _input: &AttachWidget,
        ) -> Result<(), GatewayError> {
            self.record(Call::Attach(widget_id));
            let mut widgets = self.widgets.lock().unwrap();
            let position = widgets.len() as i32;
            widgets.push(user_widget(widget_id, position, true));
            Ok(())
        }

        async fn update_user_widget(
            &self,
            widget_id: DbId,
            input: &UpdateUserWidget,
        ) -> Result<(), GatewayError> {
            self.record(Call::Update(widget_id, serde_json::to_value(input).unwrap()));
            if self.fail_update.load(Ordering::SeqCst) {
                return Err(GatewayError::Api {
                    status: 422,
                    message: Some("Invalid settings".into()),
                });
            }
            Ok(())
        }

        async fn remove_user_widget(&self, widget_id: DbId) -> Result<(), GatewayError> {
            self.record(Call::Remove(widget_id));
            self.widgets.lock().unwrap().retain(|w| w.id() != widget_id);
            Ok(())
        }

        async fn update_positions(
            &self,
            positions: &[WidgetPosition],
        ) -> Result<(), GatewayError> {
            self.record(Call::Positions(positions.to_vec()));
            self.gate().await;
            if self.unauthorized_positions.load(Ordering::SeqCst) {
                return Err(GatewayError::Unauthorized("expired".into()));
            }
            if self.fail_positions.load(Ordering::SeqCst) {
                return Err(GatewayError::Api {
                    status: 500,
                    message: Some("Could not save order".into()),
                });
            }
            Ok(())
        }
    }

    pub(crate) fn user_widget(id: DbId, position: i32, is_visible: bool) -> UserWidget {
        serde_json::from_value(json!({
            "id": id,
            "name": format!("Widget {id}"),
            "slug": format!("widget-{id}"),
            "api_source": "disease",
            "endpoint": "global",
            "settings": {},
            "position": position,
            "is_visible": is_visible
        }))
        .unwrap()
    }

    fn ids(widgets: &[UserWidget]) -> Vec<DbId> {
        widgets.iter().map(UserWidget::id).collect()
    }

    async fn seed_entry(dashboard: &Dashboard, widget_id: DbId, entry: WidgetDataEntry) {
        dashboard.state.write().await.data.insert(widget_id, entry);
    }

    fn aged(minutes: i64) -> WidgetDataEntry {
        WidgetDataEntry {
            data: Some(json!({"cases": 1})),
            loading: false,
            error: None,
            last_updated: Some(Utc::now() - TimeDelta::minutes(minutes)),
        }
    }

    // -----------------------------------------------------------------------
    // refresh_widget_list
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn refresh_replaces_list_sorted_by_position() {
        let backend = FakeBackend::with_widgets(vec![
            user_widget(2, 5, true),
            user_widget(1, 0, true),
            user_widget(3, 9, false),
        ]);
        let dashboard = Dashboard::new(backend.clone());

        dashboard.refresh_widget_list().await.unwrap();

        assert_eq!(ids(&dashboard.widgets().await), vec![1, 2, 3]);
        assert_eq!(ids(&dashboard.visible_widgets().await), vec![1, 2]);
        assert!(!dashboard.is_loading().await);
        assert_eq!(dashboard.error().await, None);
    }

    #[tokio::test]
    async fn refresh_fetches_data_for_visible_widgets_only() {
        let backend = FakeBackend::with_widgets(vec![user_widget(1, 0, true), user_widget(2, 1, false)]);
        let dashboard = Dashboard::new(backend.clone());

        dashboard.refresh_widget_list().await.unwrap();

        assert_eq!(backend.count(|c| *c == Call::WidgetData(1)), 1);
        assert_eq!(backend.count(|c| *c == Call::WidgetData(2)), 0);
        assert!(dashboard.entry(1).await.unwrap().data.is_some());
        assert!(dashboard.entry(2).await.is_none());
    }

    #[tokio::test]
    async fn refresh_failure_keeps_previous_list() {
        let backend = FakeBackend::with_widgets(vec![user_widget(1, 0, true)]);
        let dashboard = Dashboard::new(backend.clone());
        dashboard.refresh_widget_list().await.unwrap();

        backend.fail_list.store(true, Ordering::SeqCst);
        let result = dashboard.refresh_widget_list().await;

        assert_matches!(result, Err(GatewayError::Api { status: 500, .. }));
        assert_eq!(ids(&dashboard.widgets().await), vec![1]);
        assert_eq!(dashboard.error().await.as_deref(), Some("Error loading dashboard"));
        assert!(!dashboard.is_loading().await);
    }

    #[tokio::test]
    async fn successful_refresh_clears_previous_error() {
        let backend = FakeBackend::with_widgets(vec![user_widget(1, 0, true)]);
        let dashboard = Dashboard::new(backend.clone());

        backend.fail_list.store(true, Ordering::SeqCst);
        let _ = dashboard.refresh_widget_list().await;
        assert!(dashboard.error().await.is_some());

        backend.fail_list.store(false, Ordering::SeqCst);
        dashboard.refresh_widget_list().await.unwrap();
        assert_eq!(dashboard.error().await, None);
    }

    // -----------------------------------------------------------------------
    // fetch_widget_data
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn successful_fetch_stamps_time_and_clears_error() {
        let backend = FakeBackend::with_widgets(vec![]);
        let dashboard = Dashboard::new(backend.clone());
        seed_entry(
            &dashboard,
            7,
            WidgetDataEntry {
                error: Some("old failure".into()),
                ..Default::default()
            },
        )
        .await;

        let before = Utc::now();
        let outcome = dashboard.fetch_widget_data(7).await;

        assert_eq!(outcome, FetchOutcome::Updated);
        let entry = dashboard.entry(7).await.unwrap();
        assert_eq!(entry.error, None);
        assert!(!entry.loading);
        assert!(entry.last_updated.unwrap() >= before);
        assert_eq!(entry.data, Some(json!({"widget": 7})));
    }

    #[tokio::test]
    async fn failed_fetch_keeps_last_good_payload() {
        let backend = FakeBackend::with_widgets(vec![]);
        backend.script_data(42, Ok(json!({"cases": 100})));
        backend.script_data(42, Err("Upstream unavailable".into()));
        let dashboard = Dashboard::new(backend.clone());

        assert_eq!(dashboard.fetch_widget_data(42).await, FetchOutcome::Updated);
        let first_success = dashboard.entry(42).await.unwrap().last_updated;

        assert_eq!(dashboard.fetch_widget_data(42).await, FetchOutcome::Failed);
        let entry = dashboard.entry(42).await.unwrap();

        assert_eq!(
            entry,
            WidgetDataEntry {
                data: Some(json!({"cases": 100})),
                loading: false,
                error: Some("Upstream unavailable".into()),
                last_updated: first_success,
            }
        );
    }

    #[tokio::test]
    async fn failed_first_fetch_records_error_without_data() {
        let backend = FakeBackend::with_widgets(vec![]);
        backend.script_data(3, Err("boom".into()));
        let dashboard = Dashboard::new(backend.clone());

        dashboard.fetch_widget_data(3).await;

        let entry = dashboard.entry(3).await.unwrap();
        assert_eq!(entry.data, None);
        assert_eq!(entry.last_updated, None);
        assert_eq!(entry.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn overlapping_fetch_for_same_widget_is_skipped() {
        let backend = FakeBackend::with_widgets(vec![]);
        backend.gated.store(true, Ordering::SeqCst);
        let dashboard = Arc::new(Dashboard::new(backend.clone()));

        let first = tokio::spawn({
            let dashboard = Arc::clone(&dashboard);
            async move { dashboard.fetch_widget_data(5).await }
        });
        backend.entered.notified().await;

        assert!(dashboard.entry(5).await.unwrap().loading);
        assert_eq!(dashboard.fetch_widget_data(5).await, FetchOutcome::Skipped);

        backend.release.notify_one();
        assert_eq!(first.await.unwrap(), FetchOutcome::Updated);
        assert_eq!(backend.count(|c| *c == Call::WidgetData(5)), 1);
    }

    // -----------------------------------------------------------------------
    // reorder
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn reorder_is_applied_before_the_backend_answers() {
        let a = user_widget(1, 0, true);
        let b = user_widget(2, 1, true);
        let backend = FakeBackend::with_widgets(vec![a.clone(), b.clone()]);
        let dashboard = Arc::new(Dashboard::new(backend.clone()));
        dashboard.refresh_widget_list().await.unwrap();
        backend.gated.store(true, Ordering::SeqCst);

        let task = tokio::spawn({
            let dashboard = Arc::clone(&dashboard);
            let sequence = vec![b.clone(), a.clone()];
            async move { dashboard.reorder(sequence).await }
        });
        backend.entered.notified().await;

        let widgets = dashboard.widgets().await;
        assert_eq!(ids(&widgets), vec![2, 1]);
        assert_eq!(widgets[0].position, 0);
        assert_eq!(widgets[1].position, 1);

        backend.release.notify_one();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn reorder_sends_index_positions() {
        let a = user_widget(1, 0, true);
        let b = user_widget(2, 1, true);
        let backend = FakeBackend::with_widgets(vec![a.clone(), b.clone()]);
        let dashboard = Dashboard::new(backend.clone());
        dashboard.refresh_widget_list().await.unwrap();

        dashboard.reorder(vec![b, a]).await.unwrap();

        assert_eq!(
            backend.count(|c| *c
                == Call::Positions(vec![
                    WidgetPosition { widget_id: 2, position: 0 },
                    WidgetPosition { widget_id: 1, position: 1 },
                ])),
            1
        );
        assert_eq!(backend.count(|c| *c == Call::ListWidgets), 1);
    }

    #[tokio::test]
    async fn failed_reorder_resyncs_from_backend() {
        let a = user_widget(1, 0, true);
        let b = user_widget(2, 1, true);
        let backend = FakeBackend::with_widgets(vec![a.clone(), b.clone()]);
        let dashboard = Dashboard::new(backend.clone());
        dashboard.refresh_widget_list().await.unwrap();
        backend.fail_positions.store(true, Ordering::SeqCst);

        let result = dashboard.reorder(vec![b, a]).await;

        assert_matches!(result, Err(GatewayError::Api { status: 500, .. }));
        assert_eq!(backend.count(|c| *c == Call::ListWidgets), 2);
        // The backend's order wins after the resync.
        assert_eq!(ids(&dashboard.widgets().await), vec![1, 2]);
    }

    #[tokio::test]
    async fn unauthorized_reorder_does_not_resync() {
        let a = user_widget(1, 0, true);
        let b = user_widget(2, 1, true);
        let backend = FakeBackend::with_widgets(vec![a.clone(), b.clone()]);
        let dashboard = Dashboard::new(backend.clone());
        dashboard.refresh_widget_list().await.unwrap();
        backend.unauthorized_positions.store(true, Ordering::SeqCst);

        let result = dashboard.reorder(vec![b, a]).await;

        assert_matches!(result, Err(GatewayError::Unauthorized(_)));
        assert_eq!(backend.count(|c| *c == Call::ListWidgets), 1);
    }

    #[tokio::test]
    async fn reorder_ids_puts_listed_widgets_first() {
        let backend = FakeBackend::with_widgets(vec![
            user_widget(1, 0, true),
            user_widget(2, 1, true),
            user_widget(3, 2, true),
        ]);
        let dashboard = Dashboard::new(backend.clone());
        dashboard.refresh_widget_list().await.unwrap();

        dashboard.reorder_ids(&[3]).await.unwrap();

        assert_eq!(ids(&dashboard.widgets().await), vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn reorder_ids_rejects_unknown_and_duplicate_ids() {
        let backend = FakeBackend::with_widgets(vec![user_widget(1, 0, true)]);
        let dashboard = Dashboard::new(backend.clone());
        dashboard.refresh_widget_list().await.unwrap();

        assert_matches!(
            dashboard.reorder_ids(&[99]).await,
            Err(DashboardError::Core(CoreError::NotFound { id: 99, .. }))
        );
        assert_matches!(
            dashboard.reorder_ids(&[1, 1]).await,
            Err(DashboardError::Core(CoreError::Validation(_)))
        );
        assert_eq!(backend.count(|c| matches!(c, Call::Positions(_))), 0);
    }

    // -----------------------------------------------------------------------
    // staleness pass
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn stale_visible_widget_is_refetched_once_on_sequence_change() {
        let visible = user_widget(1, 0, true);
        let hidden = user_widget(2, 1, false);
        let backend = FakeBackend::with_widgets(vec![visible.clone(), hidden.clone()]);
        let dashboard = Dashboard::new(backend.clone());
        seed_entry(&dashboard, 1, aged(6)).await;
        seed_entry(&dashboard, 2, aged(6)).await;

        dashboard.refresh_widget_list().await.unwrap();

        assert_eq!(backend.count(|c| *c == Call::WidgetData(1)), 1);
        assert_eq!(backend.count(|c| *c == Call::WidgetData(2)), 0);
    }

    #[tokio::test]
    async fn fresh_widget_is_not_refetched() {
        let backend = FakeBackend::with_widgets(vec![user_widget(1, 0, true)]);
        let dashboard = Dashboard::new(backend.clone());
        seed_entry(&dashboard, 1, aged(1)).await;

        dashboard.refresh_widget_list().await.unwrap();

        assert_eq!(backend.count(|c| matches!(c, Call::WidgetData(_))), 0);
    }

    #[tokio::test]
    async fn failed_entry_without_timestamp_is_retried() {
        let backend = FakeBackend::with_widgets(vec![user_widget(1, 0, true)]);
        let dashboard = Dashboard::new(backend.clone());
        seed_entry(
            &dashboard,
            1,
            WidgetDataEntry {
                error: Some("failed".into()),
                ..Default::default()
            },
        )
        .await;

        dashboard.refresh_widget_list().await.unwrap();

        assert_eq!(backend.count(|c| *c == Call::WidgetData(1)), 1);
    }

    #[tokio::test]
    async fn staleness_pass_waits_for_list_fetch() {
        let backend = FakeBackend::with_widgets(vec![]);
        let dashboard = Dashboard::new(backend.clone());
        {
            let mut state = dashboard.state.write().await;
            state.widgets = vec![user_widget(1, 0, true)];
            state.loading = true;
        }

        assert_eq!(dashboard.run_staleness_pass().await, 0);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn custom_threshold_is_respected() {
        let backend = FakeBackend::with_widgets(vec![user_widget(1, 0, true)]);
        let dashboard = Dashboard::new(backend.clone()).with_stale_after(TimeDelta::seconds(30));
        seed_entry(&dashboard, 1, aged(1)).await;

        dashboard.refresh_widget_list().await.unwrap();

        assert_eq!(backend.count(|c| *c == Call::WidgetData(1)), 1);
    }

    // -----------------------------------------------------------------------
    // attach / removal
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn attach_reloads_list() {
        let backend = FakeBackend::with_widgets(vec![]);
        let dashboard = Dashboard::new(backend.clone());

        dashboard
            .attach_widget(4, &AttachWidget::default())
            .await
            .unwrap();

        assert_eq!(ids(&dashboard.widgets().await), vec![4]);
        assert_eq!(
            backend.calls()[..2],
            [Call::Attach(4), Call::ListWidgets]
        );
    }

    #[tokio::test]
    async fn resync_after_removal_discards_cache_and_refetches() {
        let backend = FakeBackend::with_widgets(vec![user_widget(1, 0, true), user_widget(2, 1, true)]);
        let dashboard = Dashboard::new(backend.clone());
        dashboard.refresh_widget_list().await.unwrap();
        assert_eq!(backend.count(|c| matches!(c, Call::WidgetData(_))), 2);

        backend.widgets.lock().unwrap().retain(|w| w.id() != 2);
        dashboard.resync_after_removal(2).await.unwrap();

        assert_eq!(ids(&dashboard.widgets().await), vec![1]);
        assert!(dashboard.entry(2).await.is_none());
        // Widget 1 had fresh data but the cache was discarded.
        assert_eq!(backend.count(|c| *c == Call::WidgetData(1)), 2);
    }

    #[tokio::test]
    async fn resync_after_removal_keeps_in_flight_fetch_guarded() {
        let backend = FakeBackend::with_widgets(vec![user_widget(1, 0, true), user_widget(2, 1, true)]);
        let dashboard = Arc::new(Dashboard::new(backend.clone()));
        dashboard.refresh_widget_list().await.unwrap();
        backend.gated.store(true, Ordering::SeqCst);

        let in_flight = tokio::spawn({
            let dashboard = Arc::clone(&dashboard);
            async move { dashboard.fetch_widget_data(1).await }
        });
        backend.entered.notified().await;

        backend.widgets.lock().unwrap().retain(|w| w.id() != 2);
        dashboard.resync_after_removal(2).await.unwrap();

        // Initial load plus the gated fetch; the resync must not add a third.
        assert_eq!(backend.count(|c| *c == Call::WidgetData(1)), 2);
        assert!(dashboard.entry(1).await.unwrap().loading);
        assert!(dashboard.entry(2).await.is_none());

        backend.release.notify_one();
        assert_eq!(in_flight.await.unwrap(), FetchOutcome::Updated);
        assert!(!dashboard.entry(1).await.unwrap().loading);
    }

    #[tokio::test]
    async fn load_widget_list_fetches_no_data() {
        let backend = FakeBackend::with_widgets(vec![user_widget(1, 0, true)]);
        let dashboard = Dashboard::new(backend.clone());

        dashboard.load_widget_list().await.unwrap();

        assert_eq!(ids(&dashboard.widgets().await), vec![1]);
        assert_eq!(backend.calls(), vec![Call::ListWidgets]);
        assert!(dashboard.entry(1).await.is_none());
    }

    #[tokio::test]
    async fn available_widgets_lists_catalog() {
        let backend = FakeBackend::with_widgets(vec![user_widget(1, 0, true)]);
        let dashboard = Dashboard::new(backend.clone());

        let catalog = dashboard.available_widgets().await.unwrap();

        assert_eq!(catalog.len(), 1);
        assert_eq!(backend.calls(), vec![Call::Catalog]);
    }
}
