use crate::{
    alert::Alert,
    metrics::feed::{
        record_alert_counts, record_dismissals, record_refresh, record_successful_refresh,
    },
    presentation::{AlertCard, FeedView},
    source::AlertSource,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{task::JoinHandle, time::MissedTickBehavior};

/// Live alert collection backed by an [`AlertSource`].
///
/// All state is local: dismissing an alert never reaches the source.
/// Refreshes may overlap; each takes a generation number when it starts and
/// its result is applied only if nothing newer has been applied already.
pub struct AlertFeed {
    source: Box<dyn AlertSource>,
    state: RwLock<FeedState>,
    generation: AtomicU64,
    preserve_dismissed: bool,
}

#[derive(Default)]
struct FeedState {
    alerts: Vec<Alert>,
    loaded: bool,
    in_flight: usize,
    applied: u64,
    closed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Success,
    Failure,
    /// A newer result was already applied, or the feed was torn down
    Stale,
}

impl std::fmt::Display for RefreshOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshOutcome::Success => write!(f, "success"),
            RefreshOutcome::Failure => write!(f, "failure"),
            RefreshOutcome::Stale => write!(f, "stale"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dismissal {
    Dismissed,
    AlreadyDismissed,
    NotFound,
}

impl AlertFeed {
    /// Create a new AlertFeed instance
    pub fn new(source: Box<dyn AlertSource>, preserve_dismissed: bool) -> Self {
        Self {
            source,
            state: RwLock::new(FeedState::default()),
            generation: AtomicU64::new(0),
            preserve_dismissed,
        }
    }

    /// Fetch the current alerts and replace the held collection.
    ///
    /// Failures are logged and leave the collection untouched.
    #[tracing::instrument(skip(self))]
    pub async fn refresh(&self) -> RefreshOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let in_flight = InFlight::start(&self.state);
        let result = self.source.fetch_alerts().await;
        drop(in_flight);

        let alerts = match result {
            Ok(alerts) => alerts,
            Err(e) => {
                tracing::error!("Failed to refresh alerts: {}", e);
                record_refresh(RefreshOutcome::Failure);
                return RefreshOutcome::Failure;
            }
        };

        let mut state = self.state.write();

        if state.closed || generation <= state.applied {
            tracing::debug!(
                "Dropping alerts from refresh {} (applied: {}, closed: {})",
                generation,
                state.applied,
                state.closed
            );
            record_refresh(RefreshOutcome::Stale);
            return RefreshOutcome::Stale;
        }

        let mut alerts = unique_by_id(alerts);

        if self.preserve_dismissed {
            let dismissed: HashSet<&str> = state
                .alerts
                .iter()
                .filter(|alert| alert.dismissed)
                .map(|alert| alert.id.as_str())
                .collect();

            for alert in alerts.iter_mut() {
                if dismissed.contains(alert.id.as_str()) {
                    alert.dismissed = true;
                }
            }
        }

        state.alerts = alerts;
        state.applied = generation;
        state.loaded = true;

        tracing::info!("Fetched {} alerts", state.alerts.len());
        record_refresh(RefreshOutcome::Success);
        record_successful_refresh();
        record_state(&state);

        RefreshOutcome::Success
    }

    /// Dismiss a single alert. Unknown ids are ignored.
    #[tracing::instrument(skip(self))]
    pub fn dismiss(&self, alert_id: &str) -> Dismissal {
        let mut state = self.state.write();

        let outcome = match state.alerts.iter_mut().find(|alert| alert.id == alert_id) {
            None => Dismissal::NotFound,
            Some(alert) if alert.dismissed => Dismissal::AlreadyDismissed,
            Some(alert) => {
                alert.dismissed = true;
                Dismissal::Dismissed
            }
        };

        if outcome == Dismissal::Dismissed {
            tracing::info!("Alert '{}' dismissed", alert_id);
            record_dismissals(1);
            record_state(&state);
        }

        outcome
    }

    /// Dismiss every held alert, returning how many changed state
    #[tracing::instrument(skip(self))]
    pub fn dismiss_all(&self) -> usize {
        let mut state = self.state.write();
        let mut count = 0;

        for alert in state.alerts.iter_mut().filter(|alert| !alert.dismissed) {
            alert.dismissed = true;
            count += 1;
        }

        tracing::info!("Dismissed {} alerts", count);
        record_dismissals(count);
        record_state(&state);

        count
    }

    /// Alerts not dismissed, in the order the source returned them
    pub fn active_alerts(&self) -> Vec<Alert> {
        self.state
            .read()
            .alerts
            .iter()
            .filter(|alert| !alert.dismissed)
            .cloned()
            .collect()
    }

    /// Every held alert, dismissed ones included
    pub fn alerts(&self) -> Vec<Alert> {
        self.state.read().alerts.clone()
    }

    /// Action link of a held alert
    pub fn action_url(&self, alert_id: &str) -> Option<String> {
        self.state
            .read()
            .alerts
            .iter()
            .find(|alert| alert.id == alert_id)
            .and_then(|alert| alert.action_url.clone())
    }

    /// Whether a refresh is running while nothing has been loaded yet
    pub fn is_loading(&self) -> bool {
        let state = self.state.read();
        state.in_flight > 0 && !state.loaded
    }

    /// Render the feed, computing ages against `now`
    pub fn view(&self, now: DateTime<Utc>) -> FeedView {
        let state = self.state.read();

        if !state.loaded {
            return FeedView::Loading;
        }

        let cards: Vec<AlertCard> = state
            .alerts
            .iter()
            .filter(|alert| !alert.dismissed)
            .map(|alert| AlertCard::render(alert, now))
            .collect();

        let total = state.alerts.len();

        if cards.is_empty() {
            FeedView::AllClear { total }
        } else {
            FeedView::Alerts {
                total,
                active: cards.len(),
                cards,
            }
        }
    }

    /// Stop applying refresh results. In-flight fetches still finish but are dropped.
    pub fn close(&self) {
        self.state.write().closed = true;
    }

    /// Start the refresh timer: once now, then every `interval`
    pub fn mount(self: &Arc<Self>, interval: Duration) -> FeedHandle {
        tracing::info!("Starting alert feed, refreshing every {:?}", interval);

        let feed = Arc::clone(self);
        let timer = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                // Ticks do not wait on each other; the generation check sorts out overlaps
                let feed = Arc::clone(&feed);
                tokio::spawn(async move {
                    feed.refresh().await;
                });
            }
        });

        FeedHandle {
            feed: Arc::clone(self),
            timer: Some(timer),
        }
    }
}

/// Owns the refresh timer of a mounted feed. Dropping it tears the feed down.
pub struct FeedHandle {
    feed: Arc<AlertFeed>,
    timer: Option<JoinHandle<()>>,
}

impl FeedHandle {
    pub fn feed(&self) -> &Arc<AlertFeed> {
        &self.feed
    }

    /// Cancel the timer and close the feed
    pub fn shutdown(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(timer) = self.timer.take() {
            tracing::info!("Stopping alert feed");
            timer.abort();
            self.feed.close();
        }
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Tracks a running fetch, including ones whose future gets dropped
struct InFlight<'a>(&'a RwLock<FeedState>);

impl<'a> InFlight<'a> {
    fn start(state: &'a RwLock<FeedState>) -> Self {
        state.write().in_flight += 1;
        Self(state)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.write().in_flight -= 1;
    }
}

fn unique_by_id(alerts: Vec<Alert>) -> Vec<Alert> {
    let mut seen = HashSet::new();

    alerts
        .into_iter()
        .filter(|alert| {
            let first = seen.insert(alert.id.clone());
            if !first {
                tracing::warn!("Dropping duplicate alert '{}'", alert.id);
            }
            first
        })
        .collect()
}

fn record_state(state: &FeedState) {
    let dismissed = state.alerts.iter().filter(|alert| alert.dismissed).count();
    record_alert_counts(state.alerts.len() - dismissed, dismissed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        alert::{AlertKind, Priority},
        source::{AlertFetchFailure, FixtureAlertSource},
    };
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::{collections::VecDeque, sync::atomic::AtomicUsize};
    use tokio::sync::oneshot;

    fn alert(id: &str, priority: Priority) -> Alert {
        Alert {
            id: id.to_string(),
            kind: AlertKind::Info,
            title: format!("Alert {}", id),
            message: "Invoice overdue".to_string(),
            priority,
            created_at: Utc::now(),
            action_url: None,
            dismissed: false,
        }
    }

    fn three_alerts() -> Vec<Alert> {
        vec![
            alert("1", Priority::Urgent),
            alert("2", Priority::Medium),
            alert("3", Priority::Low),
        ]
    }

    fn ids(alerts: &[Alert]) -> Vec<&str> {
        alerts.iter().map(|alert| alert.id.as_str()).collect()
    }

    type Response = Result<Vec<Alert>, AlertFetchFailure>;

    /// Hands out responses in the order fetches are made; each fetch waits on its own channel
    #[derive(Default)]
    struct ScriptedSource {
        pending: parking_lot::Mutex<VecDeque<oneshot::Receiver<Response>>>,
    }

    impl ScriptedSource {
        fn expect(&self) -> oneshot::Sender<Response> {
            let (tx, rx) = oneshot::channel();
            self.pending.lock().push_back(rx);
            tx
        }
    }

    #[async_trait]
    impl AlertSource for Arc<ScriptedSource> {
        async fn fetch_alerts(&self) -> Result<Vec<Alert>, AlertFetchFailure> {
            let rx = self.pending.lock().pop_front().expect("unexpected fetch");
            rx.await.expect("response sender dropped")
        }
    }

    struct CountingSource {
        fetches: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AlertSource for CountingSource {
        async fn fetch_alerts(&self) -> Result<Vec<Alert>, AlertFetchFailure> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(three_alerts())
        }
    }

    fn fixture_feed(alerts: Vec<Alert>, preserve_dismissed: bool) -> AlertFeed {
        AlertFeed::new(Box::new(FixtureAlertSource::new(alerts)), preserve_dismissed)
    }

    #[tokio::test]
    async fn dismissing_one_alert_from_a_fresh_feed() {
        let feed = fixture_feed(three_alerts(), true);

        assert_eq!(feed.view(Utc::now()), FeedView::Loading);

        assert_eq!(feed.refresh().await, RefreshOutcome::Success);
        assert_eq!(feed.active_alerts().len(), 3);

        assert_eq!(feed.dismiss("2"), Dismissal::Dismissed);

        let active = feed.active_alerts();
        assert_eq!(ids(&active), vec!["1", "3"]);

        let all = feed.alerts();
        assert_eq!(all.len(), 3);
        assert!(all.iter().find(|alert| alert.id == "2").unwrap().dismissed);

        match feed.view(Utc::now()) {
            FeedView::Alerts { total, active, cards } => {
                assert_eq!(total, 3);
                assert_eq!(active, 2);
                assert_eq!(cards[0].age, "Just now");
            }
            view => panic!("unexpected view {:?}", view),
        }
    }

    #[tokio::test]
    async fn dismissing_unknown_id_is_a_no_op() {
        let feed = fixture_feed(three_alerts(), true);
        feed.refresh().await;
        let before = feed.alerts();

        assert_eq!(feed.dismiss("missing"), Dismissal::NotFound);
        assert_eq!(feed.alerts(), before);
    }

    #[tokio::test]
    async fn dismissing_twice_reports_already_dismissed() {
        let feed = fixture_feed(three_alerts(), true);
        feed.refresh().await;

        assert_eq!(feed.dismiss("1"), Dismissal::Dismissed);
        assert_eq!(feed.dismiss("1"), Dismissal::AlreadyDismissed);
    }

    #[tokio::test]
    async fn dismiss_all_clears_the_active_view() {
        let feed = fixture_feed(three_alerts(), true);
        feed.refresh().await;
        feed.dismiss("3");

        assert_eq!(feed.dismiss_all(), 2);
        assert!(feed.active_alerts().is_empty());
        assert_eq!(feed.alerts().len(), 3);
        assert_eq!(feed.view(Utc::now()), FeedView::AllClear { total: 3 });
    }

    #[tokio::test]
    async fn dismiss_all_on_empty_feed() {
        let feed = fixture_feed(Vec::new(), true);

        assert_eq!(feed.dismiss_all(), 0);
        assert!(feed.active_alerts().is_empty());
    }

    #[tokio::test]
    async fn empty_fetch_is_all_clear() {
        let feed = fixture_feed(Vec::new(), true);
        feed.refresh().await;

        assert_eq!(feed.view(Utc::now()), FeedView::AllClear { total: 0 });
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_alerts() {
        let source = Arc::new(ScriptedSource::default());
        let feed = AlertFeed::new(Box::new(Arc::clone(&source)), true);

        source.expect().send(Ok(three_alerts())).unwrap();
        feed.refresh().await;
        feed.dismiss("1");
        let before = feed.alerts();
        let view_before = feed.view(Utc::now());

        source
            .expect()
            .send(Err(AlertFetchFailure::Status(StatusCode::BAD_GATEWAY)))
            .unwrap();

        assert_eq!(feed.refresh().await, RefreshOutcome::Failure);
        assert_eq!(feed.alerts(), before);
        assert_eq!(feed.view(Utc::now()), view_before);
        assert!(!feed.is_loading());
    }

    #[tokio::test]
    async fn failed_first_refresh_stays_loading() {
        let source = Arc::new(ScriptedSource::default());
        let feed = AlertFeed::new(Box::new(Arc::clone(&source)), true);

        source
            .expect()
            .send(Err(AlertFetchFailure::Status(StatusCode::INTERNAL_SERVER_ERROR)))
            .unwrap();

        assert_eq!(feed.refresh().await, RefreshOutcome::Failure);
        assert_eq!(feed.view(Utc::now()), FeedView::Loading);
    }

    #[tokio::test]
    async fn loading_only_until_first_result() {
        let source = Arc::new(ScriptedSource::default());
        let feed = Arc::new(AlertFeed::new(Box::new(Arc::clone(&source)), true));

        let first = source.expect();
        let task = tokio::spawn({
            let feed = Arc::clone(&feed);
            async move { feed.refresh().await }
        });
        tokio::task::yield_now().await;
        assert!(feed.is_loading());

        first.send(Ok(three_alerts())).unwrap();
        task.await.unwrap();
        assert!(!feed.is_loading());

        let second = source.expect();
        let task = tokio::spawn({
            let feed = Arc::clone(&feed);
            async move { feed.refresh().await }
        });
        tokio::task::yield_now().await;
        assert!(!feed.is_loading());

        second.send(Ok(three_alerts())).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn stale_response_is_dropped() {
        let source = Arc::new(ScriptedSource::default());
        let feed = Arc::new(AlertFeed::new(Box::new(Arc::clone(&source)), true));

        let older = source.expect();
        let older_task = tokio::spawn({
            let feed = Arc::clone(&feed);
            async move { feed.refresh().await }
        });
        tokio::task::yield_now().await;

        let newer = source.expect();
        let newer_task = tokio::spawn({
            let feed = Arc::clone(&feed);
            async move { feed.refresh().await }
        });
        tokio::task::yield_now().await;

        newer.send(Ok(vec![alert("new", Priority::High)])).unwrap();
        assert_eq!(newer_task.await.unwrap(), RefreshOutcome::Success);

        older.send(Ok(vec![alert("old", Priority::Low)])).unwrap();
        assert_eq!(older_task.await.unwrap(), RefreshOutcome::Stale);

        assert_eq!(ids(&feed.alerts()), vec!["new"]);
    }

    #[tokio::test]
    async fn in_order_responses_both_apply() {
        let source = Arc::new(ScriptedSource::default());
        let feed = Arc::new(AlertFeed::new(Box::new(Arc::clone(&source)), true));

        let older = source.expect();
        let older_task = tokio::spawn({
            let feed = Arc::clone(&feed);
            async move { feed.refresh().await }
        });
        tokio::task::yield_now().await;

        let newer = source.expect();
        let newer_task = tokio::spawn({
            let feed = Arc::clone(&feed);
            async move { feed.refresh().await }
        });
        tokio::task::yield_now().await;

        older.send(Ok(vec![alert("old", Priority::Low)])).unwrap();
        assert_eq!(older_task.await.unwrap(), RefreshOutcome::Success);
        assert_eq!(ids(&feed.alerts()), vec!["old"]);

        newer.send(Ok(vec![alert("new", Priority::High)])).unwrap();
        assert_eq!(newer_task.await.unwrap(), RefreshOutcome::Success);
        assert_eq!(ids(&feed.alerts()), vec!["new"]);
    }

    #[tokio::test]
    async fn closed_feed_drops_in_flight_result() {
        let source = Arc::new(ScriptedSource::default());
        let feed = Arc::new(AlertFeed::new(Box::new(Arc::clone(&source)), true));

        let response = source.expect();
        let task = tokio::spawn({
            let feed = Arc::clone(&feed);
            async move { feed.refresh().await }
        });
        tokio::task::yield_now().await;

        feed.close();
        response.send(Ok(three_alerts())).unwrap();

        assert_eq!(task.await.unwrap(), RefreshOutcome::Stale);
        assert!(feed.alerts().is_empty());
        assert_eq!(feed.view(Utc::now()), FeedView::Loading);
    }

    #[tokio::test]
    async fn dismissals_survive_refresh_when_preserved() {
        let feed = fixture_feed(three_alerts(), true);
        feed.refresh().await;
        feed.dismiss("2");

        feed.refresh().await;

        assert_eq!(ids(&feed.active_alerts()), vec!["1", "3"]);
    }

    #[tokio::test]
    async fn dismissals_reset_on_refresh_when_replaced() {
        let feed = fixture_feed(three_alerts(), false);
        feed.refresh().await;
        feed.dismiss("2");

        feed.refresh().await;

        assert_eq!(ids(&feed.active_alerts()), vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn source_dismissed_flag_is_kept() {
        let mut alerts = three_alerts();
        alerts[0].dismissed = true;
        let feed = fixture_feed(alerts, false);

        feed.refresh().await;

        assert_eq!(ids(&feed.active_alerts()), vec!["2", "3"]);
    }

    #[tokio::test]
    async fn duplicate_ids_keep_first_occurrence() {
        let mut duplicate = alert("1", Priority::Low);
        duplicate.title = "Duplicate".to_string();
        let feed = fixture_feed(
            vec![alert("1", Priority::High), duplicate, alert("2", Priority::Low)],
            true,
        );

        feed.refresh().await;

        let alerts = feed.alerts();
        assert_eq!(ids(&alerts), vec!["1", "2"]);
        assert_eq!(alerts[0].priority, Priority::High);
    }

    #[tokio::test]
    async fn active_view_keeps_source_order() {
        let feed = fixture_feed(
            vec![
                alert("a", Priority::Low),
                alert("b", Priority::Urgent),
                alert("c", Priority::Medium),
            ],
            true,
        );
        feed.refresh().await;

        assert_eq!(ids(&feed.active_alerts()), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn action_url_of_held_alert() {
        let mut alerts = three_alerts();
        alerts[0].action_url = Some("https://shop.example.com/work-orders/7".to_string());
        let feed = fixture_feed(alerts, true);
        feed.refresh().await;

        assert_eq!(
            feed.action_url("1").as_deref(),
            Some("https://shop.example.com/work-orders/7")
        );
        assert_eq!(feed.action_url("2"), None);
        assert_eq!(feed.action_url("missing"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn mount_refreshes_immediately_then_on_interval() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let feed = Arc::new(AlertFeed::new(
            Box::new(CountingSource {
                fetches: Arc::clone(&fetches),
            }),
            true,
        ));

        let handle = feed.mount(Duration::from_secs(300));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        assert_eq!(handle.feed().active_alerts().len(), 3);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 2);

        handle.shutdown();

        tokio::time::sleep(Duration::from_secs(900)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_the_timer() {
        let fetches = Arc::new(AtomicUsize::new(0));
        let feed = Arc::new(AlertFeed::new(
            Box::new(CountingSource {
                fetches: Arc::clone(&fetches),
            }),
            true,
        ));

        {
            let _handle = feed.mount(Duration::from_secs(300));
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }
}
