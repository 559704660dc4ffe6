#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDateTime;
use odds_backend::error::{CoefficientError, PublishError};
use odds_backend::models::*;
use odds_backend::repositories::*;
use odds_backend::services::{CoefficientUpdateMessage, Notifier};
use rand::Rng;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

/// Build a market row for in-memory tests
pub fn market_fixture(id: i64, event_id: i64, min: f64, max: f64, current: f64) -> Market {
    Market {
        id,
        name: format!("Market {}", id),
        market_type: "1x2".to_string(),
        event_id,
        current_coefficient: current,
        previous_coefficient: current,
        min_coefficient: min,
        max_coefficient: max,
        is_active: true,
        last_updated: now(),
        created_at: now(),
    }
}

pub fn event_fixture(id: i64) -> Event {
    Event {
        id,
        name: format!("Event {}", id),
        competition_id: 1,
        created_at: now(),
    }
}

// ============================================================================
// In-memory market store
// ============================================================================

#[derive(Default)]
struct StoreState {
    markets: HashMap<i64, Market>,
    events: HashMap<i64, Event>,
    history: Vec<CoefficientHistoryEntry>,
}

/// Market store kept in memory. One async lock covers the whole state, so
/// commits are serialized the same way row locks serialize them in Postgres.
#[derive(Default)]
pub struct InMemoryMarketStore {
    state: tokio::sync::Mutex<StoreState>,
    fail_commits: AtomicBool,
    fail_details: AtomicBool,
}

impl InMemoryMarketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding a single market (and its event)
    pub async fn with_market(market: Market) -> Arc<Self> {
        let store = Arc::new(Self::new());
        store.insert_market(market).await;
        store
    }

    pub async fn insert_market(&self, market: Market) {
        let mut state = self.state.lock().await;
        state
            .events
            .entry(market.event_id)
            .or_insert_with(|| event_fixture(market.event_id));
        state.markets.insert(market.id, market);
    }

    /// Make every commit fail as if the database went away mid-transaction
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Make detail lookups fail after commits succeed
    pub fn fail_details(&self, fail: bool) {
        self.fail_details.store(fail, Ordering::SeqCst);
    }

    pub async fn market(&self, id: i64) -> Market {
        self.state.lock().await.markets[&id].clone()
    }

    pub async fn history(&self, market_id: i64) -> Vec<CoefficientHistoryEntry> {
        self.state
            .lock()
            .await
            .history
            .iter()
            .filter(|h| h.market_id == market_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MarketStore for InMemoryMarketStore {
    async fn get_market(&self, market_id: i64) -> Result<Market, CoefficientError> {
        self.state
            .lock()
            .await
            .markets
            .get(&market_id)
            .cloned()
            .ok_or(CoefficientError::MarketNotFound(market_id))
    }

    async fn commit_update(
        &self,
        market_id: i64,
        new_value: f64,
        actor_id: i64,
    ) -> Result<CommittedUpdate, CoefficientError> {
        let mut state = self.state.lock().await;

        let current = state
            .markets
            .get(&market_id)
            .cloned()
            .ok_or(CoefficientError::MarketNotFound(market_id))?;
        current.check_bounds(new_value)?;

        // Give other tasks a chance to pile up on the lock
        tokio::task::yield_now().await;

        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(CoefficientError::Persistence("connection reset".to_string()));
        }

        let timestamp = now();
        let mut market = current.clone();
        market.previous_coefficient = current.current_coefficient;
        market.current_coefficient = new_value;
        market.last_updated = timestamp;

        let history_entry = CoefficientHistoryEntry {
            id: state.history.len() as i64 + 1,
            market_id,
            old_value: current.current_coefficient,
            new_value,
            changed_by_id: actor_id,
            timestamp,
        };

        state.markets.insert(market_id, market.clone());
        state.history.push(history_entry.clone());

        Ok(CommittedUpdate {
            old_value: current.current_coefficient,
            market,
            history_entry,
        })
    }

    async fn get_market_with_history(&self, market_id: i64) -> Result<MarketDetails, CoefficientError> {
        if self.fail_details.load(Ordering::SeqCst) {
            return Err(CoefficientError::Persistence("replica unavailable".to_string()));
        }

        let state = self.state.lock().await;
        let market = state
            .markets
            .get(&market_id)
            .cloned()
            .ok_or(CoefficientError::MarketNotFound(market_id))?;
        let event = state.events[&market.event_id].clone();
        let history = state
            .history
            .iter()
            .filter(|h| h.market_id == market_id)
            .cloned()
            .collect();

        Ok(MarketDetails {
            market,
            event,
            history,
        })
    }
}

// ============================================================================
// Notifiers
// ============================================================================

/// Records every message it is asked to deliver
#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<CoefficientUpdateMessage>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<CoefficientUpdateMessage> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &CoefficientUpdateMessage) -> Result<(), PublishError> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Always fails as if the broker answered 503
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify(&self, _message: &CoefficientUpdateMessage) -> Result<(), PublishError> {
        Err(PublishError::UnexpectedStatus(503))
    }
}

/// Never answers
pub struct HangingNotifier;

#[async_trait]
impl Notifier for HangingNotifier {
    async fn notify(&self, _message: &CoefficientUpdateMessage) -> Result<(), PublishError> {
        futures::future::pending::<()>().await;
        Ok(())
    }
}

// ============================================================================
// Fake Centrifugo broker
// ============================================================================

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Loopback HTTP server answering every request with a fixed status
pub struct FakeBroker {
    pub url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeBroker {
    pub async fn start(status: u16) -> Self {
        Self::start_with(status, "{}", Duration::ZERO).await
    }

    pub async fn start_with(status: u16, body: &'static str, delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let recorded = recorded.clone();
                tokio::spawn(respond(stream, recorded, status, body, delay));
            }
        });

        Self { url, requests }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

/// Read one request, record it, then answer after `delay`
async fn respond(
    mut stream: TcpStream,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
    status: u16,
    body: &'static str,
    delay: Duration,
) -> Option<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = find_header_end(&buf) {
            break end;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| {
            let (k, v) = line.split_once(':')?;
            Some((k.trim().to_string(), v.trim().to_string()))
        })
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let end = (header_end + content_length).min(buf.len());
    let body_json = serde_json::from_slice(&buf[header_end..end]).unwrap_or(serde_json::Value::Null);

    recorded.lock().unwrap().push(RecordedRequest {
        request_line,
        headers,
        body: body_json,
    });

    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let reason = if status == 200 { "OK" } else { "Error" };
    let response = format!(
        "HTTP/1.1 {} {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;

    Some(())
}

// ============================================================================
// Random-walk odds generator (test traffic)
// ============================================================================

#[derive(Debug, Clone)]
pub struct WalkMarket {
    pub id: i64,
    pub min: f64,
    pub max: f64,
    pub current: f64,
    pub volatility: f64,
}

/// Demo traffic source: picks a market, nudges its price by up to
/// +/- volatility, clamps to bounds and rounds down to two decimals.
pub struct OddsGenerator {
    pub markets: Vec<WalkMarket>,
}

impl OddsGenerator {
    pub fn demo() -> Self {
        Self {
            markets: vec![
                WalkMarket { id: 1, min: 1.01, max: 5.0, current: 1.24, volatility: 0.15 },
                WalkMarket { id: 2, min: 2.0, max: 8.0, current: 4.65, volatility: 0.20 },
                WalkMarket { id: 3, min: 5.0, max: 20.0, current: 11.1, volatility: 0.25 },
                WalkMarket { id: 4, min: 1.5, max: 4.0, current: 2.1, volatility: 0.18 },
                WalkMarket { id: 5, min: 1.5, max: 4.0, current: 1.8, volatility: 0.18 },
            ],
        }
    }

    /// Next proposed `(market_id, coefficient)`, or `None` when the walk
    /// landed on the current price.
    pub fn next_update<R: Rng>(&mut self, rng: &mut R) -> Option<(i64, f64)> {
        let index = rng.gen_range(0..self.markets.len());
        let market = &mut self.markets[index];

        let change = (rng.gen::<f64>() - 0.5) * 2.0 * market.volatility;
        let proposed = (market.current * (1.0 + change)).clamp(market.min, market.max);
        let rounded = (proposed * 100.0).trunc() / 100.0;

        if rounded == market.current {
            return None;
        }
        market.current = rounded;
        Some((market.id, rounded))
    }

    /// Markets as store rows
    pub fn fixtures(&self) -> Vec<Market> {
        self.markets
            .iter()
            .map(|m| market_fixture(m.id, if m.id <= 3 { 1 } else { 2 }, m.min, m.max, m.current))
            .collect()
    }
}

// ============================================================================
// Postgres fixtures
// ============================================================================

pub struct TestDatabase {
    pub pool: PgPool,
    pub user_repo: Arc<UserRepository>,
    pub market_repo: Arc<MarketRepository>,
    pub catalog_repo: Arc<CatalogRepository>,
}

impl TestDatabase {
    pub async fn from_pool(pool: PgPool) -> Self {
        Self {
            pool: pool.clone(),
            user_repo: Arc::new(UserRepository::new(pool.clone())),
            market_repo: Arc::new(MarketRepository::new(pool.clone())),
            catalog_repo: Arc::new(CatalogRepository::new(pool)),
        }
    }

    /// Country -> competition -> event chain for attaching markets
    pub async fn create_event(&self, name: &str) -> Event {
        let country = self
            .catalog_repo
            .create_country("Canada")
            .await
            .expect("Failed to create country");
        let competition = self
            .catalog_repo
            .create_competition("Canadian Premier League", country.id)
            .await
            .expect("Failed to create competition");
        self.catalog_repo
            .create_event(name, competition.id)
            .await
            .expect("Failed to create event")
    }

    pub async fn create_market(&self, event_id: i64, min: f64, max: f64, current: f64) -> Market {
        self.market_repo
            .create(&NewMarket {
                name: "Over 2.5 Goals".to_string(),
                market_type: "total".to_string(),
                event_id,
                coefficient: current,
                min_coefficient: min,
                max_coefficient: max,
            })
            .await
            .expect("Failed to create market")
    }
}

/// Assert that consecutive history entries chain: each old value is the
/// previous entry's new value.
pub fn assert_history_chain(start: f64, history: &[CoefficientHistoryEntry]) {
    let mut expected_old = start;
    for entry in history {
        assert_eq!(entry.old_value, expected_old, "history chain broken at entry {}", entry.id);
        expected_old = entry.new_value;
    }
}
