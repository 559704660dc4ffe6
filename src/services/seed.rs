//! Demo catalog used when `SEED_DEMO_DATA=true`.

use crate::error::AppResult;
use crate::models::NewMarket;
use crate::repositories::{CatalogRepository, MarketRepository};
use tracing::info;

struct DemoMarket {
    event: usize,
    name: &'static str,
    market_type: &'static str,
    min: f64,
    max: f64,
    current: f64,
}

const DEMO_EVENTS: [&str; 2] = ["Atletico Ottawa vs York 9 FC", "Forge FC vs Cavalry FC"];

const DEMO_MARKETS: [DemoMarket; 5] = [
    DemoMarket { event: 0, name: "Atletico Ottawa Win", market_type: "1x2", min: 1.01, max: 5.0, current: 1.24 },
    DemoMarket { event: 0, name: "Draw", market_type: "1x2", min: 2.0, max: 8.0, current: 4.65 },
    DemoMarket { event: 0, name: "York 9 FC Win", market_type: "1x2", min: 5.0, max: 20.0, current: 11.1 },
    DemoMarket { event: 1, name: "Over 2.5 Goals", market_type: "total", min: 1.5, max: 4.0, current: 2.1 },
    DemoMarket { event: 1, name: "Under 2.5 Goals", market_type: "total", min: 1.5, max: 4.0, current: 1.8 },
];

/// Insert the demo catalog unless markets already exist.
///
/// Returns the number of markets created.
pub async fn seed_demo_data(catalog: &CatalogRepository, markets: &MarketRepository) -> AppResult<usize> {
    if markets.count().await? > 0 {
        info!("Markets already present, skipping demo seed");
        return Ok(0);
    }

    let country = catalog.create_country("Canada").await?;
    let competition = catalog.create_competition("Canadian Premier League", country.id).await?;
    let sport = catalog.create_sport("Football").await?;

    let mut event_ids = Vec::with_capacity(DEMO_EVENTS.len());
    for name in DEMO_EVENTS {
        let event = catalog.create_event(name, competition.id).await?;
        for team_name in name.split(" vs ") {
            let team = catalog.create_team(team_name, country.id, false).await?;
            catalog.add_team_to_competition(competition.id, team.id).await?;
            catalog.add_team_to_event(event.id, team.id).await?;
            catalog.add_team_to_sport(sport.id, team.id).await?;
        }
        event_ids.push(event.id);
    }

    for demo in &DEMO_MARKETS {
        markets
            .create(&NewMarket {
                name: demo.name.to_string(),
                market_type: demo.market_type.to_string(),
                event_id: event_ids[demo.event],
                coefficient: demo.current,
                min_coefficient: demo.min,
                max_coefficient: demo.max,
            })
            .await?;
    }

    info!("Seeded {} demo markets", DEMO_MARKETS.len());
    Ok(DEMO_MARKETS.len())
}
