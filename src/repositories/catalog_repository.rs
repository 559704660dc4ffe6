//! Repository for sports catalog reference data

use crate::error::RepositoryError;
use crate::models::{Competition, Country, Event, Sport, Team};
use sqlx::PgPool;

pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Countries & competitions
    // =========================================================================

    pub async fn create_country(&self, name: &str) -> Result<Country, RepositoryError> {
        let country = sqlx::query_as::<_, Country>(
            r#"
            INSERT INTO countries (name)
            VALUES ($1)
            RETURNING id, name, created_at
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(country)
    }

    pub async fn find_country(&self, id: i64) -> Result<Option<Country>, RepositoryError> {
        let country = sqlx::query_as::<_, Country>(
            "SELECT id, name, created_at FROM countries WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(country)
    }

    pub async fn create_competition(
        &self,
        name: &str,
        country_id: i64,
    ) -> Result<Competition, RepositoryError> {
        let competition = sqlx::query_as::<_, Competition>(
            r#"
            INSERT INTO competitions (name, country_id)
            VALUES ($1, $2)
            RETURNING id, name, country_id, created_at
            "#,
        )
        .bind(name)
        .bind(country_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(competition)
    }

    /// Competitions held in a country
    pub async fn competitions_by_country(
        &self,
        country_id: i64,
    ) -> Result<Vec<Competition>, RepositoryError> {
        let competitions = sqlx::query_as::<_, Competition>(
            r#"
            SELECT id, name, country_id, created_at
            FROM competitions
            WHERE country_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(country_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(competitions)
    }

    // =========================================================================
    // Sports & teams
    // =========================================================================

    pub async fn create_sport(&self, name: &str) -> Result<Sport, RepositoryError> {
        let sport = sqlx::query_as::<_, Sport>(
            r#"
            INSERT INTO sports (name)
            VALUES ($1)
            RETURNING id, name, created_at
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(sport)
    }

    pub async fn create_team(
        &self,
        name: &str,
        country_id: i64,
        rating: bool,
    ) -> Result<Team, RepositoryError> {
        let team = sqlx::query_as::<_, Team>(
            r#"
            INSERT INTO teams (name, rating, country_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, rating, country_id, created_at
            "#,
        )
        .bind(name)
        .bind(rating)
        .bind(country_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(team)
    }

    pub async fn add_team_to_competition(
        &self,
        competition_id: i64,
        team_id: i64,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO competition_teams (competition_id, team_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(competition_id)
        .bind(team_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn add_team_to_event(&self, event_id: i64, team_id: i64) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO event_teams (event_id, team_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(team_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn add_team_to_sport(&self, sport_id: i64, team_id: i64) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO sport_teams (sport_id, team_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(sport_id)
        .bind(team_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Teams playing in an event
    pub async fn teams_for_event(&self, event_id: i64) -> Result<Vec<Team>, RepositoryError> {
        let teams = sqlx::query_as::<_, Team>(
            r#"
            SELECT t.id, t.name, t.rating, t.country_id, t.created_at
            FROM teams t
            JOIN event_teams et ON et.team_id = t.id
            WHERE et.event_id = $1
            ORDER BY t.id ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(teams)
    }

    /// Teams registered in a competition
    pub async fn teams_for_competition(
        &self,
        competition_id: i64,
    ) -> Result<Vec<Team>, RepositoryError> {
        let teams = sqlx::query_as::<_, Team>(
            r#"
            SELECT t.id, t.name, t.rating, t.country_id, t.created_at
            FROM teams t
            JOIN competition_teams ct ON ct.team_id = t.id
            WHERE ct.competition_id = $1
            ORDER BY t.id ASC
            "#,
        )
        .bind(competition_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(teams)
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub async fn create_event(&self, name: &str, competition_id: i64) -> Result<Event, RepositoryError> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (name, competition_id)
            VALUES ($1, $2)
            RETURNING id, name, competition_id, created_at
            "#,
        )
        .bind(name)
        .bind(competition_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    pub async fn find_event(&self, id: i64) -> Result<Option<Event>, RepositoryError> {
        let event = sqlx::query_as::<_, Event>(
            "SELECT id, name, competition_id, created_at FROM events WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(event)
    }

    /// Events scheduled in a competition
    pub async fn events_by_competition(
        &self,
        competition_id: i64,
    ) -> Result<Vec<Event>, RepositoryError> {
        let events = sqlx::query_as::<_, Event>(
            r#"
            SELECT id, name, competition_id, created_at
            FROM events
            WHERE competition_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(competition_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}
