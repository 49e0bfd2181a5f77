use crate::db::with_deadline;
use crate::models::airport::{Airport, AirportRecord, AirportRequest, AirportSortKey};
use crate::utils::error::{AppError, AppResult};
use crate::utils::pagination::{PageRequest, PagedList, SortKey, SortOrder};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::time::Duration;
use validator::Validate;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const AIRPORT_COLUMNS: &str = "id, name, code, city, country, continent, city_photo_url, created_at";
const SEARCH_LIMIT: i64 = 20;

#[derive(Clone)]
pub struct AirportService {
    pool: SqlitePool,
    timeout: Duration,
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

impl AirportService {
    pub fn new(pool: SqlitePool) -> Self {
        AirportService {
            pool,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn create_airport(&self, request: AirportRequest) -> AppResult<Airport> {
        request.validate()?;
        let code = normalize_code(&request.code);

        let id = with_deadline(self.timeout, async {
            let result = sqlx::query(
                r#"
                INSERT INTO airports (name, code, city, country, continent, city_photo_url, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&request.name)
            .bind(&code)
            .bind(&request.city)
            .bind(&request.country)
            .bind(&request.continent)
            .bind(&request.city_photo_url)
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| match AppError::from(e) {
                AppError::Conflict(_) => AppError::Conflict(format!("Airport {} already exists", code)),
                other => other,
            })?;
            Ok::<_, AppError>(result.last_insert_rowid())
        })
        .await?;

        tracing::info!(airport_id = id, %code, "airport created");
        self.fetch_by_code(code).await
    }

    pub async fn get_by_code(&self, code: &str) -> AppResult<Airport> {
        self.fetch_by_code(normalize_code(code)).await
    }

    /// Replace every field of the airport identified by `code`.
    pub async fn update_airport(&self, code: &str, request: AirportRequest) -> AppResult<Airport> {
        request.validate()?;
        let current = normalize_code(code);
        let new_code = normalize_code(&request.code);

        let updated = with_deadline(self.timeout, async {
            Ok::<_, AppError>(
                sqlx::query(
                    r#"
                    UPDATE airports
                    SET name = ?, code = ?, city = ?, country = ?, continent = ?, city_photo_url = ?
                    WHERE code = ?
                    "#,
                )
                .bind(&request.name)
                .bind(&new_code)
                .bind(&request.city)
                .bind(&request.country)
                .bind(&request.continent)
                .bind(&request.city_photo_url)
                .bind(&current)
                .execute(&self.pool)
                .await?
                .rows_affected(),
            )
        })
        .await?;

        if updated == 0 {
            return Err(AppError::NotFound(format!("Airport {} not found", current)));
        }
        self.fetch_by_code(new_code).await
    }

    /// Returns false when no airport has this code. Airports still served by
    /// a flight cannot be deleted.
    pub async fn delete_airport(&self, code: &str) -> AppResult<bool> {
        let code = normalize_code(code);
        let deleted = with_deadline(self.timeout, async {
            let result = sqlx::query("DELETE FROM airports WHERE code = ?")
                .bind(&code)
                .execute(&self.pool)
                .await
                .map_err(|e| match AppError::from(e) {
                    AppError::Conflict(_) => {
                        AppError::Conflict(format!("Airport {} is still used by flights", code))
                    }
                    other => other,
                })?;
            Ok::<_, AppError>(result.rows_affected())
        })
        .await?;

        Ok(deleted > 0)
    }

    /// Case-insensitive match on name, code, city or country.
    pub async fn search(&self, text: &str) -> AppResult<Vec<Airport>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let pattern = format!("%{}%", text.to_lowercase());

        let records = with_deadline(self.timeout, async {
            Ok::<_, AppError>(
                sqlx::query_as::<_, AirportRecord>(&format!(
                    r#"
                    SELECT {} FROM airports
                    WHERE lower(name) LIKE ?1 OR lower(code) LIKE ?1
                       OR lower(city) LIKE ?1 OR lower(country) LIKE ?1
                    ORDER BY name ASC
                    LIMIT ?2
                    "#,
                    AIRPORT_COLUMNS
                ))
                .bind(&pattern)
                .bind(SEARCH_LIMIT)
                .fetch_all(&self.pool)
                .await?,
            )
        })
        .await?;

        records.into_iter().map(Airport::try_from).collect()
    }

    pub async fn list_airports(
        &self,
        page: PageRequest,
        sort: Option<AirportSortKey>,
        order: SortOrder,
        continent: Option<&str>,
    ) -> AppResult<PagedList<Airport>> {
        let continent = continent.map(str::trim).filter(|c| !c.is_empty());
        let sort = sort.unwrap_or(AirportSortKey::Name);

        let (total, records) = with_deadline(self.timeout, async {
            let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM airports");
            let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM airports", AIRPORT_COLUMNS));
            if let Some(continent) = continent {
                count.push(" WHERE lower(continent) = lower(").push_bind(continent).push(")");
                select.push(" WHERE lower(continent) = lower(").push_bind(continent).push(")");
            }
            select
                .push(format!(" ORDER BY {} {}, id ASC", sort.column(), order.sql()))
                .push(" LIMIT ")
                .push_bind(page.limit())
                .push(" OFFSET ")
                .push_bind(page.offset());

            let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
            let records = select
                .build_query_as::<AirportRecord>()
                .fetch_all(&self.pool)
                .await?;
            Ok::<_, AppError>((total, records))
        })
        .await?;

        let items = records
            .into_iter()
            .map(Airport::try_from)
            .collect::<AppResult<Vec<_>>>()?;
        Ok(PagedList::new(items, page, total))
    }

    async fn fetch_by_code(&self, code: String) -> AppResult<Airport> {
        let record = with_deadline(self.timeout, async {
            Ok::<_, AppError>(
                sqlx::query_as::<_, AirportRecord>(&format!(
                    "SELECT {} FROM airports WHERE code = ?",
                    AIRPORT_COLUMNS
                ))
                .bind(&code)
                .fetch_optional(&self.pool)
                .await?,
            )
        })
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Airport {} not found", code)))?;

        Airport::try_from(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_upper_cased() {
        assert_eq!(normalize_code(" ist "), "IST");
    }
}
