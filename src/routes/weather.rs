/**
 * Weather Routes
 * Scheduled sync against the vendor weather API plus the public read endpoint
 */
use axum::{http::HeaderMap, response::IntoResponse, Json};
use chrono::{NaiveDate, TimeZone, Timelike, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::db::{
    self,
    models::{WeatherData, WeatherForecast},
};
use crate::error::ApiError;
use crate::routes::auth::require_auth;

static WEATHER_API_BASE: Lazy<String> = Lazy::new(|| {
    std::env::var("WEATHER_API_BASE")
        .unwrap_or_else(|_| "https://api.openweathermap.org/data/2.5".to_string())
});

static WEATHER_API_KEY: Lazy<String> =
    Lazy::new(|| std::env::var("WEATHER_API_KEY").unwrap_or_default());

static WEATHER_LOCATION: Lazy<String> =
    Lazy::new(|| std::env::var("WEATHER_LOCATION").unwrap_or_else(|_| "Pio Duran,PH".to_string()));

static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

/// Forecast rows kept per sync.
const FORECAST_DAYS: usize = 5;

// ============================================================================
// Condition mapping
// ============================================================================

/// Local condition vocabulary the site renders icons from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Condition {
    Sunny,
    PartlyCloudy,
    Cloudy,
    Rainy,
    Stormy,
}

impl Condition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sunny => "sunny",
            Self::PartlyCloudy => "partly-cloudy",
            Self::Cloudy => "cloudy",
            Self::Rainy => "rainy",
            Self::Stormy => "stormy",
        }
    }
}

/// Map a vendor condition code to the local vocabulary. Total: every code
/// lands somewhere, unknown ranges degrade to cloudy.
pub fn map_condition_code(code: u32) -> Condition {
    match code {
        200..=299 => Condition::Stormy,
        300..=399 | 500..=599 | 600..=699 => Condition::Rainy,
        700..=799 => Condition::Cloudy,
        800 => Condition::Sunny,
        801 => Condition::PartlyCloudy,
        802..=899 => Condition::Cloudy,
        _ => Condition::Cloudy,
    }
}

// ============================================================================
// Vendor response shapes (subset of fields we consume)
// ============================================================================

#[derive(Debug, Deserialize)]
struct VendorCurrent {
    weather: Vec<VendorCondition>,
    main: VendorMain,
    wind: VendorWind,
}

#[derive(Debug, Deserialize)]
struct VendorCondition {
    id: u32,
}

#[derive(Debug, Deserialize)]
struct VendorMain {
    temp: f64,
    #[serde(default)]
    temp_min: f64,
    #[serde(default)]
    temp_max: f64,
    humidity: i32,
}

#[derive(Debug, Deserialize)]
struct VendorWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct VendorForecast {
    list: Vec<VendorForecastEntry>,
}

#[derive(Debug, Deserialize)]
struct VendorForecastEntry {
    /// Unix timestamp of the 3-hour slot.
    dt: i64,
    main: VendorMain,
    weather: Vec<VendorCondition>,
}

/// One aggregated forecast day, reduced from the vendor's 3-hour slots.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub condition: Condition,
    pub temp_high: f64,
    pub temp_low: f64,
}

/// Reduce 3-hour slots to at most `FORECAST_DAYS` daily rows: per calendar
/// day, high = max of slot maxima, low = min of slot minima, condition from
/// the slot nearest midday.
pub fn aggregate_forecast(entries: &[(i64, f64, f64, u32)]) -> Vec<DailyForecast> {
    let mut days: Vec<DailyForecast> = Vec::new();
    let mut best_midday_distance: Vec<i64> = Vec::new();

    for &(dt, temp_min, temp_max, code) in entries {
        let Some(datetime) = Utc.timestamp_opt(dt, 0).single() else {
            continue;
        };
        let date = datetime.date_naive();
        let midday_distance = (datetime.num_seconds_from_midnight() as i64 - 12 * 3600).abs();

        match days.iter_mut().position(|d| d.date == date) {
            Some(i) => {
                days[i].temp_high = days[i].temp_high.max(temp_max);
                days[i].temp_low = days[i].temp_low.min(temp_min);
                if midday_distance < best_midday_distance[i] {
                    days[i].condition = map_condition_code(code);
                    best_midday_distance[i] = midday_distance;
                }
            }
            None => {
                days.push(DailyForecast {
                    date,
                    condition: map_condition_code(code),
                    temp_high: temp_max,
                    temp_low: temp_min,
                });
                best_midday_distance.push(midday_distance);
            }
        }
    }

    days.truncate(FORECAST_DAYS);
    days
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherResponse {
    pub current: Option<WeatherData>,
    pub forecast: Vec<WeatherForecast>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub success: bool,
    pub location: String,
    pub condition: String,
    pub forecast_days: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/weather - Current conditions and the active forecast
pub async fn get_weather() -> Result<Json<WeatherResponse>, ApiError> {
    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;

    let current = sqlx::query_as::<_, WeatherData>(
        r#"
        SELECT id, location, condition, temperature, humidity, wind_speed, updated_at
        FROM weather_data
        WHERE location = $1
        "#,
    )
    .bind(WEATHER_LOCATION.as_str())
    .fetch_optional(pool.as_ref())
    .await?;

    let forecast = sqlx::query_as::<_, WeatherForecast>(
        r#"
        SELECT id, location, forecast_date, condition, temp_high, temp_low, is_active, created_at
        FROM weather_forecast
        WHERE location = $1 AND is_active = true
        ORDER BY forecast_date
        "#,
    )
    .bind(WEATHER_LOCATION.as_str())
    .fetch_all(pool.as_ref())
    .await?;

    Ok(Json(WeatherResponse { current, forecast }))
}

/// POST /api/weather/sync - Pull current + 5-day forecast from the vendor and
/// replace the stored rows (auth required; invoked by the scheduler).
///
/// One shot, no retry: a vendor failure surfaces directly to the caller.
pub async fn sync_weather(headers: HeaderMap) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers)?;

    if WEATHER_API_KEY.is_empty() {
        return Err(ApiError::Validation(
            "WEATHER_API_KEY is not configured".to_string(),
        ));
    }

    let pool = db::get_pool().ok_or(ApiError::PoolUnavailable)?;
    let location = WEATHER_LOCATION.as_str();

    let current_url = format!(
        "{}/weather?q={}&appid={}&units=metric",
        WEATHER_API_BASE.as_str(),
        location,
        WEATHER_API_KEY.as_str()
    );
    let current: VendorCurrent = fetch_vendor(&current_url).await?;

    let condition = current
        .weather
        .first()
        .map(|w| map_condition_code(w.id))
        .unwrap_or(Condition::Cloudy);

    sqlx::query(
        r#"
        INSERT INTO weather_data (location, condition, temperature, humidity, wind_speed, updated_at)
        VALUES ($1, $2, $3, $4, $5, now())
        ON CONFLICT (location) DO UPDATE SET
            condition = EXCLUDED.condition,
            temperature = EXCLUDED.temperature,
            humidity = EXCLUDED.humidity,
            wind_speed = EXCLUDED.wind_speed,
            updated_at = now()
        "#,
    )
    .bind(location)
    .bind(condition.as_str())
    .bind(current.main.temp)
    .bind(current.main.humidity)
    .bind(current.wind.speed)
    .execute(pool.as_ref())
    .await?;

    let forecast_url = format!(
        "{}/forecast?q={}&appid={}&units=metric&cnt=40",
        WEATHER_API_BASE.as_str(),
        location,
        WEATHER_API_KEY.as_str()
    );
    let forecast: VendorForecast = fetch_vendor(&forecast_url).await?;

    let entries: Vec<(i64, f64, f64, u32)> = forecast
        .list
        .iter()
        .map(|e| {
            (
                e.dt,
                e.main.temp_min,
                e.main.temp_max,
                e.weather.first().map(|w| w.id).unwrap_or(803),
            )
        })
        .collect();
    let days = aggregate_forecast(&entries);

    // Prior forecast rows are retired, not deleted, before the new batch goes in.
    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE weather_forecast SET is_active = false WHERE location = $1")
        .bind(location)
        .execute(&mut *tx)
        .await?;
    for day in &days {
        let forecast_date = Utc
            .from_utc_datetime(&day.date.and_hms_opt(0, 0, 0).unwrap_or_default());
        sqlx::query(
            r#"
            INSERT INTO weather_forecast (location, forecast_date, condition, temp_high, temp_low, is_active)
            VALUES ($1, $2, $3, $4, $5, true)
            "#,
        )
        .bind(location)
        .bind(forecast_date)
        .bind(day.condition.as_str())
        .bind(day.temp_high)
        .bind(day.temp_low)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    tracing::info!(
        location = %location,
        condition = %condition.as_str(),
        days = days.len(),
        "weather sync completed"
    );

    Ok(Json(SyncResponse {
        success: true,
        location: location.to_string(),
        condition: condition.as_str().to_string(),
        forecast_days: days.len(),
    }))
}

async fn fetch_vendor<T: serde::de::DeserializeOwned>(url: &str) -> Result<T, ApiError> {
    let response = HTTP_CLIENT.get(url).send().await.map_err(|e| {
        tracing::error!(error = %e, "weather vendor request failed");
        ApiError::RemoteUnavailable(format!("Weather vendor request failed: {}", e))
    })?;

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(status = %status, "weather vendor returned error");
        return Err(ApiError::RemoteUnavailable(format!(
            "Weather vendor returned status {}",
            status
        )));
    }

    response.json::<T>().await.map_err(|e| {
        tracing::error!(error = %e, "failed to parse weather vendor response");
        ApiError::RemoteUnavailable(format!("Unreadable weather vendor response: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_mapping_known_ranges() {
        assert_eq!(map_condition_code(211), Condition::Stormy); // thunderstorm
        assert_eq!(map_condition_code(301), Condition::Rainy); // drizzle
        assert_eq!(map_condition_code(502), Condition::Rainy); // heavy rain
        assert_eq!(map_condition_code(741), Condition::Cloudy); // fog
        assert_eq!(map_condition_code(800), Condition::Sunny); // clear
        assert_eq!(map_condition_code(801), Condition::PartlyCloudy); // few clouds
        assert_eq!(map_condition_code(804), Condition::Cloudy); // overcast
    }

    #[test]
    fn test_condition_mapping_is_total() {
        for code in 0..2000 {
            let _ = map_condition_code(code); // must not panic for any input
        }
    }

    #[test]
    fn test_condition_serialization_is_kebab_case() {
        let s = serde_json::to_string(&Condition::PartlyCloudy).unwrap();
        assert_eq!(s, "\"partly-cloudy\"");
        assert_eq!(Condition::PartlyCloudy.as_str(), "partly-cloudy");
    }

    fn slot(day: i64, hour: i64, min: f64, max: f64, code: u32) -> (i64, f64, f64, u32) {
        // 2024-01-01 00:00 UTC = 1704067200
        (1704067200 + day * 86400 + hour * 3600, min, max, code)
    }

    #[test]
    fn test_aggregate_collapses_slots_per_day() {
        let entries = vec![
            slot(0, 6, 22.0, 25.0, 800),
            slot(0, 12, 24.0, 31.0, 500),
            slot(0, 18, 23.0, 28.0, 800),
            slot(1, 12, 21.0, 29.0, 211),
        ];
        let days = aggregate_forecast(&entries);
        assert_eq!(days.len(), 2);

        assert_eq!(days[0].temp_high, 31.0);
        assert_eq!(days[0].temp_low, 22.0);
        // Midday slot wins the condition
        assert_eq!(days[0].condition, Condition::Rainy);
        assert_eq!(days[1].condition, Condition::Stormy);
    }

    #[test]
    fn test_aggregate_caps_at_five_days() {
        let entries: Vec<_> = (0..8).map(|d| slot(d, 12, 20.0, 30.0, 800)).collect();
        let days = aggregate_forecast(&entries);
        assert_eq!(days.len(), 5);
    }

    #[test]
    fn test_aggregate_empty_input() {
        assert!(aggregate_forecast(&[]).is_empty());
    }

    #[tokio::test]
    async fn test_sync_requires_auth() {
        let result = sync_weather(HeaderMap::new()).await;
        assert!(matches!(result, Err(ApiError::Unauthorized(_))));
    }
}
