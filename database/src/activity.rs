use crate::{from_millis, now_millis, Database};
use chrono::{DateTime, Duration, Utc};
use netia_core::{
    ActivityRecord, ContentRef, CoreError, DatabaseError, NewActivity, Platform,
    PlatformActivityCounts,
};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use tracing::debug;

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const MAX_PAGE_SIZE: u32 = 1000;
const TOP_ENTRIES: i64 = 10;

const ACTIVITY_COLUMNS: &str = "id, platform, post_id, comment_id, message_id, rule_id, \
     keyword, response, scope, author, timestamp, success";

/// Filters for browsing the activity log. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityQuery {
    pub success: Option<bool>,
    pub platform: Option<Platform>,
    pub scope: Option<String>,
    pub keyword: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: u32,
}

impl ActivityQuery {
    fn page_size(&self) -> Result<u32, CoreError> {
        match self.limit {
            None => Ok(DEFAULT_PAGE_SIZE),
            Some(limit) if (1..=MAX_PAGE_SIZE).contains(&limit) => Ok(limit),
            Some(limit) => Err(CoreError::InvalidInput {
                message: format!("limit must be between 1 and {MAX_PAGE_SIZE}, got {limit}"),
            }),
        }
    }

    fn push_filters<'a>(&'a self, builder: &mut QueryBuilder<'a, Sqlite>) {
        builder.push(" WHERE 1 = 1");
        if let Some(success) = self.success {
            builder.push(" AND success = ").push_bind(success);
        }
        if let Some(platform) = self.platform {
            builder.push(" AND platform = ").push_bind(platform.as_str());
        }
        if let Some(scope) = self.scope.as_deref() {
            builder
                .push(" AND LOWER(scope) = LOWER(")
                .push_bind(scope.trim())
                .push(")");
        }
        if let Some(keyword) = self.keyword.as_deref() {
            builder
                .push(" AND LOWER(keyword) = LOWER(")
                .push_bind(keyword.trim())
                .push(")");
        }
        if let Some(since) = self.since {
            builder
                .push(" AND timestamp >= ")
                .push_bind(since.timestamp_millis());
        }
        if let Some(until) = self.until {
            builder
                .push(" AND timestamp <= ")
                .push_bind(until.timestamp_millis());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityPage {
    pub records: Vec<ActivityRecord>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CountEntry {
    pub name: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityStats {
    pub days: u32,
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    /// Percentage of successful replies, rounded to two decimals.
    pub success_rate: f64,
    pub last_24h: u64,
    pub top_scopes: Vec<CountEntry>,
    pub top_keywords: Vec<CountEntry>,
}

#[derive(FromRow)]
struct ActivityRow {
    id: String,
    platform: String,
    post_id: Option<String>,
    comment_id: Option<String>,
    message_id: Option<String>,
    rule_id: Option<String>,
    keyword: String,
    response: String,
    scope: String,
    author: String,
    timestamp: i64,
    success: bool,
}

impl TryFrom<ActivityRow> for ActivityRecord {
    type Error = CoreError;

    fn try_from(row: ActivityRow) -> Result<Self, Self::Error> {
        let platform = Platform::parse(&row.platform).ok_or_else(|| {
            CoreError::Database(DatabaseError::QueryFailed {
                query: format!("activity {} has unknown platform {}", row.id, row.platform),
            })
        })?;
        let content = match (row.post_id, row.comment_id, row.message_id) {
            (Some(id), None, None) => ContentRef::Post(id),
            (None, Some(id), None) => ContentRef::Comment(id),
            (None, None, Some(id)) => ContentRef::Message(id),
            _ => {
                return Err(CoreError::Database(DatabaseError::ConstraintViolation {
                    constraint: format!("activity {} must reference exactly one item", row.id),
                }))
            }
        };
        Ok(Self {
            id: row.id,
            platform,
            content,
            rule_id: row.rule_id,
            keyword: row.keyword,
            response: row.response,
            scope: row.scope,
            author: row.author,
            timestamp: from_millis(row.timestamp),
            success: row.success,
        })
    }
}

fn to_count(value: i64) -> u64 {
    value.max(0) as u64
}

impl Database {
    /// Appends one activity row. Failed attempts are stored without response text.
    pub async fn record_activity(
        &self,
        activity: &NewActivity,
    ) -> Result<ActivityRecord, CoreError> {
        let response = if activity.success {
            activity.response.clone()
        } else {
            String::new()
        };
        let record = ActivityRecord {
            id: uuid::Uuid::new_v4().to_string(),
            platform: activity.platform,
            content: activity.content.clone(),
            rule_id: activity.rule_id.clone(),
            keyword: activity.keyword.clone(),
            response,
            scope: activity.scope.clone(),
            author: activity.author.clone(),
            timestamp: from_millis(now_millis()),
            success: activity.success,
        };

        sqlx::query(
            "INSERT INTO activities
                (id, platform, post_id, comment_id, message_id, rule_id,
                 keyword, response, scope, author, timestamp, success)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(record.platform.as_str())
        .bind(record.content.post_id())
        .bind(record.content.comment_id())
        .bind(record.content.message_id())
        .bind(&record.rule_id)
        .bind(&record.keyword)
        .bind(&record.response)
        .bind(&record.scope)
        .bind(&record.author)
        .bind(record.timestamp.timestamp_millis())
        .bind(record.success)
        .execute(self.pool()?)
        .await
        .map_err(DatabaseError::from)?;

        debug!(
            "Recorded {} activity {} for {} ({})",
            record.platform,
            record.id,
            record.content.id(),
            if record.success { "success" } else { "failed" }
        );
        Ok(record)
    }

    pub async fn get_activity(&self, id: &str) -> Result<Option<ActivityRecord>, CoreError> {
        let row = sqlx::query_as::<_, ActivityRow>(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool()?)
        .await
        .map_err(DatabaseError::from)?;
        row.map(ActivityRecord::try_from).transpose()
    }

    /// Newest first, with the total count of rows matching the filters.
    pub async fn list_activities(&self, query: &ActivityQuery) -> Result<ActivityPage, CoreError> {
        let limit = query.page_size()?;
        let pool = self.pool()?;

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM activities");
        query.push_filters(&mut count);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(pool)
            .await
            .map_err(DatabaseError::from)?;

        let mut select =
            QueryBuilder::<Sqlite>::new(format!("SELECT {ACTIVITY_COLUMNS} FROM activities"));
        query.push_filters(&mut select);
        select
            .push(" ORDER BY timestamp DESC, rowid DESC LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(i64::from(query.offset));
        let rows = select
            .build_query_as::<ActivityRow>()
            .fetch_all(pool)
            .await
            .map_err(DatabaseError::from)?;

        let records = rows
            .into_iter()
            .map(ActivityRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let total = to_count(total);
        let has_more = u64::from(query.offset) + (records.len() as u64) < total;

        Ok(ActivityPage {
            records,
            total,
            limit,
            offset: query.offset,
            has_more,
        })
    }

    /// Aggregates over the last `days` days.
    pub async fn activity_stats(&self, days: u32) -> Result<ActivityStats, CoreError> {
        if days == 0 {
            return Err(CoreError::InvalidInput {
                message: "stats window must be at least one day".to_string(),
            });
        }
        let pool = self.pool()?;
        let now = Utc::now();
        let window_start = (now - Duration::days(i64::from(days))).timestamp_millis();
        let day_start = (now - Duration::hours(24)).timestamp_millis();

        let (total, successful): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(success), 0) FROM activities WHERE timestamp >= ?",
        )
        .bind(window_start)
        .fetch_one(pool)
        .await
        .map_err(DatabaseError::from)?;

        let last_24h: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM activities WHERE timestamp >= ?")
                .bind(day_start)
                .fetch_one(pool)
                .await
                .map_err(DatabaseError::from)?;

        let top_scopes = self.top_entries("scope", window_start).await?;
        let top_keywords = self.top_entries("keyword", window_start).await?;

        let (total, successful) = (to_count(total), to_count(successful));
        let success_rate = if total == 0 {
            0.0
        } else {
            (successful as f64 / total as f64 * 10_000.0).round() / 100.0
        };

        Ok(ActivityStats {
            days,
            total,
            successful,
            failed: total - successful,
            success_rate,
            last_24h: to_count(last_24h),
            top_scopes,
            top_keywords,
        })
    }

    async fn top_entries(
        &self,
        column: &'static str,
        since_millis: i64,
    ) -> Result<Vec<CountEntry>, CoreError> {
        let entries = sqlx::query_as::<_, CountEntry>(&format!(
            "SELECT {column} AS name, COUNT(*) AS count FROM activities
             WHERE timestamp >= ? GROUP BY {column} ORDER BY count DESC, name ASC LIMIT ?"
        ))
        .bind(since_millis)
        .bind(TOP_ENTRIES)
        .fetch_all(self.pool()?)
        .await
        .map_err(DatabaseError::from)?;
        Ok(entries)
    }

    pub async fn activity_counts(
        &self,
        platform: Platform,
    ) -> Result<PlatformActivityCounts, CoreError> {
        let day_start = (Utc::now() - Duration::hours(24)).timestamp_millis();
        let (total, successful, last_24h): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*),
                    COALESCE(SUM(success), 0),
                    COALESCE(SUM(CASE WHEN timestamp >= ? THEN 1 ELSE 0 END), 0)
             FROM activities WHERE platform = ?",
        )
        .bind(day_start)
        .bind(platform.as_str())
        .fetch_one(self.pool()?)
        .await
        .map_err(DatabaseError::from)?;

        Ok(PlatformActivityCounts {
            total: to_count(total),
            successful: to_count(successful),
            last_24h: to_count(last_24h),
        })
    }
}
