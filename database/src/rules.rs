use crate::{from_millis, now_millis, Database};
use netia_core::{CoreError, DatabaseError, KeywordRule, KeywordRuleUpdate, NewKeywordRule};
use sqlx::FromRow;
use tracing::info;

const RULE_COLUMNS: &str =
    "id, keyword, scope, response_template, is_active, created_at, updated_at";

#[derive(FromRow)]
struct RuleRow {
    id: String,
    keyword: String,
    scope: Option<String>,
    response_template: String,
    is_active: bool,
    created_at: i64,
    updated_at: i64,
}

impl From<RuleRow> for KeywordRule {
    fn from(row: RuleRow) -> Self {
        Self {
            id: row.id,
            keyword: row.keyword,
            scope: row.scope,
            response_template: row.response_template,
            is_active: row.is_active,
            created_at: from_millis(row.created_at),
            updated_at: from_millis(row.updated_at),
        }
    }
}

/// Blank scopes are stored as NULL so they read back as global rules.
fn normalize_scope(scope: Option<&str>) -> Option<String> {
    scope
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl Database {
    pub async fn create_rule(&self, rule: &NewKeywordRule) -> Result<KeywordRule, CoreError> {
        rule.validate()?;
        let now = now_millis();
        let created = KeywordRule {
            id: uuid::Uuid::new_v4().to_string(),
            keyword: rule.keyword.trim().to_string(),
            scope: normalize_scope(rule.scope.as_deref()),
            response_template: rule.response_template.trim().to_string(),
            is_active: rule.is_active,
            created_at: from_millis(now),
            updated_at: from_millis(now),
        };

        sqlx::query(
            "INSERT INTO keyword_rules
                (id, keyword, scope, response_template, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&created.id)
        .bind(&created.keyword)
        .bind(&created.scope)
        .bind(&created.response_template)
        .bind(created.is_active)
        .bind(now)
        .bind(now)
        .execute(self.pool()?)
        .await
        .map_err(DatabaseError::from)?;

        info!("Created keyword rule '{}' ({})", created.keyword, created.id);
        Ok(created)
    }

    pub async fn get_rule(&self, id: &str) -> Result<Option<KeywordRule>, CoreError> {
        let row = sqlx::query_as::<_, RuleRow>(&format!(
            "SELECT {RULE_COLUMNS} FROM keyword_rules WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(self.pool()?)
        .await
        .map_err(DatabaseError::from)?;
        Ok(row.map(KeywordRule::from))
    }

    /// Rules in creation order, which is also their match priority.
    pub async fn list_rules(&self, active_only: bool) -> Result<Vec<KeywordRule>, CoreError> {
        let filter = if active_only { "WHERE is_active = 1" } else { "" };
        let rows = sqlx::query_as::<_, RuleRow>(&format!(
            "SELECT {RULE_COLUMNS} FROM keyword_rules {filter} ORDER BY created_at ASC, rowid ASC"
        ))
        .fetch_all(self.pool()?)
        .await
        .map_err(DatabaseError::from)?;
        Ok(rows.into_iter().map(KeywordRule::from).collect())
    }

    pub async fn update_rule(
        &self,
        id: &str,
        update: &KeywordRuleUpdate,
    ) -> Result<KeywordRule, CoreError> {
        update.validate()?;
        let mut rule = self.get_rule(id).await?.ok_or_else(|| CoreError::NotFound {
            resource: format!("keyword rule {id}"),
        })?;

        if let Some(keyword) = &update.keyword {
            rule.keyword = keyword.trim().to_string();
        }
        if let Some(scope) = &update.scope {
            rule.scope = normalize_scope(scope.as_deref());
        }
        if let Some(template) = &update.response_template {
            rule.response_template = template.trim().to_string();
        }
        if let Some(active) = update.is_active {
            rule.is_active = active;
        }
        let now = now_millis();
        rule.updated_at = from_millis(now);

        sqlx::query(
            "UPDATE keyword_rules
             SET keyword = ?, scope = ?, response_template = ?, is_active = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&rule.keyword)
        .bind(&rule.scope)
        .bind(&rule.response_template)
        .bind(rule.is_active)
        .bind(now)
        .bind(id)
        .execute(self.pool()?)
        .await
        .map_err(DatabaseError::from)?;

        Ok(rule)
    }

    pub async fn set_rule_active(&self, id: &str, active: bool) -> Result<KeywordRule, CoreError> {
        let update = KeywordRuleUpdate {
            is_active: Some(active),
            ..KeywordRuleUpdate::default()
        };
        self.update_rule(id, &update).await
    }

    /// Past activity rows keep their keyword; their rule reference is cleared.
    pub async fn delete_rule(&self, id: &str) -> Result<(), CoreError> {
        let result = sqlx::query("DELETE FROM keyword_rules WHERE id = ?")
            .bind(id)
            .execute(self.pool()?)
            .await
            .map_err(DatabaseError::from)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound {
                resource: format!("keyword rule {id}"),
            });
        }
        info!("Deleted keyword rule {}", id);
        Ok(())
    }
}
