use regex::{Regex, RegexBuilder};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, warn};

use crate::db::class_from_sql;
use crate::error::{Result, SimplefiError};
use crate::models::{MatchType, Rule, TransactionClass};

fn build_regex(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Reject patterns that could never match before they are stored.
pub fn validate_pattern(pattern: &str, match_type: MatchType) -> Result<()> {
    if pattern.trim().is_empty() {
        return Err(SimplefiError::Other("Pattern must not be empty".into()));
    }
    if match_type == MatchType::Regex {
        build_regex(pattern)?;
    }
    Ok(())
}

struct CompiledRule {
    rule: Rule,
    regex: Option<Regex>,
}

impl CompiledRule {
    fn matches(&self, description: &str, amount: f64) -> bool {
        let text_ok = match self.rule.match_type {
            MatchType::Regex => self
                .regex
                .as_ref()
                .map_or(false, |re| re.is_match(description)),
            MatchType::Contains => description
                .to_uppercase()
                .contains(&self.rule.pattern.to_uppercase()),
            MatchType::StartsWith => description
                .to_uppercase()
                .starts_with(&self.rule.pattern.to_uppercase()),
        };
        text_ok
            && self.rule.min_amount.map_or(true, |min| amount >= min)
            && self.rule.max_amount.map_or(true, |max| amount <= max)
    }
}

/// An ordered, compiled rule set. Rules are tried by descending priority;
/// equal priorities fall back to the pattern text, which is unique, so the
/// outcome never depends on when a rule was created.
pub struct RuleMatcher {
    rules: Vec<CompiledRule>,
}

impl RuleMatcher {
    pub fn new(mut rules: Vec<Rule>) -> Self {
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.pattern.cmp(&b.pattern)));
        let rules = rules
            .into_iter()
            .map(|rule| {
                let regex = match rule.match_type {
                    MatchType::Regex => match build_regex(&rule.pattern) {
                        Ok(re) => Some(re),
                        Err(e) => {
                            warn!("rule {} has an invalid pattern and will never match: {e}", rule.id);
                            None
                        }
                    },
                    _ => None,
                };
                CompiledRule { rule, regex }
            })
            .collect();
        Self { rules }
    }

    pub fn load(conn: &Connection) -> Result<Self> {
        let mut stmt = conn.prepare(
            "SELECT id, pattern, match_type, category_id, min_amount, max_amount, priority, hit_count \
             FROM rules",
        )?;
        let rules = stmt
            .query_map([], |row| {
                let match_type: String = row.get(2)?;
                Ok(Rule {
                    id: row.get(0)?,
                    pattern: row.get(1)?,
                    match_type: match_type.parse().unwrap_or(MatchType::Regex),
                    category_id: row.get(3)?,
                    min_amount: row.get(4)?,
                    max_amount: row.get(5)?,
                    priority: row.get(6)?,
                    hit_count: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self::new(rules))
    }

    /// First rule whose predicate accepts the transaction, or `None` when
    /// it stays unclassified.
    pub fn find(&self, description: &str, amount: f64) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|c| c.matches(description, amount))
            .map(|c| &c.rule)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every transaction without a category.
    Unclassified,
    /// Unclassified transactions from one upload.
    Upload(i64),
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ClassifyResult {
    pub classified: usize,
    pub unclassified: usize,
}

/// Apply the rule set to transactions in `scope` that have no category.
/// Manually categorized transactions are never considered.
pub fn classify_transactions(conn: &Connection, scope: Scope) -> Result<ClassifyResult> {
    let matcher = RuleMatcher::load(conn)?;

    let (sql, upload): (&str, Option<i64>) = match scope {
        Scope::Unclassified => (
            "SELECT id, description, amount FROM transactions \
             WHERE category_id IS NULL AND is_manual = 0 ORDER BY id",
            None,
        ),
        Scope::Upload(id) => (
            "SELECT id, description, amount FROM transactions \
             WHERE category_id IS NULL AND is_manual = 0 AND upload_id = ?1 ORDER BY id",
            Some(id),
        ),
    };
    let mut stmt = conn.prepare(sql)?;
    let map_row = |row: &rusqlite::Row| -> rusqlite::Result<(i64, String, f64)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    };
    let pending: Vec<(i64, String, f64)> = match upload {
        Some(id) => stmt.query_map([id], map_row)?.collect::<std::result::Result<_, _>>()?,
        None => stmt.query_map([], map_row)?.collect::<std::result::Result<_, _>>()?,
    };

    let mut result = ClassifyResult::default();
    if matcher.is_empty() {
        result.unclassified = pending.len();
        return Ok(result);
    }

    for (txn_id, description, amount) in &pending {
        match matcher.find(description, *amount) {
            Some(rule) => {
                conn.execute(
                    "UPDATE transactions SET category_id = ?1, rule_id = ?2 WHERE id = ?3",
                    rusqlite::params![rule.category_id, rule.id, txn_id],
                )?;
                conn.execute(
                    "UPDATE rules SET hit_count = hit_count + 1 WHERE id = ?1",
                    [rule.id],
                )?;
                result.classified += 1;
            }
            None => result.unclassified += 1,
        }
    }
    debug!(
        "classified {} of {} transactions with {} rules",
        result.classified,
        pending.len(),
        matcher.len()
    );
    Ok(result)
}

/// Drop every rule-assigned category and re-run the matcher over the whole
/// history. Manual overrides survive.
pub fn reclassify_all(conn: &Connection) -> Result<ClassifyResult> {
    let cleared = conn.execute(
        "UPDATE transactions SET category_id = NULL, rule_id = NULL WHERE is_manual = 0",
        [],
    )?;
    conn.execute("UPDATE rules SET hit_count = 0", [])?;
    debug!("cleared {cleared} rule assignments");
    classify_transactions(conn, Scope::Unclassified)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncResult {
    /// Transactions that had no category and now have one.
    pub classified: usize,
    /// Transactions moved from one rule to another.
    pub moved: usize,
}

/// Bring every rule-assigned transaction in line with the current rule set,
/// so stored categories equal what the matcher would pick today. Run after
/// rules are added or removed. Manual overrides are skipped.
pub fn sync_with_rules(conn: &Connection) -> Result<SyncResult> {
    let matcher = RuleMatcher::load(conn)?;
    let mut stmt = conn.prepare(
        "SELECT id, description, amount, rule_id FROM transactions WHERE is_manual = 0 ORDER BY id",
    )?;
    let rows: Vec<(i64, String, f64, Option<i64>)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
        .collect::<std::result::Result<_, _>>()?;

    let mut result = SyncResult::default();
    for (txn_id, description, amount, current) in &rows {
        let winner = matcher.find(description, *amount);
        if winner.map(|r| r.id) == *current {
            continue;
        }
        if let Some(old) = current {
            conn.execute(
                "UPDATE rules SET hit_count = max(hit_count - 1, 0) WHERE id = ?1",
                [old],
            )?;
        }
        match winner {
            Some(rule) => {
                conn.execute(
                    "UPDATE transactions SET category_id = ?1, rule_id = ?2 WHERE id = ?3",
                    rusqlite::params![rule.category_id, rule.id, txn_id],
                )?;
                conn.execute(
                    "UPDATE rules SET hit_count = hit_count + 1 WHERE id = ?1",
                    [rule.id],
                )?;
                if current.is_some() {
                    result.moved += 1;
                } else {
                    result.classified += 1;
                }
            }
            None => {
                conn.execute(
                    "UPDATE transactions SET category_id = NULL, rule_id = NULL WHERE id = ?1",
                    [txn_id],
                )?;
            }
        }
    }
    debug!(
        "rule sync: {} classified, {} moved across {} transactions",
        result.classified,
        result.moved,
        rows.len()
    );
    Ok(result)
}

// ---------------------------------------------------------------------------
// Rule storage
// ---------------------------------------------------------------------------

/// Store a new rule after validating its pattern. `id` and `hit_count` of
/// `rule` are ignored.
pub fn create_rule(conn: &Connection, rule: &Rule) -> Result<i64> {
    validate_pattern(&rule.pattern, rule.match_type)?;
    if let (Some(min), Some(max)) = (rule.min_amount, rule.max_amount) {
        if min > max {
            return Err(SimplefiError::Other(format!(
                "Minimum amount {min} is greater than maximum amount {max}"
            )));
        }
    }
    let taken = conn
        .prepare("SELECT 1 FROM rules WHERE pattern = ?1")?
        .exists([&rule.pattern])?;
    if taken {
        return Err(SimplefiError::Other(format!(
            "A rule with pattern '{}' already exists",
            rule.pattern
        )));
    }
    conn.execute(
        "INSERT INTO rules (pattern, match_type, category_id, min_amount, max_amount, priority) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            rule.pattern,
            rule.match_type.key(),
            rule.category_id,
            rule.min_amount,
            rule.max_amount,
            rule.priority,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

#[derive(Debug, Clone)]
pub struct RuleView {
    pub rule: Rule,
    pub category: String,
    pub class: TransactionClass,
}

/// Every rule in the order the matcher tries them.
pub fn list_rules(conn: &Connection) -> Result<Vec<RuleView>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, r.pattern, r.match_type, r.category_id, r.min_amount, r.max_amount, \
         r.priority, r.hit_count, c.name, cl.name \
         FROM rules r JOIN categories c ON r.category_id = c.id \
         JOIN classes cl ON c.class_id = cl.id \
         ORDER BY r.priority DESC, r.pattern",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let match_type: String = row.get(2)?;
            Ok(RuleView {
                rule: Rule {
                    id: row.get(0)?,
                    pattern: row.get(1)?,
                    match_type: match_type.parse().unwrap_or(MatchType::Regex),
                    category_id: row.get(3)?,
                    min_amount: row.get(4)?,
                    max_amount: row.get(5)?,
                    priority: row.get(6)?,
                    hit_count: row.get(7)?,
                },
                category: row.get(8)?,
                class: class_from_sql(row.get(9)?)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[derive(Debug)]
pub struct RuleDeletion {
    pub pattern: String,
    /// Transactions the rule held when it was deleted.
    pub released: usize,
    /// Released transactions another rule picked up.
    pub reclassified: usize,
}

/// Delete a rule. Transactions it classified go back to the matcher, so a
/// lower-priority rule that also matches takes them over; the rest become
/// unclassified. Manual overrides are left as they are.
pub fn delete_rule(conn: &Connection, rule_id: i64) -> Result<RuleDeletion> {
    let pattern: String = conn
        .query_row("SELECT pattern FROM rules WHERE id = ?1", [rule_id], |r| r.get(0))
        .optional()?
        .ok_or_else(|| SimplefiError::Other(format!("No rule with ID {rule_id}")))?;
    let tx = conn.unchecked_transaction()?;
    let released = tx.execute(
        "UPDATE transactions SET category_id = NULL, rule_id = NULL \
         WHERE rule_id = ?1 AND is_manual = 0",
        [rule_id],
    )?;
    tx.execute("DELETE FROM rules WHERE id = ?1", [rule_id])?;
    let sync = sync_with_rules(&tx)?;
    tx.commit()?;
    debug!("deleted rule {rule_id}, released {released} transactions");
    Ok(RuleDeletion {
        pattern,
        released,
        reclassified: sync.classified,
    })
}
