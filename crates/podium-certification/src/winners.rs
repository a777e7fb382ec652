//! Results aggregation.
//!
//! Category totals are the sum of every non-null score minus the contestant's
//! deductions, floored at zero. Results are disclosed once the board has
//! certified the category, or to privileged callers at any time.

use crate::access::{load_category, load_contest, load_event};
use crate::error::Result;
use crate::ledger::has_category_record;
use crate::metrics;
use podium_storage::StorageBackend;
use podium_types::{
    Category, CategoryId, ContestId, ContestantId, EventId, LedgerScope, RequestContext, Role,
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

const PENDING_MESSAGE: &str = "Winners will be available once the board has certified results";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestantResult {
    pub contestant_id: ContestantId,
    pub name: String,
    pub contestant_number: Option<u32>,
    pub raw_score: f64,
    pub deductions: f64,
    pub total_score: f64,
    pub score_count: usize,
    /// 1-based position
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryWinners {
    pub category_id: CategoryId,
    pub category_name: String,
    /// Sum of the criteria maxima; `None` when the category has no criteria
    pub total_possible_score: Option<f64>,
    pub board_certified: bool,
    pub can_show_winners: bool,
    /// Empty when results may not be shown to the caller
    pub results: Vec<ContestantResult>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestWinners {
    pub contest_id: ContestId,
    pub contest_name: String,
    pub categories: Vec<CategoryWinners>,
    /// Categories held back from this caller
    pub withheld_categories: Vec<CategoryId>,
    /// Contestant totals summed over the disclosed categories
    pub results: Vec<ContestantResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventWinners {
    pub event_id: EventId,
    pub event_name: String,
    pub contests: Vec<ContestWinners>,
}

/// Highest total first; ties by contestant number (unnumbered last), then id
fn rank(results: &mut [ContestantResult]) {
    results.sort_by(|a, b| {
        b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| match (a.contestant_number, b.contestant_number) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
            .then_with(|| a.contestant_id.cmp(&b.contestant_id))
    });
    for (position, result) in results.iter_mut().enumerate() {
        result.rank = position + 1;
    }
}

pub struct WinnerService {
    storage: Arc<dyn StorageBackend>,
}

impl WinnerService {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    pub async fn winners_by_category(
        &self,
        ctx: &RequestContext,
        category_id: &CategoryId,
    ) -> Result<CategoryWinners> {
        let category = load_category(self.storage.as_ref(), ctx, category_id).await?;
        let mut winners = self.tally_category(&category).await?;
        winners.can_show_winners = winners.board_certified || ctx.is_privileged();
        if !winners.can_show_winners {
            winners.results.clear();
            winners.message = Some(PENDING_MESSAGE.to_string());
        }
        Ok(winners)
    }

    /// Contest totals over every category the caller may see
    pub async fn winners_by_contest(
        &self,
        ctx: &RequestContext,
        contest_id: &ContestId,
    ) -> Result<ContestWinners> {
        let contest = load_contest(self.storage.as_ref(), ctx, contest_id).await?;
        let mut categories = Vec::new();
        let mut withheld_categories = Vec::new();

        for category in self.storage.list_categories(&contest.id).await? {
            let mut winners = self.tally_category(&category).await?;
            if winners.board_certified || ctx.is_privileged() {
                winners.can_show_winners = true;
                categories.push(winners);
            } else {
                withheld_categories.push(category.id);
            }
        }

        let mut combined: Vec<ContestantResult> = Vec::new();
        let mut index: HashMap<ContestantId, usize> = HashMap::new();
        for result in categories.iter().flat_map(|c| c.results.iter()) {
            match index.get(&result.contestant_id) {
                Some(&i) => {
                    let entry = &mut combined[i];
                    entry.raw_score += result.raw_score;
                    entry.deductions += result.deductions;
                    entry.total_score += result.total_score;
                    entry.score_count += result.score_count;
                }
                None => {
                    index.insert(result.contestant_id.clone(), combined.len());
                    combined.push(result.clone());
                }
            }
        }
        rank(&mut combined);

        Ok(ContestWinners {
            contest_id: contest.id,
            contest_name: contest.name,
            categories,
            withheld_categories,
            results: combined,
        })
    }

    pub async fn winners_by_event(
        &self,
        ctx: &RequestContext,
        event_id: &EventId,
    ) -> Result<EventWinners> {
        let event = load_event(self.storage.as_ref(), ctx, event_id).await?;
        let mut contests = Vec::new();
        for contest in self.storage.list_contests(&event.id).await? {
            contests.push(self.winners_by_contest(ctx, &contest.id).await?);
        }
        Ok(EventWinners {
            event_id: event.id,
            event_name: event.name,
            contests,
        })
    }

    /// Full, undisclosed tally of one category
    async fn tally_category(&self, category: &Category) -> Result<CategoryWinners> {
        let timer = metrics::WINNER_COMPUTATION_TIME.start_timer();
        let storage = self.storage.as_ref();

        let criteria = storage.list_criteria(&category.id).await?;
        let total_possible_score = if criteria.is_empty() {
            None
        } else {
            Some(criteria.iter().map(|c| c.max_score).sum())
        };

        // First-seen order keeps the output stable before ranking
        let mut order: Vec<ContestantId> = Vec::new();
        let mut sums: HashMap<ContestantId, (f64, usize)> = HashMap::new();
        for score in storage.list_scores(&category.id).await? {
            let Some(value) = score.score else { continue };
            let entry = sums.entry(score.contestant_id.clone()).or_insert_with(|| {
                order.push(score.contestant_id.clone());
                (0.0, 0)
            });
            entry.0 += value;
            entry.1 += 1;
        }

        let mut deductions: HashMap<ContestantId, f64> = HashMap::new();
        for deduction in storage.list_deductions(&category.id).await? {
            *deductions.entry(deduction.contestant_id).or_default() += deduction.amount;
        }

        let mut results = Vec::with_capacity(order.len());
        for contestant_id in order {
            let (raw_score, score_count) = sums.get(&contestant_id).copied().unwrap_or_default();
            let deducted = deductions.get(&contestant_id).copied().unwrap_or(0.0);
            let (name, contestant_number) = match storage.get_contestant(&contestant_id).await? {
                Some(contestant) => (contestant.name, contestant.contestant_number),
                None => (contestant_id.to_string(), None),
            };
            results.push(ContestantResult {
                contestant_id,
                name,
                contestant_number,
                raw_score,
                deductions: deducted,
                total_score: (raw_score - deducted).max(0.0),
                score_count,
                rank: 0,
            });
        }
        rank(&mut results);

        let entries = storage
            .list_ledger_entries(&LedgerScope::Category(category.id.clone()))
            .await?;
        let board_certified = has_category_record(&entries, Role::Board);

        timer.observe_duration();
        debug!(
            category_id = %category.id,
            contestants = results.len(),
            board_certified,
            "Category tallied"
        );

        Ok(CategoryWinners {
            category_id: category.id.clone(),
            category_name: category.name.clone(),
            total_possible_score,
            board_certified,
            can_show_winners: false,
            results,
            message: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, number: Option<u32>, total: f64) -> ContestantResult {
        ContestantResult {
            contestant_id: ContestantId::new(id),
            name: id.to_string(),
            contestant_number: number,
            raw_score: total,
            deductions: 0.0,
            total_score: total,
            score_count: 1,
            rank: 0,
        }
    }

    #[test]
    fn test_rank_orders_by_total_then_number() {
        let mut results = vec![
            result("c", None, 20.0),
            result("b", Some(9), 20.0),
            result("a", Some(3), 20.0),
            result("d", Some(1), 35.0),
        ];
        rank(&mut results);

        let order: Vec<&str> = results.iter().map(|r| r.contestant_id.as_str()).collect();
        assert_eq!(order, vec!["d", "a", "b", "c"]);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[3].rank, 4);
    }
}
