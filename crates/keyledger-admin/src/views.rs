//! Read models derived from an entity snapshot. Nothing here writes.

use std::collections::HashSet;
use std::str::FromStr;

use keyledger_common::{
    Employee, EmployeeId, EmploymentCategory, KeyItem, KeyStatus, KeyType, Transaction,
    TransactionAction,
};
use keyledger_core::Snapshot;
use serde::Serialize;
use time::{Date, Duration, OffsetDateTime};

pub const UNKNOWN_EMPLOYEE: &str = "unknown employee";
pub const UNKNOWN_KEY: &str = "unknown key";
const RECENT_LIMIT: usize = 5;

/// A ledger entry with its references resolved for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionLine {
    #[serde(flatten)]
    pub transaction: Transaction,
    pub employee_name: String,
    pub key_number: String,
}

impl TransactionLine {
    fn resolve(snapshot: &Snapshot, transaction: &Transaction) -> Self {
        Self {
            employee_name: snapshot
                .employee(transaction.employee_id)
                .map(|employee| employee.name.clone())
                .unwrap_or_else(|| UNKNOWN_EMPLOYEE.to_string()),
            key_number: snapshot
                .key(transaction.key_id)
                .map(|key| key.key_number.clone())
                .unwrap_or_else(|| UNKNOWN_KEY.to_string()),
            transaction: transaction.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyTypeAvailability {
    #[serde(rename = "type")]
    pub key_type: KeyType,
    pub available: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCount {
    #[serde(rename = "type")]
    pub category: EmploymentCategory,
    pub employees: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub employees: usize,
    pub available_keys: usize,
    pub issued_keys: usize,
    pub transactions_today: usize,
    pub recent_transactions: Vec<TransactionLine>,
    pub key_types: Vec<KeyTypeAvailability>,
    pub categories: Vec<CategoryCount>,
    pub average_years_of_service: i64,
}

pub fn dashboard(snapshot: &Snapshot, now: OffsetDateTime) -> Dashboard {
    let today = now.date();
    let count_status =
        |status: KeyStatus| snapshot.keys.iter().filter(|k| k.status() == status).count();

    let key_types = KeyType::ALL
        .iter()
        .map(|&key_type| {
            let of_type = snapshot.keys.iter().filter(|k| k.key_type == key_type);
            let (available, total) = of_type.fold((0, 0), |(available, total), key| {
                let free = usize::from(key.status() == KeyStatus::Available);
                (available + free, total + 1)
            });
            KeyTypeAvailability {
                key_type,
                available,
                total,
            }
        })
        .collect();

    let categories = EmploymentCategory::ALL
        .iter()
        .map(|&category| CategoryCount {
            category,
            employees: snapshot
                .employees
                .iter()
                .filter(|e| e.category == category)
                .count(),
        })
        .collect();

    Dashboard {
        employees: snapshot.employees.len(),
        available_keys: count_status(KeyStatus::Available),
        issued_keys: count_status(KeyStatus::Issued),
        transactions_today: snapshot
            .transactions
            .iter()
            .filter(|tx| tx.timestamp.date() == today)
            .count(),
        recent_transactions: snapshot
            .transactions
            .iter()
            .take(RECENT_LIMIT)
            .map(|tx| TransactionLine::resolve(snapshot, tx))
            .collect(),
        key_types,
        categories,
        average_years_of_service: average_years(&snapshot.employees, today),
    }
}

fn average_years(employees: &[Employee], today: Date) -> i64 {
    if employees.is_empty() {
        return 0;
    }
    let total: i64 = employees
        .iter()
        .map(|e| i64::from(keyledger_common::years_of_service(e.start_date, today)))
        .sum();
    (total as f64 / employees.len() as f64).round() as i64
}

/// Case-insensitive substring match; a blank needle matches everything.
fn matches(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(needle)
}

fn needle(search: Option<&str>) -> String {
    search.map(|s| s.trim().to_lowercase()).unwrap_or_default()
}

pub fn employee_list(snapshot: &Snapshot, search: Option<&str>, today: Date) -> Vec<Employee> {
    let needle = needle(search);
    snapshot
        .employees
        .iter()
        .filter(|e| matches(&e.name, &needle) || matches(&e.employee_number, &needle))
        .cloned()
        .map(|e| e.with_years_as_of(today))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeStats {
    pub total_transactions: usize,
    pub keys_issued: usize,
    pub keys_returned: usize,
    pub current_keys: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeDetail {
    pub employee: Employee,
    pub current_keys: Vec<KeyItem>,
    pub history: Vec<TransactionLine>,
    pub stats: EmployeeStats,
}

pub fn employee_detail(
    snapshot: &Snapshot,
    id: EmployeeId,
    today: Date,
) -> Option<EmployeeDetail> {
    let employee = snapshot.employee(id)?.clone().with_years_as_of(today);
    let current_keys: Vec<KeyItem> = snapshot.keys_held_by(id).cloned().collect();
    let mut history: Vec<&Transaction> = snapshot.transactions_of(id).collect();
    history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let stats = EmployeeStats {
        total_transactions: history.len(),
        keys_issued: count_action(history.iter().copied(), TransactionAction::Issue),
        keys_returned: count_action(history.iter().copied(), TransactionAction::Return),
        current_keys: current_keys.len(),
    };
    Some(EmployeeDetail {
        employee,
        current_keys,
        history: history
            .into_iter()
            .map(|tx| TransactionLine::resolve(snapshot, tx))
            .collect(),
        stats,
    })
}

fn count_action<'a>(
    transactions: impl Iterator<Item = &'a Transaction>,
    action: TransactionAction,
) -> usize {
    transactions.filter(|tx| tx.action == action).count()
}

/// Status filter of the key list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(KeyStatus),
}

impl FromStr for StatusFilter {
    type Err = keyledger_common::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "all" => Ok(StatusFilter::All),
            other => other.parse().map(StatusFilter::Only),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyLine {
    #[serde(flatten)]
    pub key: KeyItem,
    pub holder_name: Option<String>,
}

pub fn key_list(snapshot: &Snapshot, search: Option<&str>, status: StatusFilter) -> Vec<KeyLine> {
    let needle = needle(search);
    snapshot
        .keys
        .iter()
        .filter(|key| {
            matches(&key.key_number, &needle)
                || key.note.as_deref().is_some_and(|note| matches(note, &needle))
        })
        .filter(|key| match status {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => key.status() == wanted,
        })
        .map(|key| KeyLine {
            holder_name: key.assigned_to().map(|holder| {
                snapshot
                    .employee(holder)
                    .map(|employee| employee.name.clone())
                    .unwrap_or_else(|| UNKNOWN_EMPLOYEE.to_string())
            }),
            key: key.clone(),
        })
        .collect()
}

/// Time window of the transaction overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    #[default]
    All,
    Today,
    /// The last seven days plus today.
    Week,
    /// The last thirty days plus today.
    Month,
}

impl Period {
    fn window_start(self, now: OffsetDateTime) -> Option<OffsetDateTime> {
        let start_of_day = now.replace_time(time::Time::MIDNIGHT);
        match self {
            Period::All => None,
            Period::Today => Some(start_of_day),
            Period::Week => Some(start_of_day - Duration::days(7)),
            Period::Month => Some(start_of_day - Duration::days(30)),
        }
    }
}

impl FromStr for Period {
    type Err = keyledger_common::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "all" => Ok(Period::All),
            "today" => Ok(Period::Today),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            other => Err(keyledger_common::ParseEnumError {
                kind: "period",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub search: Option<String>,
    pub action: Option<TransactionAction>,
    pub period: Period,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionTotals {
    pub total: usize,
    pub today: usize,
    pub issued: usize,
    pub returned: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredSummary {
    pub issued: usize,
    pub returned: usize,
    pub employees: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOverview {
    pub transactions: Vec<TransactionLine>,
    pub totals: TransactionTotals,
    pub summary: FilteredSummary,
}

pub fn transaction_overview(
    snapshot: &Snapshot,
    filter: &TransactionFilter,
    now: OffsetDateTime,
) -> TransactionOverview {
    let needle = needle(filter.search.as_deref());
    let window = filter.period.window_start(now);

    let lines: Vec<TransactionLine> = snapshot
        .transactions
        .iter()
        .filter(|tx| filter.action.is_none_or(|action| tx.action == action))
        .filter(|tx| window.is_none_or(|start| tx.timestamp >= start && tx.timestamp <= now))
        .map(|tx| TransactionLine::resolve(snapshot, tx))
        .filter(|line| {
            matches(&line.employee_name, &needle)
                || matches(&line.key_number, &needle)
                || line
                    .transaction
                    .notes
                    .as_deref()
                    .is_some_and(|notes| matches(notes, &needle))
        })
        .collect();

    let all = &snapshot.transactions;
    let totals = TransactionTotals {
        total: all.len(),
        today: all.iter().filter(|tx| tx.timestamp.date() == now.date()).count(),
        issued: count_action(all.iter(), TransactionAction::Issue),
        returned: count_action(all.iter(), TransactionAction::Return),
    };
    let filtered = lines.iter().map(|line| &line.transaction);
    let summary = FilteredSummary {
        issued: count_action(filtered.clone(), TransactionAction::Issue),
        returned: count_action(filtered.clone(), TransactionAction::Return),
        employees: filtered
            .map(|tx| tx.employee_id)
            .collect::<HashSet<_>>()
            .len(),
    };

    TransactionOverview {
        transactions: lines,
        totals,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyledger_common::{Custody, KeyId, KeyLength, TransactionId};
    use time::macros::{date, datetime};
    use uuid::Uuid;

    const NOW: OffsetDateTime = datetime!(2026-10-19 14:00 UTC);

    fn employee(name: &str, number: &str, category: EmploymentCategory, start: Date) -> Employee {
        Employee {
            id: EmployeeId(Uuid::now_v7()),
            name: name.to_string(),
            employee_number: number.to_string(),
            category,
            start_date: start,
            years_of_service: 0,
        }
    }

    fn key(number: &str, key_type: KeyType, custody: Custody, note: Option<&str>) -> KeyItem {
        KeyItem {
            id: KeyId(Uuid::now_v7()),
            key_number: number.to_string(),
            key_type,
            length: KeyLength::Short,
            custody,
            note: note.map(str::to_string),
        }
    }

    fn tx(
        employee: &Employee,
        key_id: KeyId,
        action: TransactionAction,
        at: OffsetDateTime,
        notes: Option<&str>,
    ) -> Transaction {
        Transaction {
            id: TransactionId(Uuid::now_v7()),
            employee_id: employee.id,
            key_id,
            action,
            timestamp: at,
            notes: notes.map(str::to_string),
            handled_by: Some("admin".to_string()),
        }
    }

    /// Jan holds A001, Piet holds nothing; the ledger also references a
    /// deleted key.
    fn fixture() -> (Snapshot, Employee, Employee, KeyItem) {
        let jan = employee("Jan Janssen", "EMP001", EmploymentCategory::Cao, date!(2020 - 01 - 15));
        let piet = employee("Piet de Vries", "EMP002", EmploymentCategory::Mbv, date!(2015 - 06 - 01));
        let a001 = key("A001", KeyType::A, Custody::Issued(jan.id), Some("Hoofdingang"));
        let b001 = key("B001", KeyType::B, Custody::Available, None);
        let gone = KeyId(Uuid::now_v7());
        let transactions = vec![
            tx(&jan, a001.id, TransactionAction::Issue, datetime!(2026-10-19 09:00 UTC), None),
            tx(&piet, gone, TransactionAction::Return, datetime!(2026-10-15 09:00 UTC), Some("late")),
            tx(&piet, gone, TransactionAction::Issue, datetime!(2026-09-01 09:00 UTC), None),
        ];
        let snapshot = Snapshot {
            employees: vec![piet.clone(), jan.clone()],
            keys: vec![b001, a001.clone()],
            transactions,
        };
        (snapshot, jan, piet, a001)
    }

    #[test]
    fn dashboard_counts_and_resolves() {
        let (snapshot, jan, _, _) = fixture();
        let board = dashboard(&snapshot, NOW);

        assert_eq!(board.employees, 2);
        assert_eq!(board.available_keys, 1);
        assert_eq!(board.issued_keys, 1);
        assert_eq!(board.transactions_today, 1);
        assert_eq!(board.recent_transactions.len(), 3);
        assert_eq!(board.recent_transactions[0].employee_name, jan.name);
        assert_eq!(board.recent_transactions[1].key_number, UNKNOWN_KEY);
        assert_eq!(
            board.key_types,
            vec![
                KeyTypeAvailability { key_type: KeyType::A, available: 0, total: 1 },
                KeyTypeAvailability { key_type: KeyType::B, available: 1, total: 1 },
                KeyTypeAvailability { key_type: KeyType::C, available: 0, total: 0 },
            ]
        );
        assert_eq!(board.categories[0].employees, 1);
        assert_eq!(board.categories[1].employees, 1);
        // (6 + 11) / 2 = 8.5
        assert_eq!(board.average_years_of_service, 9);
    }

    #[test]
    fn empty_dashboard_has_zero_average() {
        let board = dashboard(&Snapshot::default(), NOW);
        assert_eq!(board.average_years_of_service, 0);
        assert!(board.recent_transactions.is_empty());
    }

    #[test]
    fn employee_search_matches_name_or_number() {
        let (snapshot, jan, _, _) = fixture();
        let found = employee_list(&snapshot, Some("  JANS "), NOW.date());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, jan.id);
        assert_eq!(found[0].years_of_service, 6);

        assert_eq!(employee_list(&snapshot, Some("emp00"), NOW.date()).len(), 2);
        assert_eq!(employee_list(&snapshot, None, NOW.date()).len(), 2);
    }

    #[test]
    fn employee_detail_collects_keys_and_history() {
        let (snapshot, jan, piet, a001) = fixture();
        let detail = employee_detail(&snapshot, jan.id, NOW.date()).unwrap();
        assert_eq!(detail.current_keys, vec![a001]);
        assert_eq!(detail.stats.current_keys, 1);
        assert_eq!(detail.stats.keys_issued, 1);

        let detail = employee_detail(&snapshot, piet.id, NOW.date()).unwrap();
        assert_eq!(detail.stats.total_transactions, 2);
        assert_eq!(detail.stats.keys_returned, 1);
        assert!(detail.history[0].transaction.timestamp > detail.history[1].transaction.timestamp);

        assert!(employee_detail(&snapshot, EmployeeId(Uuid::now_v7()), NOW.date()).is_none());
    }

    #[test]
    fn key_list_filters_by_search_and_status() {
        let (snapshot, jan, _, a001) = fixture();
        let issued = key_list(&snapshot, None, "issued".parse().unwrap());
        assert_eq!(issued.len(), 1);
        assert_eq!(issued[0].key.id, a001.id);
        assert_eq!(issued[0].holder_name.as_deref(), Some(jan.name.as_str()));

        let by_note = key_list(&snapshot, Some("hoofd"), StatusFilter::All);
        assert_eq!(by_note.len(), 1);
        assert_eq!(key_list(&snapshot, Some("b0"), StatusFilter::All).len(), 1);
        assert!("missing".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn overview_applies_period_action_and_search() {
        let (snapshot, _, piet, _) = fixture();

        let week = TransactionFilter {
            period: Period::Week,
            ..Default::default()
        };
        let overview = transaction_overview(&snapshot, &week, NOW);
        assert_eq!(overview.transactions.len(), 2);
        assert_eq!(overview.summary.employees, 2);
        assert_eq!(
            overview.totals,
            TransactionTotals { total: 3, today: 1, issued: 2, returned: 1 }
        );

        let today = TransactionFilter {
            period: Period::Today,
            ..Default::default()
        };
        assert_eq!(transaction_overview(&snapshot, &today, NOW).transactions.len(), 1);

        let returns_by_piet = TransactionFilter {
            search: Some("piet".to_string()),
            action: Some(TransactionAction::Return),
            period: Period::All,
        };
        let overview = transaction_overview(&snapshot, &returns_by_piet, NOW);
        assert_eq!(overview.transactions.len(), 1);
        assert_eq!(overview.transactions[0].transaction.employee_id, piet.id);
        assert_eq!(overview.transactions[0].key_number, UNKNOWN_KEY);
        assert_eq!(overview.summary.returned, 1);
        assert_eq!(overview.summary.issued, 0);

        let by_notes = TransactionFilter {
            search: Some("LATE".to_string()),
            ..Default::default()
        };
        assert_eq!(transaction_overview(&snapshot, &by_notes, NOW).transactions.len(), 1);
    }
}
