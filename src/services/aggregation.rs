//! Aggregation pipeline: turns raw Rally records into dashboard statistics.
//!
//! Every function here is a pure transformation of its arguments. Malformed
//! records are skipped, never reported as errors, and every output has a
//! fully populated (possibly zeroed) shape.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde_json::Value;
use tracing::debug;

use crate::models::analytics::percentage;
use crate::models::record::date_portion;
use crate::models::{
    DailyExecutionCount, Defect, ExecutionHistory, FailureDetail, FailureTrend,
    FailureTrendEntry, LatestStatus, RcaSummary, TestCase, TestCaseResult, TestSummary, Verdict,
};

/// Trailing window of the failure trend, in days.
pub const DEFAULT_TREND_WINDOW_DAYS: u32 = 10;

/// Output of [`summarize_test_cases`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestCaseSummary {
    pub summary: TestSummary,
    /// Valid test cases, in input order
    pub test_cases: Vec<TestCase>,
    /// Records dropped because they were malformed
    pub skipped: u64,
}

/// Normalize raw test case records and count verdicts.
///
/// Each valid record increments exactly one of passed/failed/other, so
/// `total_tests == passed + failed + other == test_cases.len()`.
pub fn summarize_test_cases(records: &[Value]) -> TestCaseSummary {
    let mut passed = 0;
    let mut failed = 0;
    let mut other = 0;
    let mut skipped = 0;
    let mut test_cases = Vec::with_capacity(records.len());

    for record in records {
        let test_case = match TestCase::from_record(record) {
            Ok(tc) => tc,
            Err(reason) => {
                debug!("Skipping test case record: {}", reason);
                skipped += 1;
                continue;
            }
        };

        match test_case.verdict {
            Verdict::Pass => passed += 1,
            Verdict::Fail => failed += 1,
            Verdict::Other(_) => other += 1,
        }
        test_cases.push(test_case);
    }

    TestCaseSummary {
        summary: TestSummary::from_counts(passed, failed, other),
        test_cases,
        skipped,
    }
}

/// Calendar date of a Rally timestamp, or `None` when it is not a
/// `YYYY-MM-DD` date (optionally followed by a time part).
pub fn run_date(date_time: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date_portion(date_time.trim()), "%Y-%m-%d").ok()
}

/// Per-day failure trend over `[anchor - window_days + 1, anchor]`.
///
/// Every date in the window is present, zeroed when nothing ran that day.
/// Test cases without a parseable run date, or run outside the window, are
/// ignored. Failure details are de-duplicated per day.
pub fn compute_failure_trend(
    test_cases: &[TestCase],
    window_days: u32,
    anchor: NaiveDate,
) -> FailureTrend {
    let mut trend: FailureTrend = (0..window_days)
        .filter_map(|offset| anchor.checked_sub_days(Days::new(u64::from(offset))))
        .map(|date| (date, FailureTrendEntry::default()))
        .collect();

    for test_case in test_cases {
        let Some(date_time) = test_case.date_time.as_deref() else {
            continue;
        };
        let Some(date) = run_date(date_time) else {
            debug!(
                "Invalid run date '{}' for test case {}",
                date_time, test_case.test_case_id
            );
            continue;
        };
        let Some(entry) = trend.get_mut(&date) else {
            continue;
        };

        entry.total += 1;
        if test_case.verdict.is_fail() {
            entry.failed += 1;
            let detail = FailureDetail::from(test_case);
            if !entry.failure_details.contains(&detail) {
                entry.failure_details.push(detail);
            }
        }
    }

    for entry in trend.values_mut() {
        entry.failure_rate = percentage(entry.failed, entry.total);
    }

    trend
}

/// Root-cause, monthly, severity, priority and state tallies over defects.
///
/// Non-object records are skipped; every other record is counted once in
/// each tally and listed in `defects`.
pub fn compute_rca_summary(records: &[Value]) -> RcaSummary {
    let mut rca = RcaSummary::default();

    for record in records {
        let defect = match Defect::from_record(record) {
            Ok(defect) => defect,
            Err(reason) => {
                debug!("Skipping defect record: {}", reason);
                continue;
            }
        };

        increment(&mut rca.rca_summary, &defect.root_cause);
        increment(
            rca.monthly_trend.entry(defect.month_key()).or_default(),
            &defect.root_cause,
        );
        increment(&mut rca.severity_distribution, &defect.severity);
        increment(&mut rca.priority_distribution, &defect.priority);
        increment(&mut rca.state_distribution, &defect.state);

        rca.total_defects += 1;
        rca.defects.push(defect);
    }

    rca
}

/// Execution counts per day and the newest status of each test case.
///
/// Results without a date are left out of the daily counts; for the latest
/// status, any dated result beats an undated one.
pub fn compute_result_history(results: &[TestCaseResult]) -> ExecutionHistory {
    let mut by_date: BTreeMap<String, DailyExecutionCount> = BTreeMap::new();
    let mut newest: BTreeMap<String, &TestCaseResult> = BTreeMap::new();

    for result in results {
        if result.has_date() {
            let day = by_date
                .entry(date_portion(&result.date).to_string())
                .or_default();
            day.total += 1;
            if result.verdict.is_fail() {
                day.failed += 1;
            }
        }

        let replace = match newest.get(&result.test_case_id) {
            None => true,
            Some(current) => sort_key(result) > sort_key(current),
        };
        if replace {
            newest.insert(result.test_case_id.clone(), result);
        }
    }

    let latest_by_test_case = newest
        .into_iter()
        .map(|(id, result)| {
            (
                id,
                LatestStatus {
                    date: date_portion(&result.date).to_string(),
                    status: result.verdict.as_str().to_string(),
                    build: result.build.clone(),
                },
            )
        })
        .collect();

    ExecutionHistory {
        by_date,
        latest_by_test_case,
    }
}

fn sort_key(result: &TestCaseResult) -> Option<&str> {
    result.has_date().then_some(result.date.as_str())
}

fn increment(tally: &mut BTreeMap<String, u64>, key: &str) {
    *tally.entry(key.to_string()).or_default() += 1;
}
