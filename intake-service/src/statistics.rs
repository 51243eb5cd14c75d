use chrono::{DateTime, Local, LocalResult, NaiveDate, TimeZone, Utc};
use common::{CaseStore, Statistics, StoreResult};

/// Recompute totals from the store; nothing is cached between calls
pub async fn collect_statistics(
    store: &dyn CaseStore,
    now: DateTime<Local>,
) -> StoreResult<Statistics> {
    let since = start_of_local_day(now.date_naive());

    let total = store.count_all().await?;
    let today = store.count_submitted_since(since).await?;
    let status_counts = store.count_by_status().await?;

    Ok(Statistics {
        total,
        today,
        status_counts,
    })
}

/// 00:00:00 server-local time on `date`, as UTC.
///
/// When midnight does not exist locally (a DST gap) the earliest valid
/// instant of that day is used.
pub fn start_of_local_day(date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    match Local.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let shifted = midnight + chrono::Duration::hours(1);
            Local
                .from_local_datetime(&shifted)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
        }
    }
}
