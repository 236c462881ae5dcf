//! Integration tests for statistics aggregation.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use pomotask_core::stats::{bucket_by, daily_counts, streak, Granularity, STREAK_WINDOW_DAYS};
use pomotask_core::{
    Database, FocusSession, ManualClock, SessionContext, SessionDraft, SessionLog, StatsReport,
    StatsRequest, StatsService, UserSettings,
};
use proptest::prelude::*;

fn session(started_at: DateTime<Utc>, minutes: u32) -> FocusSession {
    FocusSession {
        id: String::new(),
        owner_id: "owner-1".into(),
        task_id: None,
        task_title_snapshot: String::new(),
        duration_minutes: minutes,
        started_at,
        ended_at: started_at + Duration::minutes(i64::from(minutes)),
        completed: true,
        note: String::new(),
    }
}

fn arb_sessions() -> impl Strategy<Value = Vec<FocusSession>> {
    // Two years of start times from 2023-01-01, minute resolution.
    let base = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    prop::collection::vec((0i64..2 * 365 * 24 * 60, 1u32..=90), 0..200).prop_map(move |raw| {
        raw.into_iter()
            .map(|(offset, minutes)| session(base + Duration::minutes(offset), minutes))
            .collect()
    })
}

fn arb_granularity() -> impl Strategy<Value = Granularity> {
    prop_oneof![
        Just(Granularity::Day),
        Just(Granularity::Week),
        Just(Granularity::Month),
    ]
}

fn arb_offset() -> impl Strategy<Value = FixedOffset> {
    (-12i32..=14).prop_map(|h| FixedOffset::east_opt(h * 3600).unwrap())
}

proptest! {
    #[test]
    fn bucket_counts_sum_to_session_count(
        sessions in arb_sessions(),
        granularity in arb_granularity(),
        offset in arb_offset(),
    ) {
        let buckets = bucket_by(&sessions, granularity, offset);
        let count: u32 = buckets.iter().map(|b| b.count).sum();
        let minutes: u32 = buckets.iter().map(|b| b.total_minutes).sum();
        prop_assert_eq!(count as usize, sessions.len());
        prop_assert_eq!(minutes, sessions.iter().map(|s| s.duration_minutes).sum::<u32>());
    }

    #[test]
    fn bucketing_is_idempotent_and_sorted(
        sessions in arb_sessions(),
        granularity in arb_granularity(),
        offset in arb_offset(),
    ) {
        let first = bucket_by(&sessions, granularity, offset);
        let second = bucket_by(&sessions, granularity, offset);
        prop_assert_eq!(&first, &second);
        prop_assert!(first.windows(2).all(|w| w[0].key < w[1].key));
        prop_assert!(first.iter().all(|b| b.count > 0));
    }

    #[test]
    fn bucket_order_ignores_input_order(sessions in arb_sessions(), offset in arb_offset()) {
        let mut reversed = sessions.clone();
        reversed.reverse();
        prop_assert_eq!(
            bucket_by(&sessions, Granularity::Week, offset),
            bucket_by(&reversed, Granularity::Week, offset)
        );
    }

    #[test]
    fn streak_never_exceeds_window(sessions in arb_sessions()) {
        let today = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let daily = daily_counts(&sessions, Utc.fix());
        let days = streak(&daily, today, STREAK_WINDOW_DAYS);
        prop_assert!(days <= STREAK_WINDOW_DAYS);
        if days > 0 {
            prop_assert!(daily.contains_key(&today));
        }
    }
}

#[test]
fn test_streak_today_yesterday_and_three_days_ago() {
    let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
    let at = |d: u32| Utc.with_ymd_and_hms(2024, 6, d, 10, 0, 0).unwrap();
    let sessions = vec![session(at(10), 25), session(at(9), 25), session(at(7), 25)];
    let daily = daily_counts(&sessions, Utc.fix());
    assert_eq!(streak(&daily, today, STREAK_WINDOW_DAYS), 2);
}

#[test]
fn test_batch_statistics_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_at(dir.path().join("stats.db")).unwrap();
    let clock = ManualClock::at(Utc.with_ymd_and_hms(2024, 6, 10, 18, 0, 0).unwrap());
    let ctx = SessionContext::new(
        "owner-1",
        UserSettings::default(),
        Arc::new(clock),
        Utc.fix(),
    );

    let log = SessionLog::new(&db, &ctx);
    for (day, hour) in [(3, 9), (3, 10), (5, 9), (9, 9), (10, 9), (10, 14)] {
        let start = Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap();
        log.record(&SessionDraft {
            task_id: None,
            task_title_snapshot: String::new(),
            duration_minutes: 25,
            started_at: start,
            ended_at: start + Duration::minutes(25),
        })
        .unwrap();
    }

    let stats = StatsService::new(&db, &ctx);
    let june = |d| NaiveDate::from_ymd_opt(2024, 6, d).unwrap();

    let weekly = stats.weekly(june(1), june(30)).unwrap();
    let keys: Vec<_> = weekly.iter().map(|b| (b.key.as_str(), b.count)).collect();
    assert_eq!(keys, [("2024-06-03", 4), ("2024-06-10", 2)]);

    let StatsReport::Buckets(monthly) = stats
        .run(&StatsRequest::Monthly {
            start: june(1),
            end: june(30),
        })
        .unwrap()
    else {
        panic!("expected buckets");
    };
    assert_eq!(monthly.len(), 1);
    assert_eq!(monthly[0].total_minutes, 150);

    let week = stats.week().unwrap();
    assert_eq!(week.streak_days, 2);
    assert_eq!(week.max_daily, 2);
    assert_eq!(week.days.last().map(|d| d.label.as_str()), Some("today"));
}
