mod common;

use chrono::{Duration, FixedOffset, NaiveDate, Utc};
use common::{meal, utc};
use nutriscan::stats::{
    day_window, month_calendar, monthly_stats, profile_summary, today_stats, week_windows,
};
use nutriscan::{aggregate, group_by_day, week_over_week, Aggregate, TimeWindow};

#[test]
fn empty_window_is_all_zero() {
    let window = TimeWindow::new(utc(2025, 3, 1, 0, 0), utc(2025, 3, 2, 0, 0));
    let agg = aggregate(&[], window);
    assert_eq!(agg, Aggregate::default());
    assert_eq!(agg.average_calories, 0.0);
}

#[test]
fn aggregate_only_counts_meals_inside_window() {
    let meals = vec![
        meal("a", 500.0, 30.0, utc(2025, 3, 1, 8, 0)),
        meal("b", 700.0, 40.0, utc(2025, 3, 1, 13, 0)),
        meal("c", 900.0, 50.0, utc(2025, 3, 2, 0, 0)),
        meal("d", 300.0, 10.0, utc(2025, 2, 28, 23, 59)),
    ];
    let agg = aggregate(
        &meals,
        TimeWindow::new(utc(2025, 3, 1, 0, 0), utc(2025, 3, 2, 0, 0)),
    );

    assert_eq!(agg.count, 2);
    assert_eq!(agg.total_calories, 1200.0);
    assert_eq!(agg.average_calories, 600.0);
    assert_eq!(agg.totals_by_macro.protein, 70.0);
    assert_eq!(agg.totals_by_macro.carbs, 120.0);
}

#[test]
fn average_is_rounded() {
    let meals = vec![
        meal("a", 100.0, 0.0, utc(2025, 3, 1, 8, 0)),
        meal("b", 101.0, 0.0, utc(2025, 3, 1, 9, 0)),
    ];
    let agg = aggregate(
        &meals,
        TimeWindow::new(utc(2025, 3, 1, 0, 0), utc(2025, 3, 2, 0, 0)),
    );
    assert_eq!(agg.average_calories, 101.0);
}

#[test]
fn groups_by_local_day() {
    let tz = FixedOffset::west_opt(5 * 3600).unwrap();
    let meals = vec![
        meal("late", 400.0, 0.0, utc(2025, 3, 2, 3, 0)),
        meal("noon", 600.0, 0.0, utc(2025, 3, 1, 17, 0)),
        meal("next", 800.0, 0.0, utc(2025, 3, 2, 12, 0)),
    ];

    let by_day = group_by_day(&meals, &tz);
    let march_1 = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
    let march_2 = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();

    assert_eq!(by_day.len(), 2);
    let ids: Vec<&str> = by_day[&march_1].iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["late", "noon"]);
    assert_eq!(by_day[&march_2].len(), 1);
}

#[test]
fn today_stats_uses_local_midnight() {
    let tz = FixedOffset::east_opt(2 * 3600).unwrap();
    let now = utc(2025, 3, 1, 20, 0);
    let meals = vec![
        meal("before", 300.0, 0.0, utc(2025, 2, 28, 21, 59)),
        meal("first", 500.0, 0.0, utc(2025, 2, 28, 22, 0)),
        meal("dinner", 700.0, 0.0, utc(2025, 3, 1, 19, 0)),
    ];

    let summary = today_stats(&meals, now, &tz);
    assert_eq!(summary.meals_count, 2);
    assert_eq!(summary.total_calories, 1200.0);

    let window = day_window(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(), &tz);
    assert_eq!(window.start, utc(2025, 2, 28, 22, 0));
    assert_eq!(window.end - window.start, Duration::hours(24));
}

#[test]
fn monthly_stats_counts_distinct_days() {
    let meals = vec![
        meal("a", 500.0, 0.0, utc(2025, 2, 3, 8, 0)),
        meal("b", 700.0, 0.0, utc(2025, 2, 3, 18, 0)),
        meal("c", 650.0, 0.0, utc(2025, 2, 20, 12, 0)),
        meal("d", 900.0, 0.0, utc(2025, 3, 1, 0, 0)),
    ];

    let stats = monthly_stats(&meals, 2025, 2, &Utc).unwrap();
    assert_eq!(stats.total_meals, 3);
    assert_eq!(stats.total_calories, 1850.0);
    assert_eq!(stats.average_calories, 617.0);
    assert_eq!(stats.days_with_meals, 2);

    assert!(monthly_stats(&meals, 2025, 0, &Utc).is_none());
}

#[test]
fn month_calendar_starts_on_sunday() {
    // 1 March 2025 is a Saturday
    let meals = vec![
        meal("a", 500.0, 0.0, utc(2025, 3, 1, 8, 0)),
        meal("b", 250.0, 0.0, utc(2025, 3, 1, 12, 0)),
        meal("c", 800.0, 0.0, utc(2025, 3, 31, 19, 0)),
    ];
    let calendar = month_calendar(&meals, 2025, 3, &Utc).unwrap();

    assert_eq!(calendar.weeks.len(), 6);
    assert!(calendar.weeks[0][..6].iter().all(Option::is_none));
    let first = calendar.weeks[0][6].unwrap();
    assert_eq!(first.date, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
    assert_eq!(first.meal_count, 2);
    assert_eq!(first.total_calories, 750.0);

    assert_eq!(calendar.days().count(), 31);
    let last = calendar
        .day(NaiveDate::from_ymd_opt(2025, 3, 31).unwrap())
        .unwrap();
    assert_eq!(last.meal_count, 1);
    assert_eq!(
        calendar
            .day(NaiveDate::from_ymd_opt(2025, 3, 15).unwrap())
            .unwrap()
            .meal_count,
        0
    );
}

#[test]
fn week_over_week_with_empty_previous_week() {
    let now = utc(2025, 3, 15, 12, 0);
    let meals = vec![
        meal("a", 500.0, 30.0, now - Duration::days(1)),
        meal("b", 700.0, 30.0, now - Duration::days(3)),
    ];
    let (this_week, last_week) = week_windows(now);
    let change = week_over_week(&aggregate(&meals, this_week), &aggregate(&meals, last_week));

    assert_eq!(change.meals_change, 0);
    assert_eq!(change.calories_change, 0);
    assert_eq!(change.protein_change, 0);
}

#[test]
fn week_over_week_reports_percentages() {
    let now = utc(2025, 3, 15, 12, 0);
    let meals = vec![
        meal("a", 600.0, 40.0, now - Duration::days(1)),
        meal("b", 600.0, 40.0, now - Duration::days(2)),
        meal("c", 800.0, 20.0, now - Duration::days(8)),
    ];
    let (this_week, last_week) = week_windows(now);
    let current = aggregate(&meals, this_week);
    let previous = aggregate(&meals, last_week);
    let change = week_over_week(&current, &previous);

    assert_eq!(change.meals_change, 100);
    assert_eq!(change.calories_change, 50);
    assert_eq!(change.average_calories_change, -25);
    assert_eq!(change.protein_change, 300);
}

#[test]
fn profile_summary_splits_trailing_week() {
    let now = utc(2025, 3, 15, 12, 0);
    let meals = vec![
        meal("a", 500.0, 20.0, now - Duration::days(2)),
        meal("b", 300.0, 10.0, now - Duration::days(30)),
    ];
    let summary = profile_summary(&meals, now);

    assert_eq!(summary.total_meals, 2);
    assert_eq!(summary.total_calories, 800.0);
    assert_eq!(summary.average_calories, 400.0);
    assert_eq!(summary.totals_by_macro.protein, 30.0);
    assert_eq!(summary.weekly_meals, 1);
    assert_eq!(summary.weekly_calories, 500.0);
}

#[test]
fn profile_summary_ignores_future_meals_for_the_week() {
    let now = utc(2025, 3, 15, 12, 0);
    let meals = vec![
        meal("tomorrow", 900.0, 0.0, now + Duration::days(1)),
        meal("today", 400.0, 0.0, now - Duration::hours(2)),
    ];
    let summary = profile_summary(&meals, now);

    assert_eq!(summary.total_meals, 2);
    assert_eq!(summary.weekly_meals, 1);
    assert_eq!(summary.weekly_calories, 400.0);
}
