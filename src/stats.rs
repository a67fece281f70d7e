//! Reductions over meal history: windowed totals, per-day grouping,
//! week-over-week deltas and the month calendar.
//!
//! Nothing here touches the store or the clock; callers pass `now` and the
//! timezone that defines a "day".

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Macros, MealRecord};

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub count: usize,
    pub total_calories: f64,
    /// Rounded to whole kcal; 0 when `count` is 0.
    pub average_calories: f64,
    pub totals_by_macro: Macros,
}

fn rounded_average(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        (total / count as f64).round()
    }
}

/// Sum the meals whose `created_at` falls inside `window`.
pub fn aggregate(meals: &[MealRecord], window: TimeWindow) -> Aggregate {
    let mut agg = Aggregate::default();
    for meal in meals.iter().filter(|m| window.contains(m.created_at)) {
        agg.count += 1;
        agg.total_calories += meal.calories;
        agg.totals_by_macro += meal.macros;
    }
    agg.average_calories = rounded_average(agg.total_calories, agg.count);
    agg
}

/// Calendar date of `at` in `tz`.
pub fn local_date<Tz: TimeZone>(at: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    at.with_timezone(tz).date_naive()
}

/// First instant of `date` in `tz`, as UTC.
pub fn local_midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let naive = date.and_time(chrono::NaiveTime::MIN);
    // Zones that skip midnight on a DST change start the day an hour later
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc())
}

/// The local calendar day `date` as a UTC window.
pub fn day_window<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> TimeWindow {
    let next = date.succ_opt().unwrap_or(date);
    TimeWindow::new(local_midnight(date, tz), local_midnight(next, tz))
}

/// The calendar month `year`/`month` as a UTC window, or `None` for an
/// invalid month.
pub fn month_window<Tz: TimeZone>(year: i32, month: u32, tz: &Tz) -> Option<TimeWindow> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some(TimeWindow::new(
        local_midnight(first, tz),
        local_midnight(next, tz),
    ))
}

/// Group meals by local calendar day. The map iterates oldest day first;
/// reverse it for a newest-first history view.
pub fn group_by_day<Tz: TimeZone>(
    meals: &[MealRecord],
    tz: &Tz,
) -> BTreeMap<NaiveDate, Vec<MealRecord>> {
    let mut groups: BTreeMap<NaiveDate, Vec<MealRecord>> = BTreeMap::new();
    for meal in meals {
        groups
            .entry(local_date(meal.created_at, tz))
            .or_default()
            .push(meal.clone());
    }
    groups
}

/// Percentage change from `previous` to `current`, rounded.
///
/// Defined as 0 when `previous` is 0, whatever `current` is.
pub fn percent_change(current: f64, previous: f64) -> i64 {
    if previous == 0.0 {
        return 0;
    }
    (((current - previous) / previous) * 100.0).round() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekComparison {
    pub meals_change: i64,
    pub calories_change: i64,
    pub average_calories_change: i64,
    pub protein_change: i64,
    pub carbs_change: i64,
    pub fat_change: i64,
}

pub fn week_over_week(current: &Aggregate, previous: &Aggregate) -> WeekComparison {
    let cur = &current.totals_by_macro;
    let prev = &previous.totals_by_macro;
    WeekComparison {
        meals_change: percent_change(current.count as f64, previous.count as f64),
        calories_change: percent_change(current.total_calories, previous.total_calories),
        average_calories_change: percent_change(
            current.average_calories,
            previous.average_calories,
        ),
        protein_change: percent_change(cur.protein, prev.protein),
        carbs_change: percent_change(cur.carbs, prev.carbs),
        fat_change: percent_change(cur.fat, prev.fat),
    }
}

/// The trailing seven days ending at `now`, and the seven days before that.
pub fn week_windows(now: DateTime<Utc>) -> (TimeWindow, TimeWindow) {
    let week_ago = now - Duration::days(7);
    let two_weeks_ago = week_ago - Duration::days(7);
    (
        TimeWindow::new(week_ago, now),
        TimeWindow::new(two_weeks_ago, week_ago),
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub meals_count: usize,
    pub total_calories: f64,
}

/// Meals logged on the local calendar day containing `now`.
pub fn today_stats<Tz: TimeZone>(meals: &[MealRecord], now: DateTime<Utc>, tz: &Tz) -> DailySummary {
    let agg = aggregate(meals, day_window(local_date(now, tz), tz));
    DailySummary {
        meals_count: agg.count,
        total_calories: agg.total_calories,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyStats {
    pub total_meals: usize,
    pub total_calories: f64,
    pub average_calories: f64,
    pub days_with_meals: usize,
}

/// Totals for one calendar month, or `None` for an invalid month.
pub fn monthly_stats<Tz: TimeZone>(
    meals: &[MealRecord],
    year: i32,
    month: u32,
    tz: &Tz,
) -> Option<MonthlyStats> {
    let window = month_window(year, month, tz)?;
    let agg = aggregate(meals, window);
    let days: BTreeSet<NaiveDate> = meals
        .iter()
        .filter(|m| window.contains(m.created_at))
        .map(|m| local_date(m.created_at, tz))
        .collect();

    Some(MonthlyStats {
        total_meals: agg.count,
        total_calories: agg.total_calories,
        average_calories: agg.average_calories,
        days_with_meals: days.len(),
    })
}

/// Lifetime totals plus the trailing week, as shown on the profile page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub total_meals: usize,
    pub total_calories: f64,
    pub average_calories: f64,
    pub totals_by_macro: Macros,
    pub weekly_meals: usize,
    pub weekly_calories: f64,
}

pub fn profile_summary(meals: &[MealRecord], now: DateTime<Utc>) -> ProfileSummary {
    let mut summary = ProfileSummary::default();
    let (this_week, _) = week_windows(now);

    for meal in meals {
        summary.total_meals += 1;
        summary.total_calories += meal.calories;
        summary.totals_by_macro += meal.macros;
        if this_week.contains(meal.created_at) {
            summary.weekly_meals += 1;
            summary.weekly_calories += meal.calories;
        }
    }
    summary.average_calories = rounded_average(summary.total_calories, summary.total_meals);
    summary
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub meal_count: usize,
    pub total_calories: f64,
}

/// A month laid out in Sunday-first weeks. Cells before the 1st and after
/// the last day are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthCalendar {
    pub year: i32,
    pub month: u32,
    pub weeks: Vec<[Option<CalendarDay>; 7]>,
}

impl MonthCalendar {
    pub fn days(&self) -> impl Iterator<Item = &CalendarDay> {
        self.weeks.iter().flatten().flatten()
    }

    pub fn day(&self, date: NaiveDate) -> Option<&CalendarDay> {
        self.days().find(|d| d.date == date)
    }
}

pub fn month_calendar<Tz: TimeZone>(
    meals: &[MealRecord],
    year: i32,
    month: u32,
    tz: &Tz,
) -> Option<MonthCalendar> {
    let window = month_window(year, month, tz)?;
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;

    let in_month: Vec<MealRecord> = meals
        .iter()
        .filter(|m| window.contains(m.created_at))
        .cloned()
        .collect();
    let by_day = group_by_day(&in_month, tz);

    let mut weeks = Vec::new();
    let mut week: [Option<CalendarDay>; 7] = [None; 7];
    let mut slot = first.weekday().num_days_from_sunday() as usize;

    let mut date = first;
    while date.month() == month {
        let day_meals = by_day.get(&date).map(Vec::as_slice).unwrap_or_default();
        week[slot] = Some(CalendarDay {
            date,
            meal_count: day_meals.len(),
            total_calories: day_meals.iter().map(|m| m.calories).sum(),
        });
        slot += 1;
        if slot == 7 {
            weeks.push(week);
            week = [None; 7];
            slot = 0;
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }
    if slot > 0 {
        weeks.push(week);
    }

    Some(MonthCalendar { year, month, weeks })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_change_guards_zero_baseline() {
        assert_eq!(percent_change(5.0, 0.0), 0);
        assert_eq!(percent_change(0.0, 0.0), 0);
        assert_eq!(percent_change(150.0, 100.0), 50);
        assert_eq!(percent_change(50.0, 100.0), -50);
    }

    #[test]
    fn window_is_half_open() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        let window = TimeWindow::new(start, end);
        assert!(window.contains(start));
        assert!(!window.contains(end));
    }

    #[test]
    fn month_window_rejects_bad_month() {
        assert!(month_window(2025, 13, &Utc).is_none());
        let dec = month_window(2025, 12, &Utc).unwrap();
        assert_eq!(dec.end, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
    }
}
