// SPDX-License-Identifier: MIT

//! Calendar arithmetic for the date actions
//!
//! Working days are Monday to Friday. The fiscal year ends on the last day of
//! the configured month.

use chrono::{Datelike, Months, NaiveDate, Weekday};

fn first_of_month(year: i32, month: u32) -> NaiveDate {
    // month is always 1..=12 here and day 1 exists in every month
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn last_of_month(year: i32, month: u32) -> NaiveDate {
    let first = first_of_month(year, month);
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(first)
}

fn is_working_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn next_working_day(mut date: NaiveDate) -> NaiveDate {
    while !is_working_day(date) {
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }
    date
}

fn previous_working_day(mut date: NaiveDate) -> NaiveDate {
    while !is_working_day(date) {
        match date.pred_opt() {
            Some(prev) => date = prev,
            None => break,
        }
    }
    date
}

fn quarter_start_month(date: NaiveDate) -> u32 {
    (date.month0() / 3) * 3 + 1
}

pub fn end_of_month(date: NaiveDate) -> NaiveDate {
    last_of_month(date.year(), date.month())
}

pub fn end_of_quarter(date: NaiveDate) -> NaiveDate {
    last_of_month(date.year(), quarter_start_month(date) + 2)
}

pub fn end_of_fiscal_year(date: NaiveDate, year_end_month: u32) -> NaiveDate {
    let year = if date.month() <= year_end_month {
        date.year()
    } else {
        date.year() + 1
    };
    last_of_month(year, year_end_month)
}

fn start_of_fiscal_year(date: NaiveDate, year_end_month: u32) -> NaiveDate {
    let end = end_of_fiscal_year(date, year_end_month);
    end.checked_sub_months(Months::new(12))
        .and_then(|d| d.succ_opt())
        .map(|d| first_of_month(d.year(), d.month()))
        .unwrap_or(end)
}

pub fn first_working_day_of_month(date: NaiveDate) -> NaiveDate {
    next_working_day(first_of_month(date.year(), date.month()))
}

pub fn first_working_day_of_quarter(date: NaiveDate) -> NaiveDate {
    next_working_day(first_of_month(date.year(), quarter_start_month(date)))
}

pub fn first_working_day_of_fiscal_year(date: NaiveDate, year_end_month: u32) -> NaiveDate {
    next_working_day(start_of_fiscal_year(date, year_end_month))
}

pub fn last_working_day_of_month(date: NaiveDate) -> NaiveDate {
    previous_working_day(end_of_month(date))
}

pub fn last_working_day_of_quarter(date: NaiveDate) -> NaiveDate {
    previous_working_day(end_of_quarter(date))
}

pub fn last_working_day_of_fiscal_year(date: NaiveDate, year_end_month: u32) -> NaiveDate {
    previous_working_day(end_of_fiscal_year(date, year_end_month))
}
