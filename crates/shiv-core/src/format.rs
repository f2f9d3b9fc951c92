//! Display and storage formatting helpers.

use rust_decimal::Decimal;
use time::{Date, Month};

use crate::totals::round_money;

/// Formats an amount with Indian digit grouping: the last three digits, then
/// groups of two (`12,34,567.89`).
pub fn format_inr(amount: Decimal) -> String {
    let rounded = round_money(amount);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let grouped = if int_part.len() <= 3 {
        int_part.to_string()
    } else {
        let (head, tail) = int_part.split_at(int_part.len() - 3);
        let mut groups: Vec<&str> = Vec::new();
        let mut end = head.len();
        while end > 0 {
            let start = end.saturating_sub(2);
            groups.push(&head[start..end]);
            end = start;
        }
        groups.reverse();
        format!("{},{}", groups.join(","), tail)
    };

    if negative {
        format!("-{grouped}.{frac_part}")
    } else {
        format!("{grouped}.{frac_part}")
    }
}

/// `₹` prefixed rendering for INR, `CODE amount` otherwise.
pub fn format_money(amount: Decimal, currency: &str) -> String {
    match currency {
        "INR" => format!("₹{}", format_inr(amount)),
        other => format!("{} {:.2}", other, round_money(amount)),
    }
}

/// `dd/mm/yyyy`
pub fn format_date(date: Date) -> String {
    format!("{:02}/{:02}/{:04}", date.day(), date.month() as u8, date.year())
}

pub fn date_to_iso(d: Date) -> String {
    format!("{:04}-{:02}-{:02}", d.year(), d.month() as u8, d.day())
}

pub fn parse_iso_date(s: &str) -> Option<Date> {
    let mut parts = s.trim().splitn(3, '-');
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = parts.next()?.parse::<u8>().ok()?;
    let day = parts.next()?.parse::<u8>().ok()?;
    Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()
}

pub fn first_of_month(d: Date) -> Date {
    d.replace_day(1).unwrap_or(d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::macros::date;

    #[test]
    fn indian_grouping() {
        assert_eq!(format_inr(dec!(0)), "0.00");
        assert_eq!(format_inr(dec!(999)), "999.00");
        assert_eq!(format_inr(dec!(1000)), "1,000.00");
        assert_eq!(format_inr(dec!(100000)), "1,00,000.00");
        assert_eq!(format_inr(dec!(1234567.891)), "12,34,567.89");
        assert_eq!(format_inr(dec!(-25000.5)), "-25,000.50");
    }

    #[test]
    fn money_prefix() {
        assert_eq!(format_money(dec!(1500), "INR"), "₹1,500.00");
        assert_eq!(format_money(dec!(12.5), "USD"), "USD 12.50");
    }

    #[test]
    fn dates() {
        let d = date!(2024 - 03 - 07);
        assert_eq!(format_date(d), "07/03/2024");
        assert_eq!(date_to_iso(d), "2024-03-07");
        assert_eq!(parse_iso_date("2024-03-07"), Some(d));
        assert_eq!(parse_iso_date("2024-02-30"), None);
        assert_eq!(parse_iso_date("garbage"), None);
        assert_eq!(first_of_month(d), date!(2024 - 03 - 01));
    }
}
