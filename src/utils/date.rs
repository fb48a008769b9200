//! Calendar helpers.

use chrono::{Datelike, Local, NaiveDate};

/// Age in whole years on `today` for someone born on `birthday`.
///
/// The year difference is decremented when today's (month, day) comes before
/// the birthday's, so `1999-09-12` is 24 on `2024-09-11` and 25 on `2024-09-12`.
pub fn age_on(birthday: NaiveDate, today: NaiveDate) -> i32 {
    let age = today.year() - birthday.year();
    if (today.month(), today.day()) < (birthday.month(), birthday.day()) {
        age - 1
    } else {
        age
    }
}

/// Age in whole years as of the local date.
pub fn age_today(birthday: NaiveDate) -> i32 {
    age_on(birthday, Local::now().date_naive())
}
