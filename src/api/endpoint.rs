use chrono::NaiveDate;

pub type Endpoint = str;

pub const SOLAR_EDGE: &str = "solar-edge";
pub const MY_ENERGI: &str = "my-energi";

pub const OVERVIEW: &Endpoint = "overview";
pub const ENERGY: &Endpoint = "energy";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Daily energy query between `start` and `end`, inclusive.
pub fn energy_query(start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "timeUnit=DAY&endDate={}&startDate={}",
        end.format(DATE_FORMAT),
        start.format(DATE_FORMAT)
    )
}

/// Hourly totals of `device` for `date`.
pub fn day_hour(device: &str, date: NaiveDate) -> String {
    format!("/cgi-jdayhour-E{}-{}", device, date.format(DATE_FORMAT))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn energy_query_covers_window() {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        assert_eq!(
            "timeUnit=DAY&endDate=2024-06-30&startDate=2024-06-01",
            energy_query(start, end)
        );
    }

    #[test]
    fn day_hour_path() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        assert_eq!("/cgi-jdayhour-E1234-2024-01-05", day_hour("1234", date));
    }
}
