//! Human readable energy and power values.

use crate::model::{Watts, Wh};

fn scaled(value: f64, unit: &str) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let value = value.abs();

    if value > 1_000_000.0 {
        format!("{}{:.1}M{}", sign, value / 1_000_000.0, unit)
    } else if value > 1_000.0 {
        format!("{}{:.1}k{}", sign, value / 1_000.0, unit)
    } else {
        format!("{}{:.1}{}", sign, value, unit)
    }
}

pub fn energy(wh: Wh) -> String {
    scaled(wh, "Wh")
}

pub fn power(w: Watts) -> String {
    scaled(w, "W")
}
