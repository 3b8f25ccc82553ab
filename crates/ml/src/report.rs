//! Human-readable rendering of a [`PredictionResult`].

use std::fmt;

use chrono::Month;

use crate::predictor::PredictionResult;

/// Format an amount as Singapore dollars with thousands separators,
/// e.g. `S$ 512,345.67`.
pub fn format_sgd(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("S$ {sign}{grouped}.{cents}")
}

fn month_name(month: u32) -> String {
    u8::try_from(month)
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .map(|m| m.name().to_string())
        .unwrap_or_else(|| format!("month {month}"))
}

impl fmt::Display for PredictionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.context;
        writeln!(f, "Predicted resale price: {}", format_sgd(self.price))?;
        writeln!(
            f,
            "For {} in {} (expected: {} {})",
            c.flat_type,
            c.town,
            month_name(c.sale_month),
            c.sale_year
        )?;
        writeln!(f)?;
        writeln!(f, "Property details:")?;
        writeln!(
            f,
            "  Floor area: {:.1} sqm ({:.1} sqft)",
            c.floor_area_sqm, c.floor_area_sqft
        )?;
        writeln!(
            f,
            "  Lease commencement year: {}",
            c.lease_commencement_year
        )?;
        writeln!(
            f,
            "  Remaining lease (at sale): {:.1} years",
            c.remaining_lease_years
        )?;
        writeln!(f, "  Storey (average): {:.1}", c.storey_avg)?;
        writeln!(f, "Unit details:")?;
        writeln!(f, "  Town: {}", c.town)?;
        if let Some(code) = &c.postal_code {
            writeln!(f, "  Postal code: {code}")?;
        }
        writeln!(f, "  Flat type: {}", c.flat_type)?;
        write!(f, "  Flat model: {}", c.flat_model)
    }
}
