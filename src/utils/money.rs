// Helpers for whole-unit payment amounts

/// Returns the amount if it can be charged, `None` for zero.
pub fn validate_amount(amount: u64) -> Option<u64> {
    (amount > 0).then_some(amount)
}

/// Formats an amount with thousands separators, e.g. `5,000 KHR`.
pub fn format_amount(amount: u64, currency: &str) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if currency.is_empty() {
        grouped
    } else {
        format!("{} {}", grouped, currency)
    }
}
