/// Format whole rupees with Indian digit grouping: ₹1,23,456.
pub fn format_inr(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let grouped = if digits.len() <= 3 {
        digits
    } else {
        let (head, tail) = digits.split_at(digits.len() - 3);
        let mut groups: Vec<&str> = Vec::new();
        let mut end = head.len();
        while end > 2 {
            groups.push(&head[end - 2..end]);
            end -= 2;
        }
        groups.push(&head[..end]);
        groups.reverse();
        format!("{},{}", groups.join(","), tail)
    };

    if amount < 0 {
        format!("-\u{20b9}{}", grouped)
    } else {
        format!("\u{20b9}{}", grouped)
    }
}

pub fn format_percent(value: u32) -> String {
    format!("{}%", value)
}

pub fn format_seconds(secs: f64) -> String {
    format!("{:.1}s", secs)
}

pub fn format_hours(hours: f64) -> String {
    format!("{:.1}h", hours)
}
