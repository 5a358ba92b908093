//! Prompt Templates for the congratulatory email
//!
//! Both providers receive the same system instruction and user prompt.

pub const SYSTEM_PROMPT: &str = "You are a professional business email writer. Generate congratulatory emails for won deals that are warm, professional, and express genuine appreciation. Keep emails concise (3-4 paragraphs) and appropriate for business communication.";

/// Formats a dollar amount the way en-US currency formatting does: `$15,000.00`
pub fn format_usd(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}${}.{}", sign, grouped, cents)
}

/// Build the user prompt for a won deal
pub fn build_email_prompt(deal_name: &str, deal_value: f64, contact_name: &str) -> String {
    format!(
        r#"Generate a professional congratulatory email for winning a deal with the following details:
- Deal Name: {}
- Deal Value: {}
- Contact Name: {}

The email should:
1. Congratulate the contact on closing the deal
2. Reference the specific deal name and value
3. Express appreciation for their business
4. Look forward to future collaboration
5. Be warm but professional in tone
6. Include appropriate greeting and closing

Format the email with proper structure (greeting, body paragraphs, closing)."#,
        deal_name,
        format_usd(deal_value),
        contact_name
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(15000.0), "$15,000.00");
        assert_eq!(format_usd(999.5), "$999.50");
        assert_eq!(format_usd(1234567.891), "$1,234,567.89");
        assert_eq!(format_usd(0.1), "$0.10");
    }

    #[test]
    fn test_prompt_mentions_deal_details() {
        let prompt = build_email_prompt("Acme Contract", 15000.0, "Jane Doe");
        assert!(prompt.contains("- Deal Name: Acme Contract"));
        assert!(prompt.contains("- Deal Value: $15,000.00"));
        assert!(prompt.contains("- Contact Name: Jane Doe"));
    }
}
