/// Format an amount with thousands separators and a currency suffix:
/// `1,500,000 GNF`. Cents are shown only when the amount has them.
pub fn money(val: f64, currency: &str) -> String {
    let negative = val < 0.0;
    let cents = format!("{:.2}", val.abs());
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    let sign = if negative && cents != "0.00" { "-" } else { "" };
    let number = if dec_part == "00" {
        with_commas
    } else {
        format!("{with_commas}.{dec_part}")
    };
    if currency.is_empty() {
        format!("{sign}{number}")
    } else {
        format!("{sign}{number} {currency}")
    }
}

pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(1_500_000.0, "GNF"), "1,500,000 GNF");
        assert_eq!(money(-200_000.0, "GNF"), "-200,000 GNF");
        assert_eq!(money(0.0, "GNF"), "0 GNF");
        assert_eq!(money(1234.56, "EUR"), "1,234.56 EUR");
        assert_eq!(money(999.0, ""), "999");
    }

    #[test]
    fn test_money_negative_zero_has_no_sign() {
        assert_eq!(money(-0.001, "GNF"), "0 GNF");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
