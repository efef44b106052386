/// Render an amount held in minor units (paisa) for display, e.g. `PKR 1,234.50`.
pub fn format_amount(minor: i64, currency: &str) -> String {
    let negative = minor < 0;
    let abs = minor.unsigned_abs();
    let major = abs / 100;
    let cents = abs % 100;

    let digits = major.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if negative { "-" } else { "" };
    format!("{}{} {}.{:02}", sign, currency, grouped, cents)
}

/// Round minor units half-up to `decimals` places of the major unit (at most 2).
pub fn round_minor(minor: i64, decimals: usize) -> i64 {
    let step = 10_i64.pow(2 - decimals.min(2) as u32);
    let remainder = minor.rem_euclid(step);
    let down = minor - remainder;
    if remainder * 2 >= step {
        down + step
    } else {
        down
    }
}

/// Major-unit decimal string with `decimals` places (at most 2), rounded
/// like [`round_minor`].
pub fn to_major_string(minor: i64, decimals: usize) -> String {
    let decimals = decimals.min(2);
    let rounded = round_minor(minor, decimals);
    let sign = if rounded < 0 { "-" } else { "" };
    let abs = rounded.unsigned_abs();
    let (major, cents) = (abs / 100, abs % 100);
    match decimals {
        0 => format!("{}{}", sign, major),
        1 => format!("{}{}.{}", sign, major, cents / 10),
        _ => format!("{}{}.{:02}", sign, major, cents),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount_groups_thousands() {
        assert_eq!(format_amount(123_450, "PKR"), "PKR 1,234.50");
        assert_eq!(format_amount(100_000_000, "PKR"), "PKR 1,000,000.00");
        assert_eq!(format_amount(5, "PKR"), "PKR 0.05");
        assert_eq!(format_amount(0, "PKR"), "PKR 0.00");
    }

    #[test]
    fn test_format_amount_negative() {
        assert_eq!(format_amount(-2_500, "PKR"), "-PKR 25.00");
    }

    #[test]
    fn test_to_major_string() {
        assert_eq!(to_major_string(150_050, 1), "1500.5");
        assert_eq!(to_major_string(150_000, 2), "1500.00");
        assert_eq!(to_major_string(12_345, 1), "123.5");
        assert_eq!(to_major_string(84_915, 1), "849.2");
        assert_eq!(to_major_string(84_914, 1), "849.1");
        assert_eq!(to_major_string(99_999, 0), "1000");
    }

    #[test]
    fn test_round_minor_half_up() {
        assert_eq!(round_minor(12_345, 1), 12_350);
        assert_eq!(round_minor(84_915, 1), 84_920);
        assert_eq!(round_minor(84_914, 1), 84_910);
        assert_eq!(round_minor(123_455, 2), 123_455);
        assert_eq!(round_minor(149, 0), 100);
    }
}
