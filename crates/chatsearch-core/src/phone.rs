/// Characters people type between phone number groups.
const SEPARATORS: [char; 6] = [' ', '-', '(', ')', '.', '\u{a0}'];

/// True when the query could be a phone number worth offering as a new contact.
pub fn is_viable_phone_number(query: &str) -> bool {
    let query = query.trim();
    let body = query.strip_prefix('+').unwrap_or(query);
    if body.is_empty() {
        return false;
    }

    let mut digits = 0;
    for c in body.chars() {
        if c.is_ascii_digit() {
            digits += 1;
        } else if !SEPARATORS.contains(&c) {
            return false;
        }
    }
    (3..=17).contains(&digits)
}

/// Digits only, used to compare numbers typed in different formats.
pub fn normalize_phone_number(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}
