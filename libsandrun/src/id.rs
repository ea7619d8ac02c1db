//! Container ID validation: `[\w+\-.]+`, but bare `.` is rejected even
//! though it matches the character class.

pub fn validate(id: &str) -> bool {
    if id.is_empty() || id == "." || id == ".." {
        return false;
    }

    id.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '+' || c == '-' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_ids() {
        for id in ["", "a/b", "a b", "a:b", "."] {
            assert!(!validate(id), "expected {id:?} to be rejected");
        }
    }

    #[test]
    fn accepts_valid_ids() {
        for id in ["a", "a.b", "A_1", "x+y"] {
            assert!(validate(id), "expected {id:?} to be accepted");
        }
    }
}
