pub struct AuthService;

impl AuthService {
    /// Compares a presented token with the configured admin token.
    ///
    /// Every byte is inspected even after a mismatch, so the time taken does not
    /// reveal how long a matching prefix was.
    pub fn is_valid_token(expected: &str, token: &str) -> bool {
        let (a, b) = (expected.as_bytes(), token.as_bytes());
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}
