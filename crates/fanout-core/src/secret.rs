use nanoid::nanoid;

pub const SECRET_PREFIX: &str = "whsec_";
const SECRET_LENGTH: usize = 32;

/// Generate a fresh signing secret. Used on endpoint creation and rotation;
/// secrets are never derived from endpoint metadata.
pub fn generate_secret() -> String {
    format!("{}{}", SECRET_PREFIX, nanoid!(SECRET_LENGTH))
}

/// Masked form shown everywhere except the create and rotate responses.
pub fn mask_secret(secret: &str) -> String {
    let tail = secret.chars().rev().take(4).collect::<Vec<_>>();
    let tail: String = tail.into_iter().rev().collect();
    format!("{}****{}", SECRET_PREFIX, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_secret_shape() {
        let secret = generate_secret();
        assert!(secret.starts_with(SECRET_PREFIX));
        assert_eq!(secret.len(), SECRET_PREFIX.len() + SECRET_LENGTH);
    }

    #[test]
    fn test_generate_secret_uniqueness() {
        let a = generate_secret();
        let b = generate_secret();
        assert_ne!(a, b, "generated secrets should be unique");
    }

    #[test]
    fn test_mask_secret_hides_body() {
        let secret = generate_secret();
        let masked = mask_secret(&secret);
        assert!(masked.starts_with("whsec_****"));
        assert!(!masked.contains(&secret[SECRET_PREFIX.len()..secret.len() - 4]));
        assert!(secret.ends_with(&masked[masked.len() - 4..]));
    }
}
