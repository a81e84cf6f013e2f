use rand::Rng;

const ALPHABET: &[u8] = b"bcdfghjklmnpqrstvwxz2456789";
const SUFFIX_LENGTH: usize = 5;

/// Generates names for the branches updates are pushed to.
pub trait NameGenerator: Send + Sync {
    fn prefixed_name(&self, prefix: &str) -> String;
}

/// Appends a short random suffix to the prefix.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomNameGenerator;

impl NameGenerator for RandomNameGenerator {
    fn prefixed_name(&self, prefix: &str) -> String {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..SUFFIX_LENGTH)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        format!("{prefix}{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_name() {
        let name = RandomNameGenerator.prefixed_name("test-branch-");

        let suffix = name.strip_prefix("test-branch-").unwrap();
        assert_eq!(suffix.len(), SUFFIX_LENGTH);
        assert!(suffix.bytes().all(|c| ALPHABET.contains(&c)));
    }

    #[test]
    fn test_prefixed_names_differ() {
        let names: std::collections::HashSet<String> = (0..10)
            .map(|_| RandomNameGenerator.prefixed_name("image-"))
            .collect();

        assert!(names.len() > 1);
    }
}
