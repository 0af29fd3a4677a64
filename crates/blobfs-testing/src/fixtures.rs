//! Common test fixtures for blobfs testing

use rand::Rng;

/// The text stored in every test account's preexisting object
pub const LOREM_IPSUM: &str = r#"
Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod tempor
incididunt ut labore et dolore magna aliqua. Ut enim ad minim veniam, quis
nostrud exercitation ullamco laboris nisi ut aliquip ex ea commodo consequat.
Duis aute irure dolor in reprehenderit in voluptate velit esse cillum dolore eu
fugiat nulla pariatur. Excepteur sint occaecat cupidatat non proident, sunt in
culpa qui officia deserunt mollit anim id est laborum.
"#;

const FILLERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// `count` random lowercase letters and digits
pub fn random_chars(rng: &mut impl Rng, count: usize) -> String {
    (0..count)
        .map(|_| FILLERS[rng.gen_range(0..FILLERS.len())] as char)
        .collect()
}

/// A `width`-byte line starting with `lineno`, padded with random characters and ending in `\n`
pub fn random_line(rng: &mut impl Rng, lineno: usize, width: usize) -> String {
    let mut line = format!("{}:    ", lineno);
    let padding = width.saturating_sub(line.len() + 1);
    line.push_str(&random_chars(rng, padding));
    line.push('\n');
    line
}

/// `count` random lines numbered from 1, each exactly `width` bytes
pub fn random_lines(rng: &mut impl Rng, count: usize, width: usize) -> Vec<String> {
    (1..=count).map(|lineno| random_line(rng, lineno, width)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_lorem_ipsum_size() {
        assert_eq!(LOREM_IPSUM.len(), 447);
    }

    #[test]
    fn test_lines_have_fixed_width() {
        let mut rng = StdRng::seed_from_u64(42);
        let lines = random_lines(&mut rng, 100, 100);
        assert_eq!(lines.len(), 100);
        for (index, line) in lines.iter().enumerate() {
            assert_eq!(line.len(), 100);
            assert!(line.starts_with(&format!("{}:", index + 1)));
            assert!(line.ends_with('\n'));
        }
    }
}
