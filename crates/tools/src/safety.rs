//! Command Safety Classification
//!
//! Tags a raw shell-like command string with a risk tier. Pure and
//! deterministic: case-sensitive matching against two ordered lists, with
//! the dangerous list always consulted first. The classifier only labels;
//! granting elevation is the caller's decision.

use serde::{Deserialize, Serialize};

/// Risk tier of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyTier {
    /// Proceeds silently
    Safe,
    /// Requires explicit approval before execution
    NeedsConfirmation,
    /// Refused unless the caller runs elevated
    Dangerous,
}

impl SafetyTier {
    /// Serialization name for the streaming event
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyTier::Safe => "safe",
            SafetyTier::NeedsConfirmation => "needs_confirmation",
            SafetyTier::Dangerous => "dangerous",
        }
    }
}

impl std::fmt::Display for SafetyTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

const DEFAULT_DANGEROUS_PATTERNS: &[&str] = &[
    "rm -rf /",
    "rm -rf ~",
    "rm -rf *",
    "sudo rm",
    ":(){:|:&};:",
    ":(){ :|:& };:",
    "dd if=",
    "mkfs",
    "> /dev/sd",
    "chmod -R 777 /",
    "shutdown",
    "reboot",
];

const DEFAULT_SAFE_PREFIXES: &[&str] = &[
    "ls",
    "pwd",
    "cat ",
    "echo ",
    "git status",
    "git diff",
    "git log",
    "head ",
    "tail ",
    "grep ",
    "find ",
    "wc ",
    "which ",
    "whoami",
    "date",
    "tree",
];

/// Operators that chain or redirect commands. A command containing any of
/// them is never considered safe, whatever its prefix.
const COMPOUND_OPERATORS: &[&str] = &["&&", "||", ";", "|", "`", "$(", ">", "<", "&"];

/// Arguments that give an otherwise read-only program side effects. A safe
/// prefix never covers a command passing one of them; matched as a prefix
/// of each word so `-execdir` and `--set=...` are caught too.
const SIDE_EFFECT_ARGUMENTS: &[(&str, &[&str])] = &[
    ("find", &["-delete", "-exec", "-ok", "-fprint", "-fls"]),
    ("tree", &["-o"]),
    ("date", &["-s", "--set"]),
];

/// Command classifier. Built once, then shared read-only.
#[derive(Debug, Clone)]
pub struct SafetyClassifier {
    dangerous_patterns: Vec<String>,
    safe_prefixes: Vec<String>,
}

impl Default for SafetyClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SafetyClassifier {
    /// Classifier with the built-in lists.
    pub fn new() -> Self {
        Self::with_lists(
            DEFAULT_DANGEROUS_PATTERNS.iter().map(|s| s.to_string()).collect(),
            DEFAULT_SAFE_PREFIXES.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Classifier with exactly the given lists.
    pub fn with_lists(dangerous_patterns: Vec<String>, safe_prefixes: Vec<String>) -> Self {
        Self {
            dangerous_patterns,
            safe_prefixes,
        }
    }

    /// Built-in lists extended with extra entries (appended, order kept).
    pub fn extended(extra_safe_prefixes: &[String], extra_dangerous_patterns: &[String]) -> Self {
        let mut classifier = Self::new();
        classifier
            .dangerous_patterns
            .extend(extra_dangerous_patterns.iter().cloned());
        classifier
            .safe_prefixes
            .extend(extra_safe_prefixes.iter().cloned());
        classifier
    }

    /// Classify a raw command string.
    pub fn classify(&self, command: &str) -> SafetyTier {
        if self
            .dangerous_patterns
            .iter()
            .any(|pattern| command.contains(pattern.as_str()))
        {
            return SafetyTier::Dangerous;
        }

        let trimmed = command.trim();
        if !trimmed.is_empty()
            && !COMPOUND_OPERATORS.iter().any(|op| trimmed.contains(op))
            && !has_side_effect_argument(trimmed)
            && self
                .safe_prefixes
                .iter()
                .any(|prefix| matches_prefix(trimmed, prefix))
        {
            return SafetyTier::Safe;
        }

        SafetyTier::NeedsConfirmation
    }
}

fn has_side_effect_argument(command: &str) -> bool {
    let mut words = command.split_whitespace();
    let Some(program) = words.next() else {
        return false;
    };
    SIDE_EFFECT_ARGUMENTS
        .iter()
        .find(|(name, _)| *name == program)
        .map_or(false, |(_, flags)| {
            words.any(|word| flags.iter().any(|flag| word.starts_with(flag)))
        })
}

/// Prefix match on a word boundary: "ls" matches "ls -la" but not "lsblk".
fn matches_prefix(command: &str, prefix: &str) -> bool {
    match command.strip_prefix(prefix) {
        Some(rest) => {
            rest.is_empty() || prefix.ends_with(' ') || rest.starts_with(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_safe_commands() {
        let classifier = SafetyClassifier::new();
        for cmd in ["ls", "ls -la", "pwd", "git status", "cat README.md", "grep -rn foo src"] {
            assert_eq!(classifier.classify(cmd), SafetyTier::Safe, "{} should be safe", cmd);
        }
    }

    #[test]
    fn test_classify_dangerous_commands() {
        let classifier = SafetyClassifier::new();
        for cmd in ["rm -rf /", "sudo rm file", "dd if=/dev/zero of=x", "mkfs.ext4 /dev/sda1"] {
            assert_eq!(
                classifier.classify(cmd),
                SafetyTier::Dangerous,
                "{} should be dangerous",
                cmd
            );
        }
    }

    #[test]
    fn test_dangerous_wins_over_safe_prefix() {
        let classifier = SafetyClassifier::new();
        assert_eq!(classifier.classify("ls && rm -rf /"), SafetyTier::Dangerous);
    }

    #[test]
    fn test_unlisted_commands_need_confirmation() {
        let classifier = SafetyClassifier::new();
        assert_eq!(classifier.classify("cargo test"), SafetyTier::NeedsConfirmation);
        assert_eq!(classifier.classify("npm install"), SafetyTier::NeedsConfirmation);
        assert_eq!(classifier.classify(""), SafetyTier::NeedsConfirmation);
    }

    #[test]
    fn test_safe_prefix_requires_word_boundary() {
        let classifier = SafetyClassifier::new();
        assert_eq!(classifier.classify("lsblk"), SafetyTier::NeedsConfirmation);
        assert_eq!(classifier.classify("dateutil"), SafetyTier::NeedsConfirmation);
    }

    #[test]
    fn test_compound_commands_are_never_safe() {
        let classifier = SafetyClassifier::new();
        assert_eq!(classifier.classify("ls; rm notes.txt"), SafetyTier::NeedsConfirmation);
        assert_eq!(classifier.classify("cat a > b"), SafetyTier::NeedsConfirmation);
        assert_eq!(classifier.classify("echo $(whoami)"), SafetyTier::NeedsConfirmation);
    }

    #[test]
    fn test_side_effect_arguments_need_confirmation() {
        let classifier = SafetyClassifier::new();
        for cmd in [
            "find . -delete",
            "find / -name '*.rs' -delete",
            "find . -name '*.tmp' -exec rm {} +",
            "find src -execdir touch x +",
            "find . -ok rm {} +",
            "find . -fprint /etc/passwd",
            "tree -o /etc/passwd",
            "date -s 2000-01-01",
            "date --set=2000-01-01",
        ] {
            assert_eq!(
                classifier.classify(cmd),
                SafetyTier::NeedsConfirmation,
                "{} should need confirmation",
                cmd
            );
        }
    }

    #[test]
    fn test_read_only_arguments_stay_safe() {
        let classifier = SafetyClassifier::new();
        for cmd in ["find . -name '*.rs'", "find src -type f", "tree -L 2", "date +%Y", "date -u"] {
            assert_eq!(classifier.classify(cmd), SafetyTier::Safe, "{} should be safe", cmd);
        }
        // Only the program's own flags count
        assert_eq!(classifier.classify("grep -rn -delete src"), SafetyTier::Safe);
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let classifier = SafetyClassifier::new();
        assert_eq!(classifier.classify("LS"), SafetyTier::NeedsConfirmation);
        assert_eq!(classifier.classify("MKFS"), SafetyTier::NeedsConfirmation);
    }

    #[test]
    fn test_extended_lists() {
        let classifier = SafetyClassifier::extended(
            &["cargo check".to_string()],
            &["git push --force".to_string()],
        );
        assert_eq!(classifier.classify("cargo check"), SafetyTier::Safe);
        assert_eq!(
            classifier.classify("git push --force origin main"),
            SafetyTier::Dangerous
        );
        // Built-ins still apply
        assert_eq!(classifier.classify("pwd"), SafetyTier::Safe);
    }

    #[test]
    fn test_tier_as_str() {
        assert_eq!(SafetyTier::Safe.as_str(), "safe");
        assert_eq!(SafetyTier::NeedsConfirmation.as_str(), "needs_confirmation");
        assert_eq!(SafetyTier::Dangerous.to_string(), "dangerous");
    }
}
