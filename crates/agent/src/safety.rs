//! Safety gate.
//!
//! Every tool invocation passes through [`SafetyGate::check`] before it runs.
//! A payload matching a deny pattern always needs explicit confirmation unless
//! pattern checks are switched off for its category; auto-confirmation only
//! skips the second, generic prompt.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use neoneo_config::Config;
use regex::RegexSet;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SafetyCategory {
    Calculation,
    Shell,
    Bash,
    FileWrite,
    FileEdit,
    ReadOnly,
}

const CALCULATION_PATTERNS: &[&str] = &[
    "system", "exec", "shell", "quit", "halt", "cd", "rm", "mv",
];

const SHELL_PATTERNS: &[&str] = &[
    "rm -rf", "rm", "mkfs", "dd", ">", ">>", "|", "&", ";", "&&", "||", "sudo", "su", "chmod",
    "chown", "passwd", "mv", "curl", "wget", "ssh", "scp", "ftp", "telnet", "nc", "ncat", "sleep",
    "perl", "python", "python3", "ruby", "bash", "sh", "zsh", "csh", "ksh",
];

const BASH_PATTERNS: &[&str] = &[
    "rm -rf",
    "mkfs",
    "dd if=",
    "> /dev",
    "echo > /dev",
    ">/dev",
    "sudo rm",
    "sudo mv",
    "sudo cp",
    "reboot",
    "shutdown",
    "passwd",
    "chmod 777",
    "chmod -R 777",
    ":(){ :|:& };:",
    "fork bomb",
];

const FILE_WRITE_PATTERNS: &[&str] = &[".ssh", ".aws", ".gnupg", "/etc/"];

impl SafetyCategory {
    pub const ALL: [SafetyCategory; 6] = [
        SafetyCategory::Calculation,
        SafetyCategory::Shell,
        SafetyCategory::Bash,
        SafetyCategory::FileWrite,
        SafetyCategory::FileEdit,
        SafetyCategory::ReadOnly,
    ];

    pub fn deny_patterns(&self) -> &'static [&'static str] {
        match self {
            SafetyCategory::Calculation => CALCULATION_PATTERNS,
            SafetyCategory::Shell => SHELL_PATTERNS,
            SafetyCategory::Bash => BASH_PATTERNS,
            SafetyCategory::FileWrite | SafetyCategory::FileEdit => FILE_WRITE_PATTERNS,
            SafetyCategory::ReadOnly => &[],
        }
    }

    fn action(&self) -> &'static str {
        match self {
            SafetyCategory::Calculation => "Calculation",
            SafetyCategory::Shell | SafetyCategory::Bash => "Command execution",
            SafetyCategory::FileWrite => "File write operation",
            SafetyCategory::FileEdit => "File edit operation",
            SafetyCategory::ReadOnly => "Operation",
        }
    }

    fn subject(&self) -> &'static str {
        match self {
            SafetyCategory::Calculation => "pattern",
            SafetyCategory::Shell | SafetyCategory::Bash => "operation",
            SafetyCategory::FileWrite | SafetyCategory::FileEdit => "path",
            SafetyCategory::ReadOnly => "pattern",
        }
    }
}

impl fmt::Display for SafetyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SafetyCategory::Calculation => "calculation",
            SafetyCategory::Shell => "shell",
            SafetyCategory::Bash => "bash",
            SafetyCategory::FileWrite => "file write",
            SafetyCategory::FileEdit => "file edit",
            SafetyCategory::ReadOnly => "read-only",
        };
        f.write_str(label)
    }
}

/// Result of testing a payload against a category's deny list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub denied: bool,
    pub matched_pattern: Option<&'static str>,
}

/// Why an invocation was refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    #[error(
        "{} aborted due to security concerns with {}: {pattern}",
        .category.action(),
        .category.subject()
    )]
    Pattern {
        category: SafetyCategory,
        pattern: String,
    },

    #[error("{} denied by user", .category.action())]
    Declined { category: SafetyCategory },
}

/// What the user is asked to approve.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmRequest<'a> {
    pub tool: &'a str,
    pub category: SafetyCategory,
    pub payload: &'a str,
    /// Set when the prompt is a deny-pattern warning.
    pub matched_pattern: Option<&'a str>,
    pub preview: Option<&'a str>,
}

/// Blocks until the user answers yes or no.
pub trait Confirmer: Send + Sync {
    fn confirm(&self, request: &ConfirmRequest<'_>) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryPolicy {
    pub check_patterns: bool,
    pub auto_confirm: bool,
}

impl CategoryPolicy {
    pub const STRICT: CategoryPolicy = CategoryPolicy {
        check_patterns: true,
        auto_confirm: false,
    };
}

struct DenyList {
    patterns: &'static [&'static str],
    set: RegexSet,
}

impl DenyList {
    fn new(patterns: &'static [&'static str]) -> Result<Self, regex::Error> {
        let set = RegexSet::new(patterns.iter().map(|p| regex::escape(p)))?;
        Ok(Self { patterns, set })
    }

    /// Longest match wins; ties go to the earliest listed pattern.
    fn longest_match(&self, payload: &str) -> Option<&'static str> {
        self.set
            .matches(payload)
            .iter()
            .max_by(|a, b| {
                self.patterns[*a]
                    .len()
                    .cmp(&self.patterns[*b].len())
                    .then(b.cmp(a))
            })
            .map(|i| self.patterns[i])
    }
}

pub struct SafetyGate {
    lists: HashMap<SafetyCategory, DenyList>,
    policies: HashMap<SafetyCategory, CategoryPolicy>,
    confirmer: Arc<dyn Confirmer>,
}

impl SafetyGate {
    /// Every category starts strict except read-only, which never prompts.
    pub fn new(confirmer: Arc<dyn Confirmer>) -> crate::Result<Self> {
        let mut lists = HashMap::new();
        let mut policies = HashMap::new();
        for category in SafetyCategory::ALL {
            lists.insert(category, DenyList::new(category.deny_patterns())?);
            policies.insert(category, CategoryPolicy::STRICT);
        }
        policies.insert(
            SafetyCategory::ReadOnly,
            CategoryPolicy {
                check_patterns: false,
                auto_confirm: true,
            },
        );

        Ok(Self {
            lists,
            policies,
            confirmer,
        })
    }

    pub fn from_config(config: &Config, confirmer: Arc<dyn Confirmer>) -> crate::Result<Self> {
        let shell = CategoryPolicy {
            check_patterns: !config.ignore_shell_safety,
            auto_confirm: config.auto_confirm_shell,
        };
        let files = CategoryPolicy {
            check_patterns: true,
            auto_confirm: config.auto_confirm_file_ops,
        };

        Ok(Self::new(confirmer)?
            .with_policy(
                SafetyCategory::Calculation,
                CategoryPolicy {
                    check_patterns: !config.ignore_calc_safety,
                    auto_confirm: config.auto_confirm_calc,
                },
            )
            .with_policy(SafetyCategory::Shell, shell)
            .with_policy(SafetyCategory::Bash, shell)
            .with_policy(SafetyCategory::FileWrite, files)
            .with_policy(SafetyCategory::FileEdit, files))
    }

    pub fn with_policy(mut self, category: SafetyCategory, policy: CategoryPolicy) -> Self {
        self.policies.insert(category, policy);
        self
    }

    pub fn policy(&self, category: SafetyCategory) -> CategoryPolicy {
        self.policies
            .get(&category)
            .copied()
            .unwrap_or(CategoryPolicy::STRICT)
    }

    pub fn classify(&self, category: SafetyCategory, payload: &str) -> Classification {
        let matched_pattern = self
            .lists
            .get(&category)
            .and_then(|list| list.longest_match(payload));

        Classification {
            denied: matched_pattern.is_some(),
            matched_pattern,
        }
    }

    pub fn check(
        &self,
        tool: &str,
        category: SafetyCategory,
        payload: &str,
        preview: Option<&str>,
    ) -> Result<(), Denial> {
        let policy = self.policy(category);
        let request = ConfirmRequest {
            tool,
            category,
            payload,
            matched_pattern: None,
            preview,
        };

        if policy.check_patterns {
            if let Some(pattern) = self.classify(category, payload).matched_pattern {
                warn!("{} payload matches deny pattern '{}'", tool, pattern);
                let warning = ConfirmRequest {
                    matched_pattern: Some(pattern),
                    ..request
                };
                if !self.confirmer.confirm(&warning) {
                    return Err(Denial::Pattern {
                        category,
                        pattern: pattern.to_string(),
                    });
                }
                debug!("{}: deny pattern '{}' overridden by user", tool, pattern);
            }
        }

        if !policy.auto_confirm && !self.confirmer.confirm(&request) {
            return Err(Denial::Declined { category });
        }

        Ok(())
    }
}
