//! Tone enforcement on generated drafts.
//!
//! Rejects drafts containing forbidden tokens: profanity, binding
//! commitments, and legal hedges an assistant must never volunteer.

/// A forbidden token with the rule family it belongs to.
struct ForbiddenToken {
    token: &'static str,
    family: &'static str,
}

const FORBIDDEN: &[ForbiddenToken] = &[
    // Profanity.
    ForbiddenToken { token: "damn", family: "profanity" },
    ForbiddenToken { token: "stupid", family: "profanity" },
    ForbiddenToken { token: "idiot", family: "profanity" },
    ForbiddenToken { token: "shut up", family: "profanity" },
    // Commitments the agent must not make.
    ForbiddenToken { token: "we guarantee", family: "commitment" },
    ForbiddenToken { token: "i guarantee", family: "commitment" },
    ForbiddenToken { token: "i promise", family: "commitment" },
    ForbiddenToken { token: "we promise", family: "commitment" },
    ForbiddenToken { token: "you have my word", family: "commitment" },
    ForbiddenToken { token: "full refund", family: "commitment" },
    // Legal hedges.
    ForbiddenToken { token: "legally binding", family: "legal" },
    ForbiddenToken { token: "without prejudice", family: "legal" },
    ForbiddenToken { token: "we accept liability", family: "legal" },
    ForbiddenToken { token: "this constitutes a contract", family: "legal" },
];

pub struct ToneEnforcer;

impl Default for ToneEnforcer {
    fn default() -> Self {
        Self::new()
    }
}

impl ToneEnforcer {
    pub fn new() -> Self {
        Self
    }

    /// Check a draft body. Returns (approved, issues).
    pub fn check(&self, draft_body: &str) -> (bool, Vec<String>) {
        let lower = draft_body.to_lowercase();
        let issues: Vec<String> = FORBIDDEN
            .iter()
            .filter(|f| lower.contains(f.token))
            .map(|f| format!("{}: '{}'", f.family, f.token))
            .collect();
        (issues.is_empty(), issues)
    }
}
