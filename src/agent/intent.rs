use std::fmt;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Closed vocabulary of banking intents.
///
/// `Unknown` and `Error` are reserved for fallbacks and are never accepted
/// from model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    AccountBalance,
    TransactionHistory,
    TransferMoney,
    CardIssues,
    LoanInquiry,
    GeneralInquiry,
    Unknown,
    Error,
}

impl Intent {
    /// Intents a model may select.
    pub const SELECTABLE: [Intent; 6] = [
        Intent::AccountBalance,
        Intent::TransactionHistory,
        Intent::TransferMoney,
        Intent::CardIssues,
        Intent::LoanInquiry,
        Intent::GeneralInquiry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::AccountBalance => "account_balance",
            Intent::TransactionHistory => "transaction_history",
            Intent::TransferMoney => "transfer_money",
            Intent::CardIssues => "card_issues",
            Intent::LoanInquiry => "loan_inquiry",
            Intent::GeneralInquiry => "general_inquiry",
            Intent::Unknown => "unknown",
            Intent::Error => "error",
        }
    }

    pub fn is_reserved(&self) -> bool {
        matches!(self, Intent::Unknown | Intent::Error)
    }

    /// Exact lookup among the selectable intents of an already normalized token.
    fn lookup(token: &str) -> Option<Intent> {
        Self::SELECTABLE.iter().copied().find(|i| i.as_str() == token)
    }

    /// Maps a raw model token onto the vocabulary.
    ///
    /// Returns the intent and whether the token had to be replaced.
    pub fn validate(raw: &str) -> (Intent, bool) {
        let token = normalize_token(raw);
        match Self::lookup(&token) {
            Some(intent) => (intent, false),
            None => {
                warn!("Invalid intent detected: {:?}, defaulting to general_inquiry", raw.trim());
                (Intent::GeneralInquiry, true)
            }
        }
    }

    /// Comma separated list used in prompts.
    pub fn vocabulary() -> String {
        Self::SELECTABLE
            .iter()
            .map(|i| i.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-folds and trims a token, stripping quoting and mapping separators to `_`.
pub fn normalize_token(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*' | ':' | '.' | ','))
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}
