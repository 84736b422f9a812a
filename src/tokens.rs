//! Prompt size estimates for snapshots.
//!
//! Counts use tiktoken when a tokenizer can be built and fall back to a
//! four-bytes-per-token approximation otherwise.

use std::sync::OnceLock;

use tiktoken_rs::CoreBPE;

/// Tokenizer used for estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    /// cl100k_base
    #[default]
    Cl100kBase,
    /// o200k_base
    O200kBase,
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoding::Cl100kBase => write!(f, "cl100k_base"),
            Encoding::O200kBase => write!(f, "o200k_base"),
        }
    }
}

impl std::str::FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cl100k" | "cl100k_base" => Ok(Encoding::Cl100kBase),
            "o200k" | "o200k_base" => Ok(Encoding::O200kBase),
            _ => Err(format!("unknown encoding: {s}")),
        }
    }
}

static CL100K: OnceLock<Option<CoreBPE>> = OnceLock::new();
static O200K: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn tokenizer(encoding: Encoding) -> Option<&'static CoreBPE> {
    let cell = match encoding {
        Encoding::Cl100kBase => &CL100K,
        Encoding::O200kBase => &O200K,
    };

    cell.get_or_init(|| {
        let built = match encoding {
            Encoding::Cl100kBase => tiktoken_rs::cl100k_base(),
            Encoding::O200kBase => tiktoken_rs::o200k_base(),
        };
        built
            .map_err(|e| tracing::warn!(%encoding, error = %e, "tokenizer unavailable, using estimate"))
            .ok()
    })
    .as_ref()
}

fn approximate(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Count tokens with the default encoding.
///
/// ```
/// use reposnap::tokens::count_tokens;
///
/// assert!(count_tokens("fn main() {}") > 0);
/// assert_eq!(count_tokens(""), 0);
/// ```
pub fn count_tokens(text: &str) -> usize {
    count_tokens_with_encoding(text, Encoding::default())
}

/// Count tokens with a specific encoding. Never fails.
pub fn count_tokens_with_encoding(text: &str, encoding: Encoding) -> usize {
    match tokenizer(encoding) {
        Some(bpe) => bpe.encode_ordinary(text).len(),
        None => approximate(text),
    }
}
