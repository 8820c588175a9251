//! Rough per-call cost accounting, for logs only.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// USD per million tokens (input, output).
fn per_mtok(model: &str) -> (Decimal, Decimal) {
    if model.starts_with("claude") {
        (dec!(3.00), dec!(15.00))
    } else if model.starts_with("gpt-4") {
        (dec!(2.50), dec!(10.00))
    } else if model.starts_with("gpt") {
        (dec!(0.50), dec!(1.50))
    } else {
        (dec!(1.00), dec!(3.00))
    }
}

/// Tokens-from-characters heuristic: roughly four characters per token.
const CHARS_PER_TOKEN: u64 = 4;

/// Estimate a call's cost from prompt/completion character counts.
pub(crate) fn estimate_from_chars(
    model: &str,
    prompt_chars: usize,
    completion_chars: usize,
) -> Decimal {
    let (input_rate, output_rate) = per_mtok(model);
    let input_tokens = Decimal::from(prompt_chars as u64 / CHARS_PER_TOKEN);
    let output_tokens = Decimal::from(completion_chars as u64 / CHARS_PER_TOKEN);
    let mtok = dec!(1_000_000);
    (input_tokens * input_rate + output_tokens * output_rate) / mtok
}
