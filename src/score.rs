//! Score text encoding.
//!
//! Scores travel as plain decimal text. `f64`'s `Display` already yields the
//! shortest digits that parse back to the same value and never switches to
//! exponent notation, so it is the canonical form here.

use crate::error::{Error, Result};

pub const POS_INF: &str = "+inf";
pub const NEG_INF: &str = "-inf";

/// Prefix marking an exclusive range boundary.
pub const EXCLUSIVE: char = '(';

pub fn encode(score: f64) -> Result<String> {
    if score.is_nan() {
        return Err(Error::encoding("NaN is not a valid score"));
    }
    if score.is_infinite() {
        let token = if score > 0.0 { POS_INF } else { NEG_INF };
        return Ok(token.to_owned());
    }
    Ok(format!("{score}"))
}

/// Encode a range boundary: bare text is inclusive, `(`-prefixed is exclusive.
pub fn encode_boundary(score: f64, inclusive: bool) -> Result<String> {
    let text = encode(score)?;
    if inclusive {
        Ok(text)
    } else {
        let mut out = String::with_capacity(text.len() + 1);
        out.push(EXCLUSIVE);
        out.push_str(&text);
        Ok(out)
    }
}

/// Parse a score as the store returns it (`"15"`, `"0.5"`, `"inf"`, `"-inf"`).
pub fn decode(text: &[u8]) -> Result<f64> {
    let s = std::str::from_utf8(text)
        .map_err(|_| Error::protocol("score is not valid UTF-8"))?;
    let score = s
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::protocol(format!("invalid score {s:?}")))?;
    if score.is_nan() {
        return Err(Error::protocol("store returned a NaN score"));
    }
    Ok(score)
}
