use crate::engine::Rejection;

const WIN_WORDS: &[&str] = &["выиграл", "win", "won"];
const LOSE_WORDS: &[&str] = &["проиграл", "lose", "lost"];
const DRAW_STEMS: &[&str] = &["ничь", "draw", "drew"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultWord {
    Win,
    Lose,
    Draw,
}

/// A normalized self-reported result: goals are always reporter first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultReport {
    pub opponent: String,
    pub score: (u32, u32),
}

/// Parses statements such as `я выиграл у @bob 2:0`. Each signal keeps its
/// first occurrence; a single token may supply more than one signal.
pub fn parse_statement<S: AsRef<str>>(tokens: &[S]) -> Result<ResultReport, Rejection> {
    let mut result = None;
    let mut handle = None;
    let mut score = None;

    for token in tokens {
        let word = token.as_ref().trim().to_lowercase();
        if result.is_none() {
            result = parse_result_word(&word);
        }
        if handle.is_none() {
            handle = parse_handle(&word);
        }
        if score.is_none() {
            score = parse_score_token(&word);
        }
    }

    let (Some(result), Some(opponent), Some(score)) = (result, handle, score) else {
        return Err(Rejection::Unparsable);
    };
    let score = normalize(result, score).ok_or(Rejection::Unparsable)?;
    Ok(ResultReport { opponent, score })
}

pub fn parse_result_word(word: &str) -> Option<ResultWord> {
    if WIN_WORDS.contains(&word) {
        Some(ResultWord::Win)
    } else if LOSE_WORDS.contains(&word) {
        Some(ResultWord::Lose)
    } else if DRAW_STEMS.iter().any(|stem| word.contains(stem)) {
        Some(ResultWord::Draw)
    } else {
        None
    }
}

fn parse_handle(word: &str) -> Option<String> {
    let handle = word.strip_prefix('@')?;
    if handle.is_empty() {
        return None;
    }
    Some(handle.to_string())
}

fn parse_score_token(word: &str) -> Option<(u32, u32)> {
    let (g0, g1) = word.split_once(':')?;
    Some((g0.parse().ok()?, g1.parse().ok()?))
}

fn normalize(result: ResultWord, (g0, g1): (u32, u32)) -> Option<(u32, u32)> {
    match result {
        ResultWord::Draw if g0 != g1 => None,
        ResultWord::Draw => Some((g0, g1)),
        _ if g0 == g1 => None,
        ResultWord::Win => Some((g0.max(g1), g0.min(g1))),
        ResultWord::Lose => Some((g0.min(g1), g0.max(g1))),
    }
}
