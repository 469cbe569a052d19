//! Tokenization and parsing of engine-to-driver messages.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::board::UciMove;

use super::options::{
    case_fold, is_good_untrimmed_string, is_space, CoderOptions, EngineOption, OptPair,
};
use super::score::{BoundedScore, Score, ScoreBound};
use super::search::Info;

/// Whitespace tokenizer with one-token lookback, over a validated line.
pub(crate) struct Tokenizer<'a> {
    s: &'a str,
    tokens: Vec<(usize, usize)>,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    /// Tokenize `s`, rejecting lines with control characters (and
    /// non-ASCII bytes when UTF-8 sanitization is on).
    pub(crate) fn new(s: &'a str, o: CoderOptions) -> Option<Tokenizer<'a>> {
        if !is_good_untrimmed_string(s, o) {
            return None;
        }
        let bytes = s.as_bytes();
        let mut tokens = Vec::new();
        let mut r = 0;
        while r < bytes.len() {
            while r < bytes.len() && is_space(bytes[r]) {
                r += 1;
            }
            if r >= bytes.len() {
                break;
            }
            let l = r;
            while r < bytes.len() && !is_space(bytes[r]) {
                r += 1;
            }
            tokens.push((l, r));
        }
        Some(Tokenizer { s, tokens, pos: 0 })
    }

    pub(crate) fn next(&mut self) -> Option<&'a str> {
        let (l, r) = *self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(&self.s[l..r])
    }

    pub(crate) fn undo(&mut self) {
        if self.pos > 0 {
            self.pos -= 1;
        }
    }

    pub(crate) fn more(&self) -> bool {
        self.pos < self.tokens.len()
    }

    /// Consume tokens until `stop` matches (exclusive), returning the raw
    /// text span so inner whitespace is preserved as single spaces were
    /// written.
    pub(crate) fn next_until(&mut self, stop: impl Fn(&str) -> bool) -> &'a str {
        let Some(&(l, _)) = self.tokens.get(self.pos) else {
            return "";
        };
        let mut r = l;
        while let Some(&(tl, tr)) = self.tokens.get(self.pos) {
            if stop(&self.s[tl..tr]) {
                break;
            }
            r = tr;
            self.pos += 1;
        }
        &self.s[l..r]
    }

    pub(crate) fn next_until_end(&mut self) -> &'a str {
        self.next_until(|_| false)
    }
}

/// Whether a token has the shape of a UCI move; used to find where move
/// lists end inside `info` messages.
fn is_move_token(t: &str) -> bool {
    let b = t.as_bytes();
    if b.len() != 4 && b.len() != 5 {
        return false;
    }
    let sq = |f: u8, r: u8| (b'a'..=b'h').contains(&f) && (b'1'..=b'8').contains(&r);
    if !sq(b[0], b[1]) || !sq(b[2], b[3]) {
        return false;
    }
    b.len() == 4 || matches!(b[4], b'n' | b'b' | b'r' | b'q')
}

/// Error type for `option` declaration parsing; malformed declarations
/// are dropped with a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OptionParseError {
    NoName,
    EmptyName,
    NoType,
    UnknownType(String),
    NoDefault(&'static str),
    BadDefault(String),
    DefaultOutOfRange,
    DefaultNotInChoices,
    ValueAfter(&'static str),
}

impl std::fmt::Display for OptionParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionParseError::NoName => write!(f, "no name"),
            OptionParseError::EmptyName => write!(f, "empty name"),
            OptionParseError::NoType => write!(f, "no type"),
            OptionParseError::UnknownType(t) => write!(f, "unknown type {t:?}"),
            OptionParseError::NoDefault(t) => write!(f, "no default for {t:?}"),
            OptionParseError::BadDefault(d) => write!(f, "bad default {d:?}"),
            OptionParseError::DefaultOutOfRange => write!(f, "default out of range"),
            OptionParseError::DefaultNotInChoices => {
                write!(f, "default for \"combo\" is not in choices")
            }
            OptionParseError::ValueAfter(kw) => write!(f, "no value after {kw:?}"),
        }
    }
}

/// Parse an `option name <N> type <T> ...` declaration body.
pub(crate) fn parse_option(tok: &mut Tokenizer<'_>) -> Result<OptPair, OptionParseError> {
    let mut name: Option<String> = None;
    let mut typ: Option<String> = None;
    let mut default: Option<String> = None;
    let mut min: Option<String> = None;
    let mut max: Option<String> = None;
    let mut choices: Vec<String> = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();

    let keywords = ["name", "type", "default", "min", "max", "var"];
    let is_keyword = |s: &str| keywords.contains(&s);

    while let Some(sub) = tok.next() {
        if sub != "var" && !visited.insert(sub) {
            log::warn!("parse \"option\": duplicate {sub:?}");
        }
        match sub {
            "name" => name = Some(tok.next_until(is_keyword).to_string()),
            "type" => typ = Some(tok.next().ok_or(OptionParseError::ValueAfter("type"))?.to_string()),
            "default" => default = Some(tok.next_until(is_keyword).to_string()),
            "min" => min = Some(tok.next().ok_or(OptionParseError::ValueAfter("min"))?.to_string()),
            "max" => max = Some(tok.next().ok_or(OptionParseError::ValueAfter("max"))?.to_string()),
            "var" => choices.push(tok.next_until(is_keyword).to_string()),
            _ => log::warn!("parse \"option\": bad token {sub:?}"),
        }
    }

    let name = name.ok_or(OptionParseError::NoName)?;
    if name.is_empty() {
        return Err(OptionParseError::EmptyName);
    }
    let typ = typ.ok_or(OptionParseError::NoType)?;

    let option = match typ.as_str() {
        "check" => {
            if min.is_some() || max.is_some() || !choices.is_empty() {
                log::warn!("parse \"option\": extra data for \"check\"");
            }
            let default = default.ok_or(OptionParseError::NoDefault("check"))?;
            let value = match default.as_str() {
                "true" => true,
                "false" => false,
                _ => return Err(OptionParseError::BadDefault(default)),
            };
            EngineOption::Check { value }
        }
        "spin" => {
            if !choices.is_empty() {
                log::warn!("parse \"option\": extra data for \"spin\"");
            }
            let default = default.ok_or(OptionParseError::NoDefault("spin"))?;
            let min = min
                .and_then(|m| {
                    m.parse::<i64>()
                        .map_err(|_| log::warn!("parse \"option\": bad min: {m:?}"))
                        .ok()
                })
                .unwrap_or(i64::MIN);
            let max = max
                .and_then(|m| {
                    m.parse::<i64>()
                        .map_err(|_| log::warn!("parse \"option\": bad max: {m:?}"))
                        .ok()
                })
                .unwrap_or(i64::MAX);
            let value: i64 = default
                .parse()
                .map_err(|_| OptionParseError::BadDefault(default))?;
            if !(min <= value && value <= max) {
                return Err(OptionParseError::DefaultOutOfRange);
            }
            EngineOption::Spin { value, min, max }
        }
        "combo" => {
            if min.is_some() || max.is_some() {
                log::warn!("parse \"option\": extra data for \"combo\"");
            }
            let default = default.ok_or(OptionParseError::NoDefault("combo"))?;
            let mut real_choices = Vec::with_capacity(choices.len());
            let mut choice_map = HashMap::new();
            for choice in choices {
                if choice.is_empty() {
                    log::warn!("parse \"option\": empty choice");
                    continue;
                }
                let folded = case_fold(&choice);
                if choice_map.contains_key(&folded) {
                    log::warn!("parse \"option\": duplicate choice {choice:?}");
                    continue;
                }
                choice_map.insert(folded, choice.clone());
                real_choices.push(choice);
            }
            let value = choice_map
                .get(&case_fold(&default))
                .ok_or(OptionParseError::DefaultNotInChoices)?
                .clone();
            EngineOption::Combo {
                value,
                choices: real_choices,
                choice_map,
            }
        }
        "button" => {
            if min.is_some() || max.is_some() || default.is_some() || !choices.is_empty() {
                log::warn!("parse \"option\": extra data for \"button\"");
            }
            EngineOption::Button
        }
        "string" => {
            if min.is_some() || max.is_some() || !choices.is_empty() {
                log::warn!("parse \"option\": extra data for \"string\"");
            }
            let mut value = default.ok_or(OptionParseError::NoDefault("string"))?;
            if value == "<empty>" {
                value = String::new();
            }
            EngineOption::String { value }
        }
        _ => return Err(OptionParseError::UnknownType(typ)),
    };

    Ok(OptPair { name, option })
}

fn parse_moves(tok: &mut Tokenizer<'_>) -> Result<Vec<UciMove>, String> {
    let mut moves = Vec::new();
    while let Some(t) = tok.next() {
        if !is_move_token(t) {
            tok.undo();
            break;
        }
        let mv: UciMove = t.parse().map_err(|e| format!("bad uci move {t:?}: {e}"))?;
        moves.push(mv);
    }
    Ok(moves)
}

fn parse_score(tok: &mut Tokenizer<'_>) -> Result<BoundedScore, String> {
    let mut bound: Option<ScoreBound> = None;
    let mut cp: Option<i32> = None;
    let mut mate: Option<i32> = None;
    while let Some(kw) = tok.next() {
        match kw {
            "cp" => {
                if cp.is_some() {
                    log::warn!("parse \"info\": parse \"score\": duplicate cp");
                }
                let t = tok.next().ok_or("end of line")?;
                cp = Some(t.parse().map_err(|_| format!("bad value {t:?}"))?);
            }
            "mate" => {
                if mate.is_some() {
                    log::warn!("parse \"info\": parse \"score\": duplicate mate");
                }
                let t = tok.next().ok_or("end of line")?;
                mate = Some(t.parse().map_err(|_| format!("bad value {t:?}"))?);
            }
            "lowerbound" | "upperbound" => {
                if bound.is_some() {
                    log::warn!("parse \"info\": parse \"score\": duplicate bound");
                }
                bound = Some(if kw.starts_with('l') {
                    ScoreBound::Lower
                } else {
                    ScoreBound::Upper
                });
            }
            _ => {
                tok.undo();
                break;
            }
        }
    }
    let score = match (cp, mate) {
        (Some(_), Some(_)) => return Err("ambiguous score".to_string()),
        (None, None) => return Err("no score".to_string()),
        (Some(cp), None) => Score::centipawns(cp),
        (None, Some(mate)) => Score::mate(mate),
    };
    Ok(BoundedScore {
        score,
        bound: bound.unwrap_or(ScoreBound::Exact),
    })
}

fn parse_i64(tok: &mut Tokenizer<'_>) -> Result<i64, String> {
    let t = tok.next().ok_or("end of line")?;
    t.parse().map_err(|_| format!("bad value {t:?}"))
}

fn parse_permille(tok: &mut Tokenizer<'_>) -> Result<f64, String> {
    let v = parse_i64(tok)?;
    if v > 1000 {
        return Err(format!("permille value too large: {v}"));
    }
    Ok(v as f64 / 1000.0)
}

/// Parse an `info ...` message body into a structured record. Unknown or
/// malformed fields are logged and skipped; the rest of the record is
/// still returned.
pub(crate) fn parse_info(tok: &mut Tokenizer<'_>) -> Info {
    let mut info = Info::default();
    let mut parsed: HashSet<String> = HashSet::new();

    while tok.more() {
        let kw = tok.next().unwrap();
        if !parsed.insert(kw.to_string()) {
            log::warn!("parse \"info\": duplicate {kw:?}");
        }

        let res: Result<(), String> = match kw {
            "depth" => parse_i64(tok).map(|v| info.depth = Some(v)),
            "seldepth" => parse_i64(tok).map(|v| info.seldepth = Some(v)),
            "time" => parse_i64(tok).and_then(|v| {
                u64::try_from(v)
                    .map(|ms| info.time = Some(Duration::from_millis(ms)))
                    .map_err(|_| format!("negative time: {v}"))
            }),
            "nodes" => parse_i64(tok).map(|v| info.nodes = Some(v)),
            "pv" => parse_moves(tok).map(|m| info.pv = Some(m)),
            "multipv" => parse_i64(tok).map(|v| info.multipv = Some(v)),
            "score" => parse_score(tok).map(|s| info.score = Some(s)),
            "currmove" => match tok.next() {
                Some(t) => t
                    .parse()
                    .map(|mv| info.cur_move = Some(mv))
                    .map_err(|e| format!("bad uci move {t:?}: {e}")),
                None => Err("end of line".to_string()),
            },
            "currmovenumber" => parse_i64(tok).map(|v| info.cur_move_number = Some(v)),
            "hashfull" => parse_permille(tok).map(|v| info.hash_full = Some(v)),
            "nps" => parse_i64(tok).map(|v| info.nps = Some(v)),
            "tbhits" => parse_i64(tok).map(|v| info.tb_hits = Some(v)),
            "sbhits" => parse_i64(tok).map(|v| info.sb_hits = Some(v)),
            "cpuload" => parse_permille(tok).map(|v| info.cpu_load = Some(v)),
            "string" => {
                info.string = Some(tok.next_until_end().to_string());
                Ok(())
            }
            "refutation" => parse_moves(tok).map(|m| info.refutation = Some(m)),
            "currline" => {
                if let Some(t) = tok.next() {
                    match t.parse::<i64>() {
                        Ok(n) => info.cur_line_cpu = Some(n),
                        Err(_) => tok.undo(),
                    }
                }
                parse_moves(tok).map(|m| info.cur_line = Some(m))
            }
            _ => Err("bad keyword".to_string()),
        };
        if let Err(err) = res {
            log::warn!("parse \"info\": parse {kw:?}: {err}");
        }
    }

    info
}

/// Parse a `bestmove <m> [ponder <m>]` message body.
pub(crate) fn parse_bestmove(
    tok: &mut Tokenizer<'_>,
) -> Result<(UciMove, Option<UciMove>), String> {
    let t = tok.next().ok_or("end of line")?;
    let best: UciMove = t
        .parse()
        .map_err(|e| format!("parse best move {t:?}: {e}"))?;

    let Some(t) = tok.next() else {
        return Ok((best, None));
    };
    if t != "ponder" {
        log::warn!("parse \"bestmove\": bad token {t:?}");
        return Ok((best, None));
    }
    let Some(t) = tok.next() else {
        log::warn!("parse \"bestmove\": missing ponder move");
        return Ok((best, None));
    };
    let ponder = match t.parse::<UciMove>() {
        Ok(mv) => Some(mv),
        Err(e) => {
            log::warn!("parse \"bestmove\": bad ponder move {t:?}: {e}");
            None
        }
    };
    if tok.more() {
        log::warn!("parse \"bestmove\": extra data");
    }
    Ok((best, ponder))
}
