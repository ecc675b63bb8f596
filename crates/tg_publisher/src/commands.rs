use once_cell::sync::Lazy;
use regex::Regex;

use common_types::{ChainScope, FilterRequest};

static COMMAND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/(start|stop|list)(?:@\w+)?(?:\s+(.*))?$").expect("command regex"));

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add(FilterRequest),
    Remove(FilterRequest),
    List,
}

/// Grammar: `/start <eth> [ticker] [chain]`, `/stop <eth> [ticker]
/// [chain]`, `/list`. A leading non-numeric argument is taken as a
/// ticker with threshold 0 (the original single-argument form), and the
/// literal ticker `ALL` maps to the match-everything threshold mode.
/// Anything unparseable is ignored.
pub fn parse_command(text: &str) -> Option<Command> {
    let caps = COMMAND_RE.captures(text.trim())?;
    let verb = caps.get(1)?.as_str();
    let rest = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");

    match verb {
        "list" => Some(Command::List),
        "start" | "stop" => {
            let req = parse_filter_args(rest)?;
            if verb == "start" {
                Some(Command::Add(req))
            } else {
                Some(Command::Remove(req))
            }
        }
        _ => None,
    }
}

fn parse_filter_args(rest: &str) -> Option<FilterRequest> {
    let mut tokens: Vec<&str> = rest.split_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    // trailing chain name is optional, default Ethereum
    let chain = match tokens.last()?.parse::<ChainScope>() {
        Ok(chain) if tokens.len() > 1 => {
            tokens.pop();
            chain
        }
        _ => ChainScope::Ethereum,
    };

    let (eth, ticker) = match tokens[0].parse::<f64>() {
        Ok(eth) if eth >= 0.0 && eth.is_finite() => (eth, tokens.get(1).copied()),
        Ok(_) => return None,
        Err(_) => (0.0, Some(tokens[0])),
    };

    let ticker = ticker
        .filter(|t| !t.eq_ignore_ascii_case("all"))
        .map(str::to_string);

    Some(FilterRequest { eth, ticker, chain })
}
