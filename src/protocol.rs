use std::fmt;

/// Upper bound on a listing's duration, in seconds (100 years). Keeps the
/// expiry instant well inside `OffsetDateTime`'s representable range, so
/// expiry arithmetic can never overflow for a parse-accepted command.
pub const MAX_DURATION_SECS: i64 = 100 * 365 * 24 * 60 * 60;

/// One client request, parsed from a whitespace-split line.
///
/// Parsing covers shape only (verb, arity, integer fields and their ranges);
/// everything that needs the auction state (unknown items, duplicate names,
/// price ordering) is decided by the command processor under the store lock.
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Sell {
        item:     &'a str,
        reserve:  i64,
        duration: i64,
    },
    Bid {
        item:   &'a str,
        amount: i64,
    },
    List,
}

impl<'a> Command<'a> {
    /// Parse one request line. Any malformed line (empty, unknown verb, wrong
    /// field count, non-integer or out-of-range numeric field) is `None` and
    /// answered with `:invalid` by the caller, with no state touched.
    pub fn parse(line: &'a str) -> Option<Command<'a>> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            &["sell", item, reserve, duration] => {
                let reserve: i64 = reserve.parse().ok()?;
                let duration: i64 = duration.parse().ok()?;
                if reserve < 0 || duration < 1 || duration > MAX_DURATION_SECS {
                    return None;
                }
                Some(Command::Sell {
                    item,
                    reserve,
                    duration,
                })
            }
            &["bid", item, amount] => {
                let amount: i64 = amount.parse().ok()?;
                if amount < 1 {
                    return None;
                }
                Some(Command::Bid { item, amount })
            }
            &["list"] => Some(Command::List),
            _ => None,
        }
    }
}

/// One entry of a `:list` reply, captured at emission time. The remaining
/// time is display-only and may be momentarily negative for a listing the
/// sweeper has not retired yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub item:         String,
    pub reserve:      i64,
    pub highest_bid:  i64,
    pub remaining_ms: i64,
}

/// One server-to-client reply or notification line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Listed { item: String },
    Invalid,
    Rejected,
    Bid { item: String },
    Outbid { item: String, amount: i64 },
    Sold { item: String, amount: i64 },
    Unsold { item: String },
    Won { item: String, amount: i64 },
    List { entries: Vec<ListEntry> },
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Listed { item } => write!(f, ":listed {item}"),
            Reply::Invalid => write!(f, ":invalid"),
            Reply::Rejected => write!(f, ":rejected"),
            Reply::Bid { item } => write!(f, ":bid {item}"),
            Reply::Outbid { item, amount } => write!(f, ":outbid {item} {amount}"),
            Reply::Sold { item, amount } => write!(f, ":sold {item} {amount}"),
            Reply::Unsold { item } => write!(f, ":unsold {item}"),
            Reply::Won { item, amount } => write!(f, ":won {item} {amount}"),
            Reply::List { entries } => {
                // The space after the verb is part of the wire format, even
                // with no active listings. Every entry carries its own '|'.
                write!(f, ":list ")?;
                for entry in entries {
                    write!(
                        f,
                        "{} {} {} {}|",
                        entry.item, entry.reserve, entry.highest_bid, entry.remaining_ms
                    )?;
                }
                Ok(())
            }
        }
    }
}
