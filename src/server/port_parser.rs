// Port token parser
// Expands `6660-6669,7000` style bind tokens into concrete ports

use std::collections::HashSet;

use crate::logger;

/// Iterator over the ports named by a bind token.
///
/// Items are comma separated; each is a port or an inclusive `low-high`
/// range. Invalid items are skipped with a warning. Unless overlap is
/// allowed, a port is yielded at most once.
#[derive(Debug)]
pub struct PortParser<'a> {
    items: std::str::Split<'a, char>,
    range: Option<(u16, u16)>,
    seen: HashSet<u16>,
    allow_overlap: bool,
}

impl<'a> PortParser<'a> {
    pub fn new(token: &'a str, allow_overlap: bool) -> Self {
        Self {
            items: token.split(','),
            range: None,
            seen: HashSet::new(),
            allow_overlap,
        }
    }

    /// Next port, whether fresh or already seen
    fn next_candidate(&mut self) -> Option<u16> {
        loop {
            if let Some((next, high)) = self.range {
                self.range = if next < high { Some((next + 1, high)) } else { None };
                return Some(next);
            }

            let item = self.items.next()?.trim();
            if item.is_empty() {
                continue;
            }
            match parse_item(item) {
                Some((low, high)) => self.range = Some((low, high)),
                None => logger::log_invalid_port_token(item),
            }
        }
    }
}

impl Iterator for PortParser<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        loop {
            let port = self.next_candidate()?;
            if self.allow_overlap || self.seen.insert(port) {
                return Some(port);
            }
        }
    }
}

/// Parse `N` or `low-high` into an inclusive, non-zero range
fn parse_item(item: &str) -> Option<(u16, u16)> {
    let (low, high) = match item.split_once('-') {
        Some((low, high)) => (parse_port(low)?, parse_port(high)?),
        None => {
            let port = parse_port(item)?;
            (port, port)
        }
    };
    (low <= high).then_some((low, high))
}

fn parse_port(text: &str) -> Option<u16> {
    text.trim().parse::<u16>().ok().filter(|&p| p != 0)
}

/// Expand a bind token into its ports, first occurrence wins
pub fn expand_ports(token: &str) -> Vec<u16> {
    PortParser::new(token, false).collect()
}
