//! Console command parsing.
//!
//! ```text
//! print <machine> <material> <color> <rolls> <operator...> [--privileged]
//! stock | packaging | counters | events [n] | alerts <minimum>
//! reconcile | reset-counters | help | quit
//! ```

use anyhow::{Context, bail};

use printfloor_core::MachineId;
use printfloor_production::{PrintRequest, StaticCatalog};

/// Catalog source, e.g. `PLA:Red,Blue;PETG:Black`.
pub const COLORS_VAR: &str = "PRINTFLOOR_COLORS";

const DEFAULT_EVENT_LIMIT: usize = 20;
const PRIVILEGED_FLAG: &str = "--privileged";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Print(PrintRequest),
    Stock,
    Packaging,
    Counters,
    Events { limit: usize },
    /// Entries below `minimum` (applied uniformly to every known entry).
    Alerts { minimum: u64 },
    Reconcile,
    ResetCounters,
    Help,
    Quit,
}

impl Command {
    /// Parse one console line; `None` for blank lines and `#` comments.
    pub fn parse(line: &str) -> anyhow::Result<Option<Command>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let mut words: Vec<&str> = line.split_whitespace().collect();
        let verb = words.remove(0).to_ascii_lowercase();

        let command = match verb.as_str() {
            "print" => Command::Print(parse_print(words)?),
            "stock" => Command::Stock,
            "packaging" => Command::Packaging,
            "counters" => Command::Counters,
            "events" => Command::Events {
                limit: match words.first() {
                    Some(n) => n.parse().context("events limit must be a number")?,
                    None => DEFAULT_EVENT_LIMIT,
                },
            },
            "alerts" => {
                let Some(raw) = words.first() else {
                    bail!("usage: alerts <minimum>");
                };
                Command::Alerts {
                    minimum: raw.parse().context("minimum must be a non-negative number")?,
                }
            }
            "reconcile" => Command::Reconcile,
            "reset-counters" => Command::ResetCounters,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => bail!("unknown command `{other}` (try `help`)"),
        };

        Ok(Some(command))
    }
}

fn parse_print(mut words: Vec<&str>) -> anyhow::Result<PrintRequest> {
    let privileged = words.iter().any(|w| *w == PRIVILEGED_FLAG);
    words.retain(|w| *w != PRIVILEGED_FLAG);

    if words.len() < 5 {
        bail!("usage: print <machine> <material> <color> <rolls> <operator...> [--privileged]");
    }

    let machine: u32 = words[0].parse().context("machine must be a number")?;
    let rolls: u32 = words[3].parse().context("rolls must be a number")?;
    let operator = words[4..].join(" ");

    Ok(PrintRequest::new(MachineId::new(machine), words[1], words[2], operator, rolls)
        .privileged(privileged))
}

/// Parse a catalog description: `;`-separated `material:color,color` groups.
pub fn parse_catalog(raw: &str) -> anyhow::Result<StaticCatalog> {
    let mut catalog = StaticCatalog::new();
    for group in raw.split(';').map(str::trim).filter(|g| !g.is_empty()) {
        let Some((material, colors)) = group.split_once(':') else {
            bail!("catalog group `{group}` must look like `material:color,color`");
        };
        let material = material.trim();
        if material.is_empty() {
            bail!("catalog group `{group}` has no material type");
        }
        catalog = catalog.with_colors(
            material,
            colors.split(',').map(str::trim).filter(|c| !c.is_empty()),
        );
    }
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use printfloor_production::ColorCatalog;

    #[test]
    fn print_accepts_multi_word_operators_and_flag() {
        let cmd = Command::parse("print 3 PLA Red 1 Ana Maria --privileged")
            .unwrap()
            .unwrap();
        let Command::Print(req) = cmd else {
            panic!("expected print, got {cmd:?}");
        };
        assert_eq!(req.machine_id, MachineId::new(3));
        assert_eq!(req.operator, "Ana Maria");
        assert_eq!(req.roll_count, 1);
        assert!(req.privileged);
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        assert_eq!(Command::parse("   ").unwrap(), None);
        assert_eq!(Command::parse("# shift start").unwrap(), None);
    }

    #[test]
    fn malformed_lines_explain_usage() {
        assert!(Command::parse("print 3 PLA").is_err());
        assert!(Command::parse("print x PLA Red 1 Ana").is_err());
        assert!(Command::parse("alerts").is_err());
        assert!(Command::parse("launch").is_err());
    }

    #[test]
    fn events_limit_defaults() {
        assert_eq!(
            Command::parse("events").unwrap(),
            Some(Command::Events { limit: DEFAULT_EVENT_LIMIT })
        );
        assert_eq!(
            Command::parse("EVENTS 5").unwrap(),
            Some(Command::Events { limit: 5 })
        );
    }

    #[test]
    fn catalog_groups_parse() {
        let catalog = parse_catalog("PLA: Red, Blue ; PETG:Black;").unwrap();
        assert!(catalog.is_known_color("PLA", "Blue"));
        assert!(catalog.is_known_color("PETG", "Black"));
        assert!(!catalog.is_known_color("PETG", "Red"));
        assert!(parse_catalog("PLA Red").is_err());
    }
}
