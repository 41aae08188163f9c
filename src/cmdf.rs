//! ## Command-file reader
//!
//! Extracts shock and exogenous-assignment records from the text carried in
//! an embedded `CMDF` string array. Only the `(name, indexes, value)`
//! contract the solution assembler depends on is parsed here; the full
//! GEMPACK command grammar is out of scope and unrecognized lines are
//! skipped rather than rejected.
//!
//! Recognized forms, one per logical line:
//!
//! ```text
//! shock <name> ("<idx0>", "<idx1>", ...) = <value>;
//! exogenous <name> ("<idx0>", "<idx1>", ...);
//! ```

use crate::array::HeaderArray;
use crate::error::{HarError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct ExogenousDefinition {
    pub name: String,
    pub indexes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShockDefinition {
    pub name: String,
    pub indexes: Vec<String>,
    pub value: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandFile {
    pub exogenous: Vec<ExogenousDefinition>,
    pub shocks: Vec<ShockDefinition>,
}

/// Parses a `CMDF` header array, a `1C` array whose logical values are one
/// command-file line each.
pub fn from_header_array(array: &HeaderArray) -> Result<CommandFile> {
    let dict = array
        .payload
        .as_strings()
        .ok_or_else(|| HarError::invalid_data("CMDF array is not a string array"))?;
    parse(dict.logical_values())
}

pub fn parse(lines: impl IntoIterator<Item = String>) -> Result<CommandFile> {
    let mut command_file = CommandFile::default();
    for raw in lines {
        let line = raw.trim().trim_end_matches(';').trim();
        if line.is_empty() || line.starts_with('!') {
            continue;
        }
        let lower = line.to_ascii_lowercase();
        if let Some(rest_start) = lower.find("shock ") {
            if rest_start == 0 {
                let rest = line[6..].trim();
                let (name, indexes, remainder) = split_name_and_paren(rest)?;
                let value_str = remainder.trim_start_matches('=').trim();
                let value: f32 = value_str
                    .parse()
                    .map_err(|_| HarError::invalid_data(format!("invalid shock value: {value_str}")))?;
                command_file.shocks.push(ShockDefinition { name, indexes, value });
                continue;
            }
        }
        if lower.starts_with("exogenous ") {
            let rest = line[10..].trim();
            let (name, indexes, _) = split_name_and_paren(rest)?;
            command_file.exogenous.push(ExogenousDefinition { name, indexes });
            continue;
        }
        // Other CMDF directives (e.g. `file`, `verbal description`) are
        // outside the shock/exogenous contract and are ignored.
    }
    Ok(command_file)
}

fn split_name_and_paren(s: &str) -> Result<(String, Vec<String>, String)> {
    let open = s
        .find('(')
        .ok_or_else(|| HarError::invalid_data("expected '(' in command file line"))?;
    let name = s[..open].trim().to_string();
    let close = s[open..]
        .find(')')
        .map(|i| i + open)
        .ok_or_else(|| HarError::invalid_data("expected ')' in command file line"))?;
    let inside = &s[open + 1..close];
    let indexes = inside
        .split(',')
        .map(|tok| tok.trim().trim_matches('"').to_string())
        .filter(|tok| !tok.is_empty())
        .collect();
    let remainder = s[close + 1..].trim().to_string();
    Ok((name, indexes, remainder))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_shock_line() {
        let cf = parse(vec!["shock p3cs (\"c1\",\"r1\") = 5;".to_string()]).unwrap();
        assert_eq!(cf.shocks.len(), 1);
        assert_eq!(cf.shocks[0].name, "p3cs");
        assert_eq!(cf.shocks[0].indexes, vec!["c1".to_string(), "r1".to_string()]);
        assert_eq!(cf.shocks[0].value, 5.0);
    }

    #[test]
    fn parses_exogenous_line() {
        let cf = parse(vec!["exogenous p3cs (\"c1\", \"r1\");".to_string()]).unwrap();
        assert_eq!(cf.exogenous.len(), 1);
        assert_eq!(cf.exogenous[0].name, "p3cs");
        assert_eq!(cf.exogenous[0].indexes, vec!["c1".to_string(), "r1".to_string()]);
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        let cf = parse(vec!["".to_string(), "! a comment".to_string()]).unwrap();
        assert!(cf.shocks.is_empty());
        assert!(cf.exogenous.is_empty());
    }
}
