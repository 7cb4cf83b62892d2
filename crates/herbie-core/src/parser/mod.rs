//! Script parser.
//!
//! Turns indented pseudo-English into a command tree. Each line is parsed on
//! its own, then attached by indentation: a line becomes a subcommand of the
//! nearest preceding line with a smaller indent.

mod tokenizer;
mod verify;

use herbie_config::ParserConfig;
use herbie_protocols::Command;
use tracing::debug;

use crate::keywords::{resolve_keywords, KeywordSet};

/// Parser for whole scripts or single lines.
#[derive(Debug, Clone, Copy)]
pub struct ScriptParser {
    default_timeout_ms: u64,
}

impl Default for ScriptParser {
    fn default() -> Self {
        Self::from_config(&ParserConfig::default())
    }
}

impl ScriptParser {
    pub fn new(default_timeout_ms: u64) -> Self {
        Self { default_timeout_ms }
    }

    pub fn from_config(config: &ParserConfig) -> Self {
        Self::new(config.default_timeout_ms)
    }

    /// Parse a full script into a command tree.
    ///
    /// Blank lines are skipped; every other line yields exactly one command.
    pub fn parse(&self, script: &str, keywords: &KeywordSet) -> Vec<Command> {
        let mut roots = Vec::new();
        // Open blocks, innermost last.
        let mut stack: Vec<(usize, Command)> = Vec::new();

        for (index, line) in script.split('\n').enumerate() {
            let Some(cmd) = self.parse_line(index, line, keywords) else {
                continue;
            };
            let indent = indent_of(line);
            while stack.last().is_some_and(|(top, _)| indent <= *top) {
                close_block(&mut stack, &mut roots);
            }
            stack.push((indent, cmd));
        }
        while !stack.is_empty() {
            close_block(&mut stack, &mut roots);
        }

        debug!(commands = roots.len(), "Parsed script");
        roots
    }

    /// Parse one line. Returns `None` for blank lines.
    pub fn parse_line(&self, index: usize, line: &str, keywords: &KeywordSet) -> Option<Command> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        let mut cmd = Command::new(index, trimmed, self.default_timeout_ms);
        match tokenizer::parse_bullet(trimmed) {
            Some(code) => cmd.code = code,
            None => tokenizer::parse_statement(&tokenizer::tokenize(trimmed), &mut cmd),
        }
        resolve_keywords(&mut cmd, keywords);
        Some(cmd)
    }
}

fn indent_of(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

/// Pop the innermost block and attach it to its parent.
fn close_block(stack: &mut Vec<(usize, Command)>, roots: &mut Vec<Command>) {
    let Some((_, mut cmd)) = stack.pop() else {
        return;
    };
    match stack.last_mut() {
        Some((_, parent)) => {
            if parent.verb() == Some("under") {
                cmd.header = parent.quoted_literals().into_iter().next();
            }
            parent.subcommands.push(cmd);
        }
        None => roots.push(cmd),
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
