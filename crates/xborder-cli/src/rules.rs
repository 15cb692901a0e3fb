//! # `xborder rules` — print the effective rule table.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use xborder_hierarchy::RuleTable;

use crate::EXIT_OK;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum RulesFormat {
    #[default]
    Yaml,
    Json,
}

#[derive(Args, Debug)]
pub struct RulesArgs {
    /// Output format.
    #[arg(long, value_enum, default_value_t = RulesFormat::Yaml)]
    pub format: RulesFormat,
}

/// Render `rules` in the requested format.
pub fn render_rules(rules: &RuleTable, format: RulesFormat) -> Result<String> {
    let map = rules.to_map();
    match format {
        RulesFormat::Yaml => serde_yaml::to_string(&map).context("failed to render rules as YAML"),
        RulesFormat::Json => {
            serde_json::to_string_pretty(&map).context("failed to render rules as JSON")
        }
    }
}

pub fn run_rules(args: &RulesArgs, rules: &RuleTable) -> Result<u8> {
    println!("{}", render_rules(rules, args.format)?);
    Ok(EXIT_OK)
}
