//! Parser for migration script files.
//!
//! A migration file is free-form text containing at most one upgrade section
//! and at most one downgrade section, each introduced by a directive line:
//!
//! ```sql
//! -- migrate:up
//! CREATE TABLE users(id int PRIMARY KEY);
//!
//! -- migrate:down
//! DROP TABLE users;
//! ```
//!
//! Directive matching is case-insensitive and whitespace-trimmed. A directive
//! line may carry option tokens after the section keyword, currently only
//! `transaction:<true|false>` which controls whether that direction's script
//! runs inside a database transaction.
//!
//! Two observed behaviors of this format are intentionally preserved rather
//! than corrected:
//!
//! - A line with the transaction token before the section keyword
//!   (`-- transaction:true migrate:up`) is not a directive at all. No section
//!   opens and the line is dropped, as are any SQL lines that follow it.
//! - A section that never appears keeps the zero value of
//!   [`ExecutionOptions`] (`use_transaction: false`). Only a seen directive
//!   sets `use_transaction` to `true`. The two cases are distinguishable by
//!   checking whether the section's contents are empty.

use std::io::BufRead;

use crate::error::Error;

const UPGRADE_DIRECTIVE: &str = "-- migrate:up";
const DOWNGRADE_DIRECTIVE: &str = "-- migrate:down";
const TRANSACTION_OPTION: &str = "transaction:";

/// Per-script execution directives.
///
/// The `Default` value has `use_transaction: false`; the parser only sets it
/// to `true` once the section's directive line has actually been seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionOptions {
    pub use_transaction: bool,
}

/// The parsed payload for one direction of a migration file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MigrationScript {
    /// The section's SQL text, line-trimmed and newline-joined. Empty when
    /// the section is absent from the file.
    pub contents: String,
    pub options: ExecutionOptions,
}

/// Both directions of one migration file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedMigration {
    pub upgrade: MigrationScript,
    pub downgrade: MigrationScript,
}

enum Section {
    None,
    Upgrade,
    Downgrade,
}

/// Split a migration file into its upgrade and downgrade scripts.
///
/// Single forward scan, line by line; no backtracking. Lines encountered
/// before any directive are dropped. Read failures on the underlying input
/// are wrapped and returned.
pub fn parse(reader: impl BufRead) -> Result<ParsedMigration, Error> {
    let mut parsed = ParsedMigration::default();
    let mut section = Section::None;

    for line in reader.lines() {
        let line = line.map_err(|e| Error::Io {
            context: "parsing sql script encountered an error".to_string(),
            source: e,
        })?;
        let line = line.trim();
        let folded = line.to_lowercase();

        if folded.starts_with(UPGRADE_DIRECTIVE) {
            parsed.upgrade.options = parse_execution_options(&folded);
            section = Section::Upgrade;
        } else if folded.starts_with(DOWNGRADE_DIRECTIVE) {
            parsed.downgrade.options = parse_execution_options(&folded);
            section = Section::Downgrade;
        } else {
            let contents = match section {
                Section::Upgrade => &mut parsed.upgrade.contents,
                Section::Downgrade => &mut parsed.downgrade.contents,
                Section::None => continue,
            };
            contents.push_str(line);
            contents.push('\n');
        }
    }

    Ok(parsed)
}

fn parse_execution_options(directive: &str) -> ExecutionOptions {
    let mut options = ExecutionOptions {
        use_transaction: true,
    };
    for token in directive.split_whitespace() {
        if let Some(value) = token.strip_prefix(TRANSACTION_OPTION) {
            options.use_transaction = value != "false";
        }
    }
    options
}
