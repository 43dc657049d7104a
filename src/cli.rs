//! Command Line - 命令行参数定义

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::application::ports::ChapterRef;
use crate::domain::pipeline::TextbookId;

#[derive(Debug, Parser)]
#[command(author, version, about = "Textbook extraction pipeline client")]
pub struct Cli {
    /// Configuration file (defaults to ./lazylearn.toml when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show pipeline status and the chapter list.
    Status(TextbookArgs),
    /// Follow extraction progress until the pipeline settles.
    Watch(TextbookArgs),
    /// Confirm the chapters to extract, then follow progress.
    Confirm(ConfirmArgs),
    /// Extract deferred chapters, then follow progress.
    ExtractDeferred(ExtractDeferredArgs),
    /// Stream an explanation for the given chapters.
    Explain(ExplainArgs),
}

#[derive(Debug, Args)]
pub struct TextbookArgs {
    /// Textbook identifier.
    pub textbook_id: String,
}

#[derive(Debug, Args)]
pub struct ConfirmArgs {
    /// Textbook identifier.
    pub textbook_id: String,

    /// Chapter ids to confirm.
    pub chapter_ids: Vec<String>,

    /// Include the default pre-selection (relevance above 0.5).
    /// Implied when no chapter ids are given.
    #[arg(long)]
    pub preselected: bool,
}

#[derive(Debug, Args)]
pub struct ExtractDeferredArgs {
    /// Textbook identifier.
    pub textbook_id: String,

    /// Deferred chapter ids; all deferred chapters when omitted.
    pub chapter_ids: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ExplainArgs {
    /// Chapter to ground the answer in, as `<textbook_id>:<chapter_num>`.
    #[arg(long = "chapter", required = true, value_parser = parse_chapter_ref)]
    pub chapters: Vec<ChapterRef>,

    /// Classification sent with every chapter.
    #[arg(long, default_value = crate::application::ports::DEFAULT_CLASSIFICATION)]
    pub classification: String,

    /// Question to ask.
    pub query: String,

    /// Follow-up messages asked in the same conversation.
    #[arg(long = "follow-up")]
    pub follow_ups: Vec<String>,
}

/// 解析 `<textbook_id>:<chapter_num>`
pub fn parse_chapter_ref(value: &str) -> Result<ChapterRef, String> {
    let (textbook_id, number) = value
        .rsplit_once(':')
        .ok_or_else(|| format!("expected <textbook_id>:<chapter_num>, got {value}"))?;
    if textbook_id.is_empty() {
        return Err(format!("missing textbook id in {value}"));
    }
    let number: u32 = number
        .parse()
        .map_err(|_| format!("invalid chapter number in {value}"))?;
    Ok(ChapterRef::new(TextbookId::new(textbook_id), number))
}
