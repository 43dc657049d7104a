//! Command Runner - 执行命令行子命令
//!
//! 进度与讲解文本输出到 stdout，日志输出到 stderr

use std::io::Write as _;
use std::sync::Arc;

use anyhow::Context as _;

use crate::application::services::{
    ExplanationSession, PipelineTracker, StreamState,
};
use crate::cli::{Command, ConfirmArgs, ExplainArgs, ExtractDeferredArgs};
use crate::config::AppConfig;
use crate::domain::pipeline::{Chapter, ChapterId, ChapterSelection, PipelineSnapshot, TextbookId};
use crate::infrastructure::{HttpBackendClient, InMemoryConversationStore};

pub async fn run(command: Command, config: &AppConfig) -> anyhow::Result<()> {
    let client = Arc::new(
        HttpBackendClient::new(config.backend.client_config()).context("create backend client")?,
    );
    let tracker = |textbook_id: &str| {
        PipelineTracker::new(
            TextbookId::new(textbook_id),
            client.clone(),
            config.pipeline.tracker_config(),
        )
    };

    match command {
        Command::Status(args) => {
            let tracker = tracker(&args.textbook_id);
            let snapshot = tracker.fetch_status().await.context("fetch status")?;
            print!("{}", render_snapshot(&snapshot));
        }
        Command::Watch(args) => {
            let tracker = tracker(&args.textbook_id);
            tracker.fetch_status().await.context("fetch status")?;
            follow_progress(&tracker).await;
        }
        Command::Confirm(args) => {
            let tracker = tracker(&args.textbook_id);
            confirm(&tracker, args).await?;
            follow_progress(&tracker).await;
        }
        Command::ExtractDeferred(args) => {
            let tracker = tracker(&args.textbook_id);
            extract_deferred(&tracker, args).await?;
            follow_progress(&tracker).await;
        }
        Command::Explain(args) => {
            let store = Arc::new(InMemoryConversationStore::new());
            let mut session = ExplanationSession::new(client.clone(), store)?;
            explain(&mut session, args).await?;
        }
    }

    Ok(())
}

async fn confirm(tracker: &PipelineTracker, args: ConfirmArgs) -> anyhow::Result<()> {
    let snapshot = tracker.fetch_status().await.context("fetch status")?;

    let mut selection = if args.preselected || args.chapter_ids.is_empty() {
        ChapterSelection::preselected(&snapshot)
    } else {
        ChapterSelection::new()
    };
    for id in args.chapter_ids {
        selection.select(ChapterId::new(id));
    }

    let ack = tracker
        .confirm_selection(&selection)
        .await
        .context("confirm selection")?;
    println!(
        "Confirmed {} chapter(s), pipeline {}",
        ack.selected_count, ack.status
    );
    Ok(())
}

async fn extract_deferred(
    tracker: &PipelineTracker,
    args: ExtractDeferredArgs,
) -> anyhow::Result<()> {
    tracker.fetch_status().await.context("fetch status")?;

    let ack = if args.chapter_ids.is_empty() {
        tracker.extract_all_deferred().await
    } else {
        let ids: Vec<ChapterId> = args.chapter_ids.into_iter().map(ChapterId::new).collect();
        tracker.extract_deferred(&ids).await
    }
    .context("extract deferred chapters")?;

    println!("Extraction requested, pipeline {}", ack.status);
    Ok(())
}

/// 打印进度直到流水线离开 extracting（或收到 Ctrl-C）
async fn follow_progress(tracker: &PipelineTracker) {
    let mut rx = tracker.subscribe();
    let follow = async {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            let Some(snapshot) = snapshot else { break };
            if !snapshot.status().is_active() {
                print!("{}", render_snapshot(&snapshot));
                break;
            }
            println!("{}", render_progress(&snapshot));
            if rx.changed().await.is_err() {
                break;
            }
        }
    };

    tokio::select! {
        _ = follow => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(textbook_id = %tracker.textbook_id(), "Interrupted");
        }
    }
}

async fn explain(session: &mut ExplanationSession, args: ExplainArgs) -> anyhow::Result<()> {
    let chapters = args
        .chapters
        .into_iter()
        .map(|c| c.with_classification(args.classification.clone()))
        .collect();

    session.ask(chapters, &args.query)?;
    stream_answer(session).await?;

    for message in args.follow_ups {
        println!("\n> {}", message);
        session.follow_up(&message)?;
        stream_answer(session).await?;
    }
    Ok(())
}

/// 边接收边输出讲解文本
async fn stream_answer(session: &mut ExplanationSession) -> anyhow::Result<()> {
    let mut rx = session.subscribe();
    let mut printed = 0;
    let mut stdout = std::io::stdout();

    loop {
        let snapshot = rx.borrow_and_update().clone();
        if snapshot.text.len() > printed {
            write!(stdout, "{}", &snapshot.text[printed..])?;
            stdout.flush()?;
            printed = snapshot.text.len();
        }
        if !snapshot.state.is_active() {
            break;
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                session.cancel();
                break;
            }
        }
    }

    let done = session.settle().await?;
    writeln!(stdout)?;
    if done.state == StreamState::Error {
        anyhow::bail!(done.error.unwrap_or_else(|| "stream failed".to_string()));
    }
    Ok(())
}

/// 单行进度
pub fn render_progress(snapshot: &PipelineSnapshot) -> String {
    format!(
        "{}: {} ({}/{} extracted)",
        snapshot.textbook_id(),
        snapshot.status(),
        snapshot.extracted_count(),
        snapshot.chapters().len()
    )
}

/// 章节行：预选标记、编号、标题、页码、状态、相关度徽章与匹配主题
pub fn render_chapter(chapter: &Chapter) -> String {
    let mark = if chapter.is_preselected() { "[x]" } else { "[ ]" };
    let mut line = format!(
        "{} {:>2}. {}  {}  {}",
        mark,
        chapter.number(),
        chapter.title(),
        chapter.pages(),
        chapter.status()
    );
    if let Some(badge) = chapter.relevance_badge() {
        line.push_str(&format!("  {}", badge));
    }
    if !chapter.matched_topics().is_empty() {
        line.push_str(&format!("  ({})", chapter.matched_topics().join(", ")));
    }
    line
}

pub fn render_snapshot(snapshot: &PipelineSnapshot) -> String {
    let mut out = render_progress(snapshot);
    out.push('\n');
    for chapter in snapshot.chapters() {
        out.push_str("  ");
        out.push_str(&render_chapter(chapter));
        out.push('\n');
    }
    let awaiting = snapshot.awaiting_extraction().len();
    if awaiting > 0 {
        out.push_str(&format!("{} chapter(s) awaiting extraction\n", awaiting));
    }
    if snapshot.status().needs_verification() {
        out.push_str("Chapter selection awaits confirmation\n");
    }
    out
}
