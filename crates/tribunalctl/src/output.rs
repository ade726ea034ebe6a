//! Terminal output: ASCII only, colour by outcome.

use owo_colors::OwoColorize;
use tribunal_core::state::StateSnapshot;
use tribunal_core::{AuditOutcome, StageStatus};

fn status_tag(status: StageStatus) -> String {
    match status {
        StageStatus::Completed => "[OK]".bright_green().to_string(),
        StageStatus::Failed => "[FAILED]".bright_red().to_string(),
        StageStatus::Running => "[RUNNING]".yellow().to_string(),
        StageStatus::Pending => "[PENDING]".dimmed().to_string(),
    }
}

fn score_colored(score: f64) -> String {
    let text = format!("{:.1} / 5", score);
    if score >= 3.5 {
        text.bright_green().to_string()
    } else if score >= 2.5 {
        text.yellow().to_string()
    } else {
        text.bright_red().to_string()
    }
}

/// One line per finished stage in `--trace` mode
pub fn print_stage(node: &str, status: StageStatus, snapshot: &StateSnapshot) {
    println!(
        "{:<10} {:<28} evidence={} opinions={} gaps={}",
        status_tag(status),
        node,
        snapshot.evidence.len(),
        snapshot.opinions.len(),
        snapshot.gap_count()
    );
}

pub fn print_summary(outcome: &AuditOutcome) {
    let verdict = &outcome.verdict;

    println!();
    println!("{}  {}", "Audit".bold(), outcome.target.cyan());
    println!("Run:      {}", outcome.run_id.dimmed());
    println!("Verdict:  {} ({})", score_colored(verdict.score), verdict.grade());

    if let Some(caveat) = &verdict.caveat {
        println!("{}", caveat.bright_red());
    }

    println!();
    println!("[RATIONALE]");
    for application in &verdict.rationale {
        println!("  * {}: {}", application.rule.cyan(), application.note);
    }

    if let Some(dissent) = &verdict.dissent_summary {
        println!();
        println!("[DISSENT]");
        println!("  {}", dissent.summary.yellow());
    }

    if verdict.has_gaps() {
        let gaps: Vec<&str> = verdict.evidence_gaps.iter().map(|c| c.as_str()).collect();
        println!();
        println!("{} {}", "[GAPS]".bright_red(), gaps.join(", "));
    }

    println!();
    println!("[OPINIONS]");
    for opinion in &outcome.opinions {
        if opinion.gap {
            let reason = opinion.gap_reason.map(|r| r.as_str()).unwrap_or("unknown");
            println!("  * {:<12} {}", opinion.judge_id, format!("no opinion ({})", reason).bright_red());
        } else {
            println!("  * {:<12} {:.1}", opinion.judge_id, opinion.score);
        }
    }
    println!();
}
