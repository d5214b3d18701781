use std::fmt::Write;

use crate::catalog::TOTAL_GROUP;
use crate::models::{Lecture, ResultFact, ResultSet, StatType};

/// Number of cross-tab cells listed under "Strongest Combinations".
const TOP_CELLS: usize = 5;

pub fn build_report(lecture: &Lecture, result_set: Option<&ResultSet>, facts: &[ResultFact]) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Lecture Feedback Report");
    let _ = writeln!(
        output,
        "{} ({}), survey {}",
        lecture.title, lecture.id, lecture.survey_status
    );
    let _ = writeln!(output);

    let Some(result_set) = result_set else {
        let _ = writeln!(output, "No analysis has been run for this lecture yet.");
        return output;
    };

    let _ = writeln!(
        output,
        "Result set {} computed at {} over {} responses.",
        result_set.id,
        result_set.closed_at.to_rfc3339(),
        result_set.total_responses
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Average Scores");
    let summaries: Vec<&ResultFact> = facts
        .iter()
        .filter(|fact| fact.stat_type == StatType::Summary)
        .collect();
    if summaries.is_empty() {
        let _ = writeln!(output, "No averages recorded.");
    }
    for fact in summaries {
        let target = fact.dimension2.as_deref().unwrap_or("?");
        let scope = if fact.dimension1 == TOTAL_GROUP {
            "overall".to_string()
        } else {
            format!("{} = {}", fact.dimension1, fact.option1)
        };
        let _ = writeln!(
            output,
            "- {target} ({scope}): {:.2} from {} answers",
            fact.avg_score.unwrap_or(0.0),
            fact.base_n
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Distribution");
    let simple: Vec<&ResultFact> = facts
        .iter()
        .filter(|fact| fact.stat_type == StatType::Simple)
        .collect();
    if simple.is_empty() {
        let _ = writeln!(output, "No responses survived normalization.");
    }
    let mut current_dimension: Option<&str> = None;
    for fact in simple {
        if current_dimension != Some(fact.dimension1.as_str()) {
            let _ = writeln!(output, "### {}", fact.dimension1);
            current_dimension = Some(fact.dimension1.as_str());
        }
        let _ = writeln!(
            output,
            "- {}: {} ({:.2}%)",
            fact.option1,
            fact.n.unwrap_or(0),
            fact.pct.unwrap_or(0.0)
        );
    }

    let mut cells: Vec<&ResultFact> = facts
        .iter()
        .filter(|fact| fact.stat_type == StatType::Cross && fact.n.unwrap_or(0) > 0)
        .collect();
    cells.sort_by(|a, b| b.n.cmp(&a.n));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Strongest Combinations");
    if cells.is_empty() {
        let _ = writeln!(output, "No cross-tabulated cells.");
    }
    for fact in cells.iter().take(TOP_CELLS) {
        let _ = writeln!(
            output,
            "- {}={} x {}={}: {} ({:.2}% of row, {:.2}% of column)",
            fact.dimension1,
            fact.option1,
            fact.dimension2.as_deref().unwrap_or("?"),
            fact.option2.as_deref().unwrap_or("?"),
            fact.n.unwrap_or(0),
            fact.row_pct.unwrap_or(0.0),
            fact.col_pct.unwrap_or(0.0)
        );
    }

    output
}
