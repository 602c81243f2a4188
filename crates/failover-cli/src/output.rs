use serde::Serialize;

use failover_core::orchestrator::{PairOutcome, RunReport};

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_report(report: &RunReport) {
    let rows = report
        .pairs
        .iter()
        .map(|pair| {
            let (outcome, detail) = describe(&pair.outcome);
            vec![
                pair.index.to_string(),
                pair.destination.clone(),
                outcome.to_string(),
                detail,
            ]
        })
        .collect();
    print_table(&["PAIR", "DESTINATION", "OUTCOME", "DETAIL"], rows);
}

fn describe(outcome: &PairOutcome) -> (&'static str, String) {
    match outcome {
        PairOutcome::Succeeded {
            primary,
            primary_region,
            standby,
            renamed,
        } => {
            let mut detail = format!("{primary} is primary in {primary_region}");
            if let Some(standby) = standby {
                detail.push_str(&format!("; standby {standby}"));
            }
            if let Some(renamed) = renamed {
                detail.push_str(&format!("; old primary renamed to {renamed}"));
            }
            ("succeeded", detail)
        }
        PairOutcome::Planned { plan } => {
            let steps: Vec<&str> = plan.steps.iter().map(|s| s.as_str()).collect();
            ("planned", steps.join(" -> "))
        }
        PairOutcome::Failed { step, error } => ("failed", format!("{step}: {error}")),
    }
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    // Calculate column widths
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let header_row: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_row.join("  "));

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect();
        println!("{}", cells.join("  ").trim_end());
    }
}
