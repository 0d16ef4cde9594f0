use poolcycle_core::operator::{Observer, RunEvent};
use poolcycle_core::report::RunReport;
use serde::Serialize;
use std::io::Write;

pub fn emit_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Left-aligned text table with a dashed rule under the header.
pub struct Table {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&'static str]) -> Self {
        Self {
            headers: headers.to_vec(),
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    fn widths(&self) -> Vec<usize> {
        (0..self.headers.len())
            .map(|col| {
                self.rows
                    .iter()
                    .filter_map(|r| r.get(col).map(String::len))
                    .chain(std::iter::once(self.headers[col].len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect()
    }

    pub fn render(&self) -> String {
        let widths = self.widths();
        let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();

        let mut out = padded_line(self.headers.iter().copied(), &widths);
        out.push_str(&padded_line(rule.iter().map(String::as_str), &widths));
        for r in &self.rows {
            out.push_str(&padded_line(r.iter().map(String::as_str), &widths));
        }
        out
    }

    pub fn print(&self) {
        print!("{}", self.render());
    }
}

fn padded_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(c, &w)| format!("{c:<w$}"))
        .collect();
    let mut line = padded.join("  ").trim_end().to_string();
    line.push('\n');
    line
}

/// Per-target summary printed after a human-mode run.
pub fn print_summary(report: &RunReport) {
    let mut table = Table::new(&["TARGET", "ACTION", "ATTEMPTS", "RESULT"]);
    for o in &report.outcomes {
        table.row(vec![
            o.target.clone(),
            o.action.to_string(),
            o.attempts.to_string(),
            if o.succeeded { "ok" } else { "FAILED" }.to_string(),
        ]);
    }
    println!();
    table.print();

    let skipped = report.targets.len() * report.operation.phases().len() - report.outcomes.len();
    if skipped > 0 {
        println!("\n{skipped} action(s) not attempted after the failure above");
    }
}

// ---------------------------------------------------------------------------
// ConsoleObserver
// ---------------------------------------------------------------------------

/// Human-readable progress lines. They go to stdout normally; in JSON mode
/// stdout is reserved for the report, so they go to stderr.
pub struct ConsoleObserver {
    json: bool,
}

impl ConsoleObserver {
    pub fn new(json: bool) -> Self {
        Self { json }
    }
}

impl Observer for ConsoleObserver {
    fn on_event(&mut self, event: &RunEvent) {
        let text = progress_line(event);
        if self.json {
            eprintln!("{text}");
        } else {
            println!("{text}");
        }
    }
}

fn progress_line(event: &RunEvent) -> String {
    match event {
        RunEvent::PhaseStarted { action, targets } => {
            format!("==> {action}: {targets} target(s)")
        }
        RunEvent::AttemptSucceeded {
            target,
            action,
            attempt,
            max_attempts,
        } => format!("[{action}] {target}: attempt {attempt}/{max_attempts} ok"),
        RunEvent::AttemptFailed {
            target,
            action,
            attempt,
            max_attempts,
            cause,
            retry_in,
        } => {
            let next = match retry_in {
                Some(d) => format!("retrying in {}s", d.as_secs()),
                None => "giving up".to_string(),
            };
            format!("[{action}] {target}: attempt {attempt}/{max_attempts} failed: {cause} ({next})")
        }
        RunEvent::TargetSucceeded {
            target,
            action,
            attempts,
        } => format!("[{action}] {target}: done after {attempts} attempt(s)"),
        RunEvent::TargetFailed {
            target,
            action,
            attempts,
        } => format!("[{action}] {target}: FAILED after {attempts} attempt(s)"),
        RunEvent::PhaseCompleted { action } => format!("==> {action}: complete"),
        RunEvent::Pausing { duration } => {
            format!("==> waiting {}s before next phase", duration.as_secs())
        }
    }
}
