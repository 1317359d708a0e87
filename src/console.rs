//! Human-readable status table printed at the end of a run.

use std::fmt::Write;

use crate::report::{ChannelStatus, HealthReport};
use crate::scheduler::ExitReason;

pub fn render(report: &HealthReport, exit: ExitReason) -> String {
    let mut out = String::new();

    // writing into a String cannot fail
    let _ = writeln!(out, "Topic Status Report:");
    let _ = writeln!(out, "====================");

    for verdict in &report.verdicts {
        let status = match verdict.status {
            ChannelStatus::Live => "OK",
            ChannelStatus::Dead => "NOT PUBLISHING",
        };
        let _ = writeln!(out, "[{status:^15}] {}", verdict.channel);
    }

    let total = report.verdicts.len();
    let live = report.live_count();
    if report.any_dead {
        let _ = writeln!(
            out,
            "Overall: DEGRADED ({} of {total} topics silent, {exit})",
            total - live
        );
    } else {
        let _ = writeln!(out, "Overall: OK ({live} of {total} topics publishing, {exit})");
    }

    out
}
