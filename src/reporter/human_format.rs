use std::io::Write;

use anyhow::Result;

use super::{Reporter, ScanSummary};
use crate::finding::{ConfidenceLevel, Finding};

impl Reporter {
    pub fn human_format<W: Write>(
        &self,
        writer: &mut W,
        findings: &[Finding],
        summary: &ScanSummary,
    ) -> Result<()> {
        if findings.is_empty() {
            writeln!(writer, "No hygiene issues detected")?;
        } else {
            writeln!(writer, "\nFound {} hygiene issue(s):\n", findings.len())?;
            for (index, finding) in findings.iter().enumerate() {
                self.write_finding(writer, index + 1, finding)?;
            }
        }
        self.write_summary(writer, summary)?;
        Ok(())
    }

    fn write_finding<W: Write>(&self, writer: &mut W, number: usize, f: &Finding) -> Result<()> {
        let heading = format!("{number}. [{}] {}", f.provider.to_string().to_uppercase(), f.title);
        if f.confidence == ConfidenceLevel::High {
            writeln!(writer, "{}", self.styles.style_high_confidence.apply_to(heading))?;
        } else {
            writeln!(writer, "{}", self.styles.style_finding_heading.apply_to(heading))?;
        }
        writeln!(writer, " |Risk..........: {}", capitalize(&f.risk.to_string()))?;
        writeln!(writer, " |Confidence....: {}", capitalize(&f.confidence.to_string()))?;
        writeln!(
            writer,
            " |Resource......: {} -> {}",
            f.resource_type,
            self.styles.style_metadata.apply_to(&f.resource_id)
        )?;
        if let Some(target) = &f.target {
            writeln!(writer, " |Target........: {}", self.styles.style_metadata.apply_to(target))?;
        }
        writeln!(writer, " |Rule..........: {}", self.styles.style_rule.apply_to(&f.rule_id))?;
        writeln!(writer, " |Reason........: {}", f.reason)?;
        writeln!(writer, " |Detected......: {}", f.detected_at.to_rfc3339())?;
        if !f.evidence.signals_used.is_empty() {
            writeln!(writer, " |Evidence:")?;
            for signal in &f.evidence.signals_used {
                writeln!(writer, " |__{signal}")?;
            }
        }
        if !f.details.is_empty() {
            writeln!(writer, " |Details:")?;
            for (key, value) in &f.details {
                writeln!(writer, " |__{key}: {value}")?;
            }
        }
        writeln!(writer)?;
        Ok(())
    }

    fn write_summary<W: Write>(&self, writer: &mut W, summary: &ScanSummary) -> Result<()> {
        writeln!(writer, "\n{}", self.styles.style_heading.apply_to("--- Scan Summary ---"))?;
        writeln!(writer, "Total findings: {}", summary.total_findings)?;

        if !summary.by_risk.is_empty() {
            writeln!(writer, "\nBy risk:")?;
            for (risk, count) in &summary.by_risk {
                writeln!(writer, "  {risk}: {count}")?;
            }
        }
        if !summary.by_confidence.is_empty() {
            writeln!(writer, "\nBy confidence:")?;
            for (confidence, count) in &summary.by_confidence {
                writeln!(writer, "  {confidence}: {count}")?;
            }
        }

        let mode_note = match summary.target_selection_mode.as_str() {
            "auto" => " (auto-detected)",
            "explicit" => " (explicit)",
            _ => "",
        };
        writeln!(
            writer,
            "\nTargets scanned: {}{mode_note}",
            summary.targets_scanned.join(", ")
        )?;
        if !summary.incomplete_targets.is_empty() {
            writeln!(writer, "Incomplete targets (results are best-effort):")?;
            for t in &summary.incomplete_targets {
                if t.skipped {
                    writeln!(writer, "  {}: skipped, no rule succeeded", t.target)?;
                } else {
                    writeln!(
                        writer,
                        "  {}: {} of {} rules failed",
                        t.target,
                        t.rules_failed,
                        t.rules_failed + t.rules_succeeded
                    )?;
                }
            }
        }
        writeln!(writer, "Scanned at: {}", summary.scanned_at.to_rfc3339())?;

        if let Some(ignored) = summary.ignored_by_tag_policy {
            writeln!(writer, "Ignored by tag policy: {ignored}")?;
        }
        Ok(())
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
