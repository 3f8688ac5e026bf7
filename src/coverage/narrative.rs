//! Readable coverage narrative
//!
//! Turns a [`CoverageReport`] into a readiness verdict, key insights and
//! concrete next steps for the people reviewing a STAGING version.

use serde::{Deserialize, Serialize};

use super::report::{CoverageReport, CoverageStatus};

/// Under-staffed positions listed one by one before the rest are summarized
pub const MAX_POSITION_RECOMMENDATIONS: usize = 10;

/// Overall readiness of a schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Readiness {
    /// Every position is staffed
    Ready,
    /// At least 80% of required slots filled
    Gaps,
    /// Below 80%
    Critical,
}

impl Readiness {
    pub fn from_report(report: &CoverageReport) -> Self {
        if report.is_fully_covered() {
            Self::Ready
        } else if report.overall_ratio >= 0.8 {
            Self::Gaps
        } else {
            Self::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Gaps => "GAPS",
            Self::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Readiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict, insights and recommendations derived from one report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageNarrative {
    pub readiness: Readiness,
    pub headline: String,
    pub key_insights: Vec<String>,
    pub recommendations: Vec<String>,
}

impl CoverageNarrative {
    pub fn from_report(report: &CoverageReport) -> Self {
        let readiness = Readiness::from_report(report);
        let pct = report.overall_ratio * 100.0;
        let headline = match readiness {
            Readiness::Ready => "All positions are fully staffed".to_string(),
            Readiness::Gaps => format!(
                "{pct:.1}% covered, {} position(s) need more staff",
                report.under_staffed.len()
            ),
            Readiness::Critical => format!("{pct:.1}% covered, critical staffing gaps"),
        };

        Self {
            readiness,
            headline,
            key_insights: key_insights(report),
            recommendations: recommendations(report),
        }
    }

    /// Multi-line text for terminals and logs
    pub fn to_text(&self) -> String {
        let mut out = format!("[{}] {}\n", self.readiness, self.headline);
        if !self.key_insights.is_empty() {
            out.push_str("\nKey insights:\n");
            for (i, insight) in self.key_insights.iter().enumerate() {
                out.push_str(&format!("  {}. {insight}\n", i + 1));
            }
        }
        if !self.recommendations.is_empty() {
            out.push_str("\nRecommendations:\n");
            for (i, rec) in self.recommendations.iter().enumerate() {
                out.push_str(&format!("  {}. {rec}\n", i + 1));
            }
        }
        out
    }
}

fn key_insights(report: &CoverageReport) -> Vec<String> {
    if report.lines.is_empty() {
        return vec!["No shifts in the calculated window".to_string()];
    }

    let pct = report.overall_ratio * 100.0;
    let mut insights = vec![if report.is_fully_covered() {
        "100% coverage, every position fully staffed".to_string()
    } else if pct >= 90.0 {
        format!("{pct:.1}% coverage, minor gaps remain")
    } else if pct >= 75.0 {
        format!("{pct:.1}% coverage, substantial gaps need attention")
    } else {
        format!("{pct:.1}% coverage, critical staffing shortfall")
    }];

    insights.push(format!(
        "{} of {} positions fully covered",
        report.count_by_status(CoverageStatus::Full),
        report.lines.len()
    ));

    if !report.under_staffed.is_empty() {
        let missing: u64 = report.lines.iter().map(|l| l.shortfall()).sum();
        insights.push(format!(
            "Staffing shortage of {missing} across {} position(s)",
            report.under_staffed.len()
        ));
    }
    if !report.over_staffed.is_empty() {
        insights.push(format!(
            "{} position(s) over-staffed",
            report.over_staffed.len()
        ));
        if !report.under_staffed.is_empty() {
            insights.push(
                "Over-staffed positions could move to under-staffed ones".to_string(),
            );
        }
    }
    if report.unknown_people > 0 {
        insights.push(format!(
            "{} assignment(s) reference people without specialty data",
            report.unknown_people
        ));
    }

    insights
}

fn recommendations(report: &CoverageReport) -> Vec<String> {
    let mut recs = Vec::new();
    if report.lines.is_empty() {
        return recs;
    }

    if report.is_fully_covered() {
        recs.push("Schedule is ready for promotion".to_string());
        if !report.over_staffed.is_empty() {
            recs.push(format!(
                "Consider redistributing {} over-staffed position(s)",
                report.over_staffed.len()
            ));
        }
        return recs;
    }

    let uncovered = report.count_by_status(CoverageStatus::Uncovered);
    let partial = report.count_by_status(CoverageStatus::Partial);
    if uncovered > 0 {
        recs.push(format!(
            "Fill {uncovered} uncovered position(s) before promotion"
        ));
    }
    if partial > 0 {
        recs.push(format!("Add staff to {partial} partially covered position(s)"));
    }

    let gaps: Vec<_> = report.lines.iter().filter(|l| l.is_under_staffed()).collect();
    for line in gaps.iter().take(MAX_POSITION_RECOMMENDATIONS) {
        recs.push(format!(
            "Assign {} more to {} {} on {} ({} of {} staffed)",
            line.shortfall(),
            line.shift_type,
            line.dimension,
            line.date,
            line.assigned,
            line.required
        ));
    }
    if gaps.len() > MAX_POSITION_RECOMMENDATIONS {
        recs.push(format!(
            "...and {} more under-staffed position(s)",
            gaps.len() - MAX_POSITION_RECOMMENDATIONS
        ));
    }

    recs.push("Re-run coverage after adding assignments".to_string());
    recs
}
