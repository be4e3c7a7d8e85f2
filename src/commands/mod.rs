pub mod archive_run;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn render_text(&self) -> String {
        let mut out = format!("{} ok={}\n", self.command, self.ok);
        for detail in &self.details {
            out.push_str("  ");
            out.push_str(detail);
            out.push('\n');
        }
        for issue in &self.issues {
            out.push_str("  issue: ");
            out.push_str(issue);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::CommandReport;

    #[test]
    fn issue_flips_ok_and_renders_after_details() {
        let mut report = CommandReport::new("archive");
        report.detail("found=2");
        report.issue("failed url=http://y.example");
        assert!(!report.ok);
        assert_eq!(
            report.render_text(),
            "archive ok=false\n  found=2\n  issue: failed url=http://y.example\n"
        );
    }
}
